//! Audit of a Pascal VOC source dataset before conversion.
//!
//! Reports pairing between annotations and images, structural problems in
//! each XML, box geometry issues, class-name agreement with the class table,
//! and size statistics. Nothing is modified.

use std::collections::{BTreeMap, BTreeSet};
use std::fmt;
use std::path::{Path, PathBuf};

use serde::Serialize;

use super::report::SizeStats;
use crate::config::ClassTable;
use crate::error::BoardlabelError;
use crate::ir::io_voc_xml::{collect_xml_files, parse_voc_file, VocDocument};
use crate::ir::io_yolo::index_files_by_key;
use crate::ir::SampleKey;
use crate::validation::{
    classify_box, BoxVerdict, InvalidReason, IssueCode, IssueContext, ValidationIssue,
    ValidationReport,
};

#[derive(Clone, Debug)]
pub struct VocCheckOptions {
    pub annotations_dir: PathBuf,
    pub images_dir: PathBuf,
    pub image_extensions: Vec<String>,
    pub min_box_area: f64,
}

/// Result of a VOC audit.
#[derive(Clone, Debug, Serialize)]
pub struct VocCheckReport {
    pub annotations_dir: PathBuf,
    pub images_dir: PathBuf,
    pub xml_files: usize,
    pub images: usize,
    pub xml_without_image: Vec<SampleKey>,
    pub image_without_xml: Vec<SampleKey>,
    /// Annotation files with at least one error-level issue.
    pub error_files: Vec<PathBuf>,
    pub issues: ValidationReport,
    pub objects: usize,
    /// Object count per class name as authored, sorted by name.
    pub class_counts: Vec<NameCount>,
    /// Pixel box sizes per class name.
    pub box_sizes: Vec<NamedSizeStats>,
    pub image_width: SizeStats,
    pub image_height: SizeStats,
    /// Class-table names that never occur in the data.
    pub names_missing_from_data: Vec<String>,
    /// Names in the data that the class table does not know.
    pub names_unknown_to_table: Vec<String>,
    pub passed: bool,
}

#[derive(Clone, Debug, Serialize)]
pub struct NameCount {
    pub name: String,
    pub count: usize,
    pub percent: f64,
}

#[derive(Clone, Debug, Serialize)]
pub struct NamedSizeStats {
    pub name: String,
    pub width: SizeStats,
    pub height: SizeStats,
}

impl VocCheckReport {
    pub fn problem_count(&self) -> usize {
        self.xml_without_image.len()
            + self.image_without_xml.len()
            + self.error_files.len()
            + self.names_missing_from_data.len()
            + self.names_unknown_to_table.len()
    }
}

/// Audit a VOC annotations directory against its image directory.
pub fn check_voc_dataset(
    options: &VocCheckOptions,
    classes: &ClassTable,
) -> Result<VocCheckReport, BoardlabelError> {
    let xml_files = collect_xml_files(&options.annotations_dir)?;
    let images = index_files_by_key(&options.images_dir, &options.image_extensions)?;

    let xml_keys: BTreeSet<SampleKey> = xml_files
        .iter()
        .filter_map(|path| SampleKey::from_path(path))
        .collect();
    let image_keys: BTreeSet<SampleKey> = images.files.keys().cloned().collect();

    let mut audit = Audit::default();
    for path in &xml_files {
        audit.file(path, options.min_box_area);
    }

    let seen: BTreeSet<&str> = audit.class_counts.keys().map(String::as_str).collect();
    let names_missing_from_data: Vec<String> = classes
        .names()
        .iter()
        .filter(|name| !seen.contains(name.as_str()))
        .cloned()
        .collect();
    let names_unknown_to_table: Vec<String> = audit
        .class_counts
        .keys()
        .filter(|name| classes.id_of(name).is_none())
        .cloned()
        .collect();
    for name in &names_unknown_to_table {
        audit.issues.add(ValidationIssue::warning(
            IssueCode::UnknownClassName,
            format!(
                "class '{name}' ({} object(s)) is not in the class table",
                audit.class_counts[name]
            ),
            IssueContext::Dataset,
        ));
    }

    let objects: usize = audit.class_counts.values().sum();
    let class_counts = audit
        .class_counts
        .iter()
        .map(|(name, count)| NameCount {
            name: name.clone(),
            count: *count,
            percent: if objects > 0 {
                *count as f64 / objects as f64 * 100.0
            } else {
                0.0
            },
        })
        .collect();
    let box_sizes = audit
        .box_sizes
        .into_iter()
        .map(|(name, (width, height))| NamedSizeStats {
            name,
            width,
            height,
        })
        .collect();

    let mut report = VocCheckReport {
        annotations_dir: options.annotations_dir.clone(),
        images_dir: options.images_dir.clone(),
        xml_files: xml_files.len(),
        images: images.files.len(),
        xml_without_image: xml_keys.difference(&image_keys).cloned().collect(),
        image_without_xml: image_keys.difference(&xml_keys).cloned().collect(),
        error_files: audit.error_files,
        issues: audit.issues,
        objects,
        class_counts,
        box_sizes,
        image_width: audit.image_width,
        image_height: audit.image_height,
        names_missing_from_data,
        names_unknown_to_table,
        passed: false,
    };
    for key in &report.xml_without_image {
        report.issues.add(ValidationIssue::error(
            IssueCode::AnnotationWithoutImage,
            format!("no image for '{key}'"),
            IssueContext::Dataset,
        ));
    }
    for key in &report.image_without_xml {
        report.issues.add(ValidationIssue::error(
            IssueCode::ImageWithoutAnnotation,
            format!("no annotation for '{key}'"),
            IssueContext::Dataset,
        ));
    }
    report.passed = report.problem_count() == 0;

    Ok(report)
}

#[derive(Default)]
struct Audit {
    issues: ValidationReport,
    error_files: Vec<PathBuf>,
    class_counts: BTreeMap<String, usize>,
    box_sizes: BTreeMap<String, (SizeStats, SizeStats)>,
    image_width: SizeStats,
    image_height: SizeStats,
}

impl Audit {
    fn file(&mut self, path: &Path, min_box_area: f64) {
        let errors_before = self.issues.error_count();
        match parse_voc_file(path) {
            Ok(document) => self.document(path, &document, min_box_area),
            Err(err) => self.issues.add(ValidationIssue::error(
                IssueCode::XmlParseFailed,
                err.to_string(),
                file_context(path),
            )),
        }
        if self.issues.error_count() > errors_before {
            self.error_files.push(path.to_path_buf());
        }
    }

    fn document(&mut self, path: &Path, document: &VocDocument, min_box_area: f64) {
        if document.filename.is_none() {
            self.issues.add(ValidationIssue::error(
                IssueCode::MissingFilename,
                "no <filename>",
                file_context(path),
            ));
        }

        let size = match document.size {
            Some(size) if size.width >= 1 && size.height >= 1 => {
                self.image_width.push(size.width as f64);
                self.image_height.push(size.height as f64);
                Some(size.image_size())
            }
            Some(size) => {
                self.issues.add(ValidationIssue::error(
                    IssueCode::DegenerateImageSize,
                    format!("image size {}x{}", size.width, size.height),
                    file_context(path),
                ));
                None
            }
            None => {
                self.issues.add(ValidationIssue::error(
                    IssueCode::MissingSize,
                    "no <size> block",
                    file_context(path),
                ));
                None
            }
        };

        if document.objects.is_empty() {
            self.issues.add(ValidationIssue::warning(
                IssueCode::NoObjects,
                "annotation has no objects",
                file_context(path),
            ));
        }

        for (index, object) in document.objects.iter().enumerate() {
            let context = || IssueContext::Object {
                path: path.to_path_buf(),
                index,
            };

            let Some(name) = &object.name else {
                self.issues.add(ValidationIssue::warning(
                    IssueCode::MissingObjectName,
                    "object without <name>",
                    context(),
                ));
                continue;
            };
            *self.class_counts.entry(name.clone()).or_insert(0) += 1;

            let bbox = match &object.bndbox {
                Ok(bbox) => bbox,
                Err(message) => {
                    self.issues.add(ValidationIssue::warning(
                        IssueCode::MalformedBox,
                        message.clone(),
                        context(),
                    ));
                    continue;
                }
            };

            if bbox.is_finite() {
                let sizes = self.box_sizes.entry(name.clone()).or_default();
                sizes.0.push(bbox.width().abs());
                sizes.1.push(bbox.height().abs());
            }

            let Some(size) = size else {
                continue;
            };
            match classify_box(bbox, size, min_box_area) {
                BoxVerdict::Valid => {}
                BoxVerdict::Invertible => self.issues.add(ValidationIssue::error(
                    IssueCode::InvertedBox,
                    format!("{name} box {bbox} has swapped corners"),
                    context(),
                )),
                BoxVerdict::Invalid(InvalidReason::OutOfFrame) => {
                    self.issues.add(ValidationIssue::warning(
                        IssueCode::BoxOutOfFrame,
                        format!("{name} box {bbox} leaves the {size} frame"),
                        context(),
                    ))
                }
                BoxVerdict::Invalid(reason @ InvalidReason::TooSmall { .. }) => {
                    self.issues.add(ValidationIssue::warning(
                        IssueCode::BoxTooSmall,
                        format!("{name} box {bbox}: {reason}"),
                        context(),
                    ))
                }
                BoxVerdict::Invalid(reason) => self.issues.add(ValidationIssue::error(
                    IssueCode::DegenerateBox,
                    format!("{name} box {bbox}: {reason}"),
                    context(),
                )),
            }
        }
    }
}

fn file_context(path: &Path) -> IssueContext {
    IssueContext::File {
        path: path.to_path_buf(),
    }
}

impl fmt::Display for VocCheckReport {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        writeln!(
            f,
            "VOC check: {} annotation(s) in {}, {} image(s) in {}",
            self.xml_files,
            self.annotations_dir.display(),
            self.images,
            self.images_dir.display()
        )?;
        writeln!(
            f,
            "  image width  min/avg/max: {}",
            self.image_width.display(0)
        )?;
        writeln!(
            f,
            "  image height min/avg/max: {}",
            self.image_height.display(0)
        )?;

        writeln!(f)?;
        writeln!(f, "Classes ({} object(s)):", self.objects)?;
        for entry in &self.class_counts {
            let sizes = self.box_sizes.iter().find(|s| s.name == entry.name);
            writeln!(
                f,
                "  {:<20} {:>7} {:>5.1}%  w {:>20}  h {:>20}",
                entry.name,
                entry.count,
                entry.percent,
                sizes.map_or_else(|| "-".to_string(), |s| s.width.display(1)),
                sizes.map_or_else(|| "-".to_string(), |s| s.height.display(1)),
            )?;
        }
        if !self.names_missing_from_data.is_empty() {
            writeln!(
                f,
                "  never used: {}",
                self.names_missing_from_data.join(", ")
            )?;
        }
        if !self.names_unknown_to_table.is_empty() {
            writeln!(
                f,
                "  not in class table: {}",
                self.names_unknown_to_table.join(", ")
            )?;
        }

        writeln!(f)?;
        write!(f, "{}", self.issues)?;

        writeln!(f)?;
        if self.passed {
            writeln!(f, "Verdict: PASS")
        } else {
            writeln!(
                f,
                "Verdict: FAIL ({} problem(s): {} annotation(s) without image, {} image(s) without annotation, {} error file(s), {} class name mismatch(es))",
                self.problem_count(),
                self.xml_without_image.len(),
                self.image_without_xml.len(),
                self.error_files.len(),
                self.names_missing_from_data.len() + self.names_unknown_to_table.len()
            )
        }
    }
}
