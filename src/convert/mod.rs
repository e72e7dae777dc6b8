//! VOC to YOLO conversion.
//!
//! Reads a Pascal VOC tree (`Annotations/`, `JPEGImages/`,
//! `ImageSets/Main/<split>.txt`) and writes `<output>/<split>/{images,labels}`
//! plus `data.yaml`. Fatal problems (bad layout, missing split list) surface
//! before anything is written; everything else is recorded in the
//! [`ConversionReport`] and the run continues with the next file.

mod report;

pub use report::{
    ConversionIssue, ConversionIssueCode, ConversionReport, ConversionSeverity, SplitCounts,
};

use std::collections::BTreeSet;
use std::fs;
use std::path::{Path, PathBuf};

use crate::config::ClassTable;
use crate::error::BoardlabelError;
use crate::ir::io_voc_xml::{collect_xml_files, read_source_annotation, VOC_XML_EXTENSION};
use crate::ir::io_yolo::{label_path, write_data_yaml, write_label_file, IMAGES_DIR, LABELS_DIR};
use crate::ir::{AnnotationRecord, SampleKey, SkippedObject, SourceAnnotation};
use crate::normalize::normalize_box;
use crate::split::{assign_from_lists, RatioSplitter, Split, SplitAssignment, SplitRatios};
use crate::validation::{check_box, BoxCheck, BoxRules};

/// Directory names of a Pascal VOC tree.
pub const VOC_ANNOTATIONS_DIR: &str = "Annotations";
pub const VOC_IMAGES_DIR: &str = "JPEGImages";
pub const VOC_IMAGE_SETS_DIR: &str = "ImageSets/Main";

/// Where a VOC dataset keeps its parts.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct VocLayout {
    pub annotations: PathBuf,
    pub images: PathBuf,
    pub image_sets: PathBuf,
}

impl VocLayout {
    /// Standard layout under `root`. Only `Annotations/` must exist.
    pub fn discover(root: &Path) -> Result<Self, BoardlabelError> {
        let layout = Self {
            annotations: root.join(VOC_ANNOTATIONS_DIR),
            images: root.join(VOC_IMAGES_DIR),
            image_sets: root.join(VOC_IMAGE_SETS_DIR),
        };

        if !layout.annotations.is_dir() {
            return Err(BoardlabelError::LayoutInvalid {
                path: root.to_path_buf(),
                message: format!("expected an {VOC_ANNOTATIONS_DIR}/ directory"),
            });
        }
        Ok(layout)
    }
}

/// How keys are assigned to splits.
#[derive(Clone, Debug, PartialEq)]
pub enum SplitPolicy {
    /// Read `<image_sets>/<split>.txt` for each listed split.
    Lists { splits: Vec<Split> },
    /// Shuffle every annotation key with a fixed seed.
    Ratio { ratios: SplitRatios, seed: u64 },
}

impl SplitPolicy {
    fn name(&self) -> &'static str {
        match self {
            SplitPolicy::Lists { .. } => "lists",
            SplitPolicy::Ratio { .. } => "ratio",
        }
    }
}

#[derive(Clone, Debug)]
pub struct ConvertOptions {
    pub layout: VocLayout,
    pub output: PathBuf,
    pub split_policy: SplitPolicy,
    pub rules: BoxRules,
    /// Image extensions tried when the annotated file name is not found.
    pub image_extensions: Vec<String>,
}

/// Run the whole conversion.
pub fn convert_voc_to_yolo(
    options: &ConvertOptions,
    classes: &ClassTable,
) -> Result<ConversionReport, BoardlabelError> {
    let layout = &options.layout;
    let source_keys = annotation_keys(&layout.annotations)?;

    let assignment = match &options.split_policy {
        SplitPolicy::Lists { splits } => assign_from_lists(&layout.image_sets, splits)?,
        SplitPolicy::Ratio { ratios, seed } => {
            let keys: Vec<SampleKey> = source_keys.iter().cloned().collect();
            RatioSplitter::new(*ratios, *seed).assign(&keys)
        }
    };

    let mut report = ConversionReport::new(
        layout
            .annotations
            .parent()
            .unwrap_or(&layout.annotations)
            .to_path_buf(),
        &options.output,
    );
    report.split_policy = options.split_policy.name().to_string();
    report.excluded_keys = source_keys
        .iter()
        .filter(|key| assignment.split_of(key).is_none())
        .count();
    if report.excluded_keys > 0 {
        tracing::info!(
            "{} annotation(s) are not listed in any split and will be skipped",
            report.excluded_keys
        );
    }
    if !layout.images.is_dir() {
        tracing::warn!(
            dir = %layout.images.display(),
            "image directory does not exist; no images will be copied"
        );
    }

    let candidates = extension_candidates(&options.image_extensions);
    for (split, keys) in assignment.iter() {
        let split_root = options.output.join(split.name());
        let images_out = split_root.join(IMAGES_DIR);
        let labels_out = split_root.join(LABELS_DIR);
        fs::create_dir_all(&images_out).map_err(BoardlabelError::Io)?;
        fs::create_dir_all(&labels_out).map_err(BoardlabelError::Io)?;

        let mut counts = SplitCounts::default();
        for key in keys {
            let xml_path = layout
                .annotations
                .join(key.file_name(VOC_XML_EXTENSION));
            if !xml_path.is_file() {
                tracing::warn!(key = %key, "no annotation file for listed key");
                report.add(ConversionIssue::warning(
                    ConversionIssueCode::MissingAnnotation,
                    key,
                    format!("{} does not exist", xml_path.display()),
                ));
                continue;
            }

            let source = match read_source_annotation(&xml_path, classes) {
                Ok(source) => source,
                Err(err) => {
                    tracing::warn!(key = %key, "skipping annotation: {err}");
                    report.add(ConversionIssue::warning(
                        ConversionIssueCode::StructuralSkip,
                        key,
                        err.to_string(),
                    ));
                    continue;
                }
            };

            let records = match build_records(key, &source, &options.rules, &mut report) {
                Ok(records) => records,
                Err(err) => {
                    tracing::warn!(key = %key, "skipping annotation: {err}");
                    report.add(ConversionIssue::warning(
                        ConversionIssueCode::StructuralSkip,
                        key,
                        err.to_string(),
                    ));
                    continue;
                }
            };

            write_label_file(&label_path(&labels_out, key), &records)?;
            counts.files += 1;
            counts.objects += records.len();

            if let Err(message) =
                copy_image(&layout.images, &images_out, key, &source.filename, &candidates)
            {
                tracing::warn!(key = %key, "{message}");
                report.add(ConversionIssue::warning(
                    ConversionIssueCode::ImageCopyFailed,
                    key,
                    message,
                ));
            }
        }

        tracing::debug!(
            split = split.name(),
            files = counts.files,
            objects = counts.objects,
            "split written"
        );
        report.splits.insert(split, counts);
    }

    write_data_yaml(&options.output, &assignment.splits(), classes)?;

    Ok(report)
}

/// Sample keys of every annotation file in the directory.
fn annotation_keys(dir: &Path) -> Result<BTreeSet<SampleKey>, BoardlabelError> {
    Ok(collect_xml_files(dir)?
        .iter()
        .filter_map(|path| SampleKey::from_path(path))
        .collect())
}

/// Validate, repair and normalize the objects of one annotation.
///
/// Per-object problems are recorded in `report`; an error means the whole
/// file has to be skipped.
fn build_records(
    key: &SampleKey,
    source: &SourceAnnotation,
    rules: &BoxRules,
    report: &mut ConversionReport,
) -> Result<Vec<AnnotationRecord>, BoardlabelError> {
    if source.size.width < 1 || source.size.height < 1 {
        return Err(BoardlabelError::DegenerateImage {
            width: source.size.width,
            height: source.size.height,
        });
    }

    for skipped in &source.skipped {
        let (code, message) = match skipped {
            SkippedObject::UnknownClass { name } => (
                ConversionIssueCode::UnknownClass,
                format!("unknown class '{name}'"),
            ),
            SkippedObject::MissingName => (
                ConversionIssueCode::UnknownClass,
                "object without <name>".to_string(),
            ),
            SkippedObject::MalformedBox { message } => {
                (ConversionIssueCode::GeometryDrop, message.clone())
            }
        };
        tracing::warn!(key = %key, "skipping object: {message}");
        report.add(ConversionIssue::warning(code, key, message));
    }

    let mut records = Vec::with_capacity(source.objects.len());
    for object in &source.objects {
        match check_box(&object.bbox, source.size, rules) {
            BoxCheck::Accepted {
                bbox,
                repaired,
                out_of_frame,
            } => {
                if repaired {
                    tracing::info!(key = %key, "swapped inverted corners of {}", object.bbox);
                    report.add(ConversionIssue::info(
                        ConversionIssueCode::BoxRepaired,
                        key,
                        format!("{} box {} swapped to {}", object.class_name, object.bbox, bbox),
                    ));
                }
                if out_of_frame {
                    tracing::warn!(
                        key = %key,
                        "{} box {} leaves the {} frame",
                        object.class_name,
                        object.bbox,
                        source.size
                    );
                    report.add(ConversionIssue::info(
                        ConversionIssueCode::BoxOutOfFrame,
                        key,
                        format!(
                            "{} box {} leaves the {} frame; clamped on normalization",
                            object.class_name, object.bbox, source.size
                        ),
                    ));
                }
                records.push(AnnotationRecord::new(
                    object.class_id,
                    normalize_box(&bbox, source.size)?,
                ));
            }
            BoxCheck::Rejected { reason, .. } => {
                tracing::warn!(key = %key, "dropping {} box {}: {reason}", object.class_name, object.bbox);
                report.add(ConversionIssue::warning(
                    ConversionIssueCode::GeometryDrop,
                    key,
                    format!("{} box {}: {reason}", object.class_name, object.bbox),
                ));
            }
        }
    }

    Ok(records)
}

/// Configured extensions followed by their upper-case spellings.
fn extension_candidates(extensions: &[String]) -> Vec<String> {
    let mut candidates: Vec<String> = extensions.iter().map(|ext| ext.to_lowercase()).collect();
    for ext in extensions {
        let upper = ext.to_uppercase();
        if !candidates.contains(&upper) {
            candidates.push(upper);
        }
    }
    candidates
}

/// Find the image of `key` and copy it, keeping its file name.
///
/// The annotated file name (its last component) is tried first, then
/// `<key>.<ext>` for every candidate extension.
fn copy_image(
    images_dir: &Path,
    images_out: &Path,
    key: &SampleKey,
    annotated_name: &str,
    candidates: &[String],
) -> Result<PathBuf, String> {
    // Only the last component counts, so a crafted name cannot leave `images_dir`.
    let annotated = Path::new(annotated_name)
        .file_name()
        .map(|name| images_dir.join(name));
    let found = annotated
        .into_iter()
        .chain(candidates.iter().map(|ext| images_dir.join(key.file_name(ext))))
        .find(|path| path.is_file())
        .ok_or_else(|| {
            format!(
                "no image for '{key}' in {} (tried {annotated_name} and {} extension(s))",
                images_dir.display(),
                candidates.len()
            )
        })?;

    let file_name = found
        .file_name()
        .ok_or_else(|| format!("image path {} has no file name", found.display()))?;
    let target = images_out.join(file_name);
    fs::copy(&found, &target)
        .map_err(|err| format!("failed to copy {}: {err}", found.display()))?;
    Ok(target)
}
