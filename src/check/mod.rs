//! Read-only audits.
//!
//! [`check_yolo_dataset`] audits a converted dataset: image/label pairing,
//! label line syntax and ranges, and per-class statistics. It passes iff no
//! key is dangling and no label file has a rejected line. The VOC source
//! audit lives in [`voc`].

mod report;
pub mod voc;

pub use report::{CheckReport, ClassStats, ErrorFile, LineError, SizeStats, StoreReport};

use std::collections::BTreeMap;
use std::fs;
use std::path::{Path, PathBuf};

use crate::config::ClassTable;
use crate::error::BoardlabelError;
use crate::ir::io_yolo::{index_files_by_key, parse_label_line, IMAGES_DIR, LABELS_DIR, LABEL_EXTENSION};
use crate::ir::{ClassId, SampleKey};
use crate::split::Split;

/// Audit a converted dataset.
///
/// `root` either holds `images/` and `labels/` directly, or one
/// `<split>/{images,labels}` pair per split present.
pub fn check_yolo_dataset(
    root: &Path,
    classes: &ClassTable,
    image_extensions: &[String],
) -> Result<CheckReport, BoardlabelError> {
    let pairs = discover_stores(root)?;

    let mut tally = ClassTally::new(classes);
    let mut stores = Vec::with_capacity(pairs.len());
    for (name, store_root) in pairs {
        stores.push(check_store(
            name,
            &store_root,
            classes,
            image_extensions,
            &mut tally,
        )?);
    }

    Ok(CheckReport::new(root.to_path_buf(), stores, tally.finish()))
}

fn discover_stores(root: &Path) -> Result<Vec<(String, PathBuf)>, BoardlabelError> {
    let is_store = |dir: &Path| dir.join(IMAGES_DIR).is_dir() && dir.join(LABELS_DIR).is_dir();

    if is_store(root) {
        return Ok(vec![(".".to_string(), root.to_path_buf())]);
    }

    let stores: Vec<(String, PathBuf)> = Split::ALL
        .iter()
        .map(|split| (split.name().to_string(), root.join(split.name())))
        .filter(|(_, dir)| is_store(dir))
        .collect();

    if stores.is_empty() {
        return Err(BoardlabelError::LayoutInvalid {
            path: root.to_path_buf(),
            message: "expected images/ and labels/, or <split>/images and <split>/labels"
                .to_string(),
        });
    }
    Ok(stores)
}

fn check_store(
    name: String,
    store_root: &Path,
    classes: &ClassTable,
    image_extensions: &[String],
    tally: &mut ClassTally,
) -> Result<StoreReport, BoardlabelError> {
    let images = index_files_by_key(&store_root.join(IMAGES_DIR), image_extensions)?;
    let labels = index_files_by_key(&store_root.join(LABELS_DIR), &[LABEL_EXTENSION.to_string()])?;

    let mut report = StoreReport {
        name,
        images: images.files.len(),
        labels: labels.files.len(),
        images_without_labels: difference(&images.files, &labels.files),
        labels_without_images: difference(&labels.files, &images.files),
        duplicate_image_keys: images.duplicates,
        ..Default::default()
    };

    for (key, label_path) in &labels.files {
        if !images.files.contains_key(key) {
            continue;
        }

        let content = match fs::read_to_string(label_path) {
            Ok(content) => content,
            Err(err) => {
                tracing::warn!(path = %label_path.display(), "cannot read label file: {err}");
                report.error_files.push(ErrorFile {
                    path: label_path.clone(),
                    unreadable: Some(err.to_string()),
                    lines: Vec::new(),
                });
                continue;
            }
        };
        let mut rejected = Vec::new();
        let mut objects = 0;
        for (idx, line) in content.lines().enumerate() {
            match parse_label_line(line, classes) {
                Ok(Some(record)) => {
                    objects += 1;
                    let [_, _, w, h] = record.bbox.components();
                    tally.push(record.class_id, w, h);
                }
                Ok(None) => {}
                Err(issue) => rejected.push(LineError {
                    line: idx + 1,
                    issue,
                }),
            }
        }

        if objects == 0 && rejected.is_empty() {
            report.empty_label_files += 1;
        }
        if !rejected.is_empty() {
            tracing::debug!(
                path = %label_path.display(),
                "{} rejected line(s)",
                rejected.len()
            );
            report.error_files.push(ErrorFile {
                path: label_path.clone(),
                unreadable: None,
                lines: rejected,
            });
        }
    }

    Ok(report)
}

fn difference(
    left: &BTreeMap<SampleKey, PathBuf>,
    right: &BTreeMap<SampleKey, PathBuf>,
) -> Vec<SampleKey> {
    left.keys()
        .filter(|key| !right.contains_key(*key))
        .cloned()
        .collect()
}

struct ClassTally {
    stats: Vec<ClassStats>,
}

impl ClassTally {
    fn new(classes: &ClassTable) -> Self {
        Self {
            stats: classes
                .iter()
                .map(|(class_id, name)| ClassStats {
                    class_id,
                    name: name.to_string(),
                    count: 0,
                    width: SizeStats::default(),
                    height: SizeStats::default(),
                })
                .collect(),
        }
    }

    fn push(&mut self, class_id: ClassId, width: f64, height: f64) {
        if let Some(stats) = self.stats.get_mut(class_id.index()) {
            stats.count += 1;
            stats.width.push(width);
            stats.height.push(height);
        }
    }

    fn finish(self) -> Vec<ClassStats> {
        self.stats
    }
}
