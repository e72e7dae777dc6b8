//! Re-split a flat YOLO dataset (`<dir>/{images,labels}`) into
//! `<out>/<split>/{images,labels}`.

use std::collections::BTreeMap;
use std::fmt;
use std::fs;
use std::path::{Path, PathBuf};

use serde::Serialize;

use super::{RatioSplitter, Split, SplitRatios};
use crate::error::BoardlabelError;
use crate::ir::io_yolo::{index_files_by_key, label_path, IMAGES_DIR, LABELS_DIR};
use crate::ir::SampleKey;

#[derive(Clone, Debug)]
pub struct ResplitOptions {
    pub ratios: SplitRatios,
    pub seed: u64,
    pub image_extensions: Vec<String>,
}

/// Outcome of a re-split run.
#[derive(Clone, Debug, Default, Serialize)]
pub struct ResplitReport {
    pub input: PathBuf,
    pub output: PathBuf,
    pub seed: u64,
    /// Images copied per split.
    pub images: BTreeMap<Split, usize>,
    /// Images that had no label file.
    pub missing_labels: Vec<SampleKey>,
    /// Images whose copy failed.
    pub copy_failures: Vec<SampleKey>,
}

impl ResplitReport {
    pub fn total_images(&self) -> usize {
        self.images.values().sum()
    }
}

impl fmt::Display for ResplitReport {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        writeln!(
            f,
            "Split {} -> {} (seed {})",
            self.input.display(),
            self.output.display(),
            self.seed
        )?;
        for (split, count) in &self.images {
            writeln!(f, "  {:<6} {} image(s)", split.name(), count)?;
        }
        writeln!(f, "  total  {} image(s)", self.total_images())?;
        if !self.missing_labels.is_empty() {
            writeln!(f, "  missing labels: {}", self.missing_labels.len())?;
        }
        if !self.copy_failures.is_empty() {
            writeln!(f, "  copy failures: {}", self.copy_failures.len())?;
        }
        Ok(())
    }
}

/// Assign every image under `input/images` to a split and copy it, with its
/// label when one exists, under `output`.
///
/// Images keep their file names. A missing label is counted and the image is
/// still copied, so the checker reports it afterwards.
pub fn resplit_yolo_dir(
    input: &Path,
    output: &Path,
    options: &ResplitOptions,
) -> Result<ResplitReport, BoardlabelError> {
    let images_dir = input.join(IMAGES_DIR);
    let labels_dir = input.join(LABELS_DIR);
    let images = index_files_by_key(&images_dir, &options.image_extensions)?;
    for key in &images.duplicates {
        tracing::warn!(key = %key, "several images share this stem; using the first");
    }

    let keys: Vec<SampleKey> = images.files.keys().cloned().collect();
    let assignment = RatioSplitter::new(options.ratios, options.seed).assign(&keys);

    let mut report = ResplitReport {
        input: input.to_path_buf(),
        output: output.to_path_buf(),
        seed: options.seed,
        ..Default::default()
    };

    for (split, split_keys) in assignment.iter() {
        let out_images = output.join(split.name()).join(IMAGES_DIR);
        let out_labels = output.join(split.name()).join(LABELS_DIR);
        fs::create_dir_all(&out_images).map_err(BoardlabelError::Io)?;
        fs::create_dir_all(&out_labels).map_err(BoardlabelError::Io)?;

        let mut copied = 0;
        for key in split_keys {
            let Some(image) = images.files.get(key) else {
                continue;
            };
            let Some(file_name) = image.file_name() else {
                continue;
            };

            if let Err(err) = fs::copy(image, out_images.join(file_name)) {
                tracing::warn!(image = %image.display(), "failed to copy image: {err}");
                report.copy_failures.push(key.clone());
                continue;
            }
            copied += 1;

            let label = label_path(&labels_dir, key);
            if label.is_file() {
                fs::copy(&label, label_path(&out_labels, key)).map_err(BoardlabelError::Io)?;
            } else {
                tracing::warn!(key = %key, "no label file for image");
                report.missing_labels.push(key.clone());
            }
        }
        report.images.insert(split, copied);
    }

    Ok(report)
}
