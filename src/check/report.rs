//! Reports produced by the dataset checkers.

use std::fmt;
use std::path::PathBuf;

use serde::Serialize;

use crate::ir::io_yolo::LineIssue;
use crate::ir::{ClassId, SampleKey};

// Longest key list printed in text output; JSON always carries the full set.
const MAX_LISTED: usize = 20;

/// Result of auditing a converted dataset.
#[derive(Clone, Debug, Serialize)]
pub struct CheckReport {
    pub root: PathBuf,
    /// One entry per audited images/labels pair (a split, or the root itself).
    pub stores: Vec<StoreReport>,
    /// Per-class statistics over every passing line, in class-id order.
    pub classes: Vec<ClassStats>,
    pub passed: bool,
}

impl CheckReport {
    pub fn new(root: PathBuf, stores: Vec<StoreReport>, classes: Vec<ClassStats>) -> Self {
        let passed = stores.iter().all(StoreReport::is_clean);
        Self {
            root,
            stores,
            classes,
            passed,
        }
    }

    /// Keys present on only one side, over all stores.
    pub fn dangling_count(&self) -> usize {
        self.stores
            .iter()
            .map(|s| s.images_without_labels.len() + s.labels_without_images.len())
            .sum()
    }

    pub fn error_file_count(&self) -> usize {
        self.stores.iter().map(|s| s.error_files.len()).sum()
    }

    pub fn total_objects(&self) -> usize {
        self.classes.iter().map(|c| c.count).sum()
    }
}

impl fmt::Display for CheckReport {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        writeln!(f, "Dataset check: {}", self.root.display())?;

        for store in &self.stores {
            writeln!(f)?;
            write!(f, "{store}")?;
        }

        writeln!(f)?;
        writeln!(f, "Classes ({} object(s)):", self.total_objects())?;
        writeln!(
            f,
            "  {:<3} {:<20} {:>7}  {:>26}  {:>26}",
            "id", "name", "count", "width min/avg/max", "height min/avg/max"
        )?;
        for class in &self.classes {
            writeln!(
                f,
                "  {:<3} {:<20} {:>7}  {:>26}  {:>26}",
                class.class_id.as_u32(),
                class.name,
                class.count,
                class.width.display(6),
                class.height.display(6)
            )?;
        }

        writeln!(f)?;
        if self.passed {
            writeln!(f, "Verdict: PASS")
        } else {
            writeln!(
                f,
                "Verdict: FAIL ({} dangling reference(s), {} error file(s))",
                self.dangling_count(),
                self.error_file_count()
            )
        }
    }
}

/// Audit of one images/labels pair.
#[derive(Clone, Debug, Default, Serialize)]
pub struct StoreReport {
    /// Split name, or `.` when the root itself holds `images/` and `labels/`.
    pub name: String,
    pub images: usize,
    pub labels: usize,
    pub images_without_labels: Vec<SampleKey>,
    pub labels_without_images: Vec<SampleKey>,
    /// Stems shared by more than one image. Reported only.
    pub duplicate_image_keys: Vec<SampleKey>,
    /// Label files with no lines (negative samples). Reported only.
    pub empty_label_files: usize,
    pub error_files: Vec<ErrorFile>,
}

impl StoreReport {
    pub fn is_clean(&self) -> bool {
        self.images_without_labels.is_empty()
            && self.labels_without_images.is_empty()
            && self.error_files.is_empty()
    }
}

impl fmt::Display for StoreReport {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        writeln!(
            f,
            "[{}] {} image(s), {} label file(s), {} empty",
            self.name, self.images, self.labels, self.empty_label_files
        )?;
        write_key_list(f, "images without labels", &self.images_without_labels)?;
        write_key_list(f, "labels without images", &self.labels_without_images)?;
        write_key_list(f, "duplicate image stems", &self.duplicate_image_keys)?;

        if !self.error_files.is_empty() {
            writeln!(f, "  error files ({}):", self.error_files.len())?;
            for file in &self.error_files {
                writeln!(f, "    {}", file.path.display())?;
                if let Some(message) = &file.unreadable {
                    writeln!(f, "      unreadable: {message}")?;
                }
                for line in &file.lines {
                    writeln!(f, "      line {}: {}", line.line, line.issue)?;
                }
            }
        }
        Ok(())
    }
}

fn write_key_list(f: &mut fmt::Formatter<'_>, title: &str, keys: &[SampleKey]) -> fmt::Result {
    if keys.is_empty() {
        return Ok(());
    }
    writeln!(f, "  {title} ({}):", keys.len())?;
    for key in keys.iter().take(MAX_LISTED) {
        writeln!(f, "    {key}")?;
    }
    if keys.len() > MAX_LISTED {
        writeln!(f, "    ... and {} more", keys.len() - MAX_LISTED)?;
    }
    Ok(())
}

/// A label file with at least one rejected line.
#[derive(Clone, Debug, Serialize)]
pub struct ErrorFile {
    pub path: PathBuf,
    /// Set when the file could not be read as text; `lines` is then empty.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub unreadable: Option<String>,
    pub lines: Vec<LineError>,
}

#[derive(Clone, Debug, Serialize)]
pub struct LineError {
    /// 1-based line number.
    pub line: usize,
    pub issue: LineIssue,
}

/// Object count and box size statistics for one class.
#[derive(Clone, Debug, Serialize)]
pub struct ClassStats {
    pub class_id: ClassId,
    pub name: String,
    pub count: usize,
    pub width: SizeStats,
    pub height: SizeStats,
}

/// Running min/avg/max of a series of values.
#[derive(Clone, Copy, Debug, Default, PartialEq, Serialize)]
pub struct SizeStats {
    pub count: usize,
    pub min: Option<f64>,
    pub max: Option<f64>,
    pub mean: Option<f64>,
    #[serde(skip)]
    sum: f64,
}

impl SizeStats {
    pub fn push(&mut self, value: f64) {
        self.count += 1;
        self.sum += value;
        self.min = Some(self.min.map_or(value, |m| m.min(value)));
        self.max = Some(self.max.map_or(value, |m| m.max(value)));
        self.mean = Some(self.sum / self.count as f64);
    }

    /// `min/avg/max` with the given precision, or `-` when empty.
    pub fn display(&self, precision: usize) -> String {
        match (self.min, self.mean, self.max) {
            (Some(min), Some(mean), Some(max)) => {
                format!("{min:.precision$}/{mean:.precision$}/{max:.precision$}")
            }
            _ => "-".to_string(),
        }
    }
}
