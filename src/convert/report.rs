//! Run summary for `convert`.
//!
//! Every non-fatal event of a run is recorded as a [`ConversionIssue`];
//! the summary groups them by code so a run can be judged at a glance.

use std::collections::BTreeMap;
use std::fmt;
use std::path::PathBuf;

use serde::Serialize;

use crate::ir::SampleKey;
use crate::split::Split;

/// Everything that happened during one conversion run.
#[derive(Clone, Debug, Default, Serialize)]
pub struct ConversionReport {
    pub source: PathBuf,
    pub output: PathBuf,
    /// How keys were assigned (`lists` or `ratio`).
    pub split_policy: String,
    /// Samples and objects written per split.
    pub splits: BTreeMap<Split, SplitCounts>,
    /// Source annotations that were not in any split list.
    pub excluded_keys: usize,
    pub issues: Vec<ConversionIssue>,
}

impl ConversionReport {
    pub fn new(source: impl Into<PathBuf>, output: impl Into<PathBuf>) -> Self {
        Self {
            source: source.into(),
            output: output.into(),
            ..Default::default()
        }
    }

    pub fn add(&mut self, issue: ConversionIssue) {
        self.issues.push(issue);
    }

    /// Number of issues with the given code.
    pub fn count(&self, code: ConversionIssueCode) -> usize {
        self.issues.iter().filter(|i| i.code == code).count()
    }

    pub fn warning_count(&self) -> usize {
        self.issues
            .iter()
            .filter(|i| i.severity == ConversionSeverity::Warning)
            .count()
    }

    /// Label files written across all splits.
    pub fn files_written(&self) -> usize {
        self.splits.values().map(|c| c.files).sum()
    }

    /// Label lines written across all splits.
    pub fn objects_written(&self) -> usize {
        self.splits.values().map(|c| c.objects).sum()
    }

    /// Issue counts by code, for the summary.
    pub fn counts_by_code(&self) -> BTreeMap<ConversionIssueCode, usize> {
        let mut counts = BTreeMap::new();
        for issue in &self.issues {
            *counts.entry(issue.code).or_insert(0) += 1;
        }
        counts
    }
}

impl fmt::Display for ConversionReport {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        writeln!(
            f,
            "Converted {} -> {} ({} split)",
            self.source.display(),
            self.output.display(),
            self.split_policy
        )?;
        for (split, counts) in &self.splits {
            writeln!(
                f,
                "  {:<6} {} label file(s), {} object(s)",
                split.name(),
                counts.files,
                counts.objects
            )?;
        }
        writeln!(
            f,
            "  total  {} label file(s), {} object(s)",
            self.files_written(),
            self.objects_written()
        )?;
        if self.excluded_keys > 0 {
            writeln!(
                f,
                "  {} annotation(s) not listed in any split",
                self.excluded_keys
            )?;
        }

        let counts = self.counts_by_code();
        if !counts.is_empty() {
            writeln!(f)?;
            writeln!(f, "Summary:")?;
            for (code, count) in counts {
                writeln!(f, "  {:<24} {}", code.label(), count)?;
            }
        }

        Ok(())
    }
}

#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize)]
pub struct SplitCounts {
    pub files: usize,
    pub objects: usize,
}

/// A single non-fatal event.
#[derive(Clone, Debug, Serialize)]
pub struct ConversionIssue {
    pub severity: ConversionSeverity,
    pub code: ConversionIssueCode,
    pub key: SampleKey,
    pub message: String,
}

impl ConversionIssue {
    pub fn warning(code: ConversionIssueCode, key: &SampleKey, message: impl Into<String>) -> Self {
        Self {
            severity: ConversionSeverity::Warning,
            code,
            key: key.clone(),
            message: message.into(),
        }
    }

    pub fn info(code: ConversionIssueCode, key: &SampleKey, message: impl Into<String>) -> Self {
        Self {
            severity: ConversionSeverity::Info,
            code,
            key: key.clone(),
            message: message.into(),
        }
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum ConversionSeverity {
    /// Data was skipped or dropped.
    Warning,
    /// Data was kept, possibly modified.
    Info,
}

/// Stable issue codes. These are part of the JSON output.
#[derive(Clone, Copy, Debug, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum ConversionIssueCode {
    /// Listed key without an annotation file.
    MissingAnnotation,
    /// Annotation skipped: unparseable, no size, no filename, or a zero-sized image.
    StructuralSkip,
    /// Object skipped: class name not in the class table, or no name at all.
    UnknownClass,
    /// Object dropped: unreadable or invalid box.
    GeometryDrop,
    /// Object kept after swapping inverted corners.
    BoxRepaired,
    /// Object kept although it leaves the image frame.
    BoxOutOfFrame,
    /// Label written but the image could not be found or copied.
    ImageCopyFailed,
}

impl ConversionIssueCode {
    pub fn label(self) -> &'static str {
        match self {
            ConversionIssueCode::MissingAnnotation => "missing annotations",
            ConversionIssueCode::StructuralSkip => "skipped files",
            ConversionIssueCode::UnknownClass => "unknown-class objects",
            ConversionIssueCode::GeometryDrop => "dropped boxes",
            ConversionIssueCode::BoxRepaired => "repaired boxes",
            ConversionIssueCode::BoxOutOfFrame => "out-of-frame boxes",
            ConversionIssueCode::ImageCopyFailed => "image copy failures",
        }
    }
}
