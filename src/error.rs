use std::path::PathBuf;
use thiserror::Error;

use crate::check::CheckReport;

/// The main error type for boardlabel operations.
///
/// Only conditions that abort a whole command live here. Per-file problems
/// met during a batch (a skipped XML, a dropped box, a missing image) are
/// recorded in the command's report instead.
#[derive(Debug, Error)]
pub enum BoardlabelError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Failed to parse VOC XML {path}: {message}")]
    VocXmlParse { path: PathBuf, message: String },

    #[error("VOC annotation {path} has no <size> block")]
    MissingSize { path: PathBuf },

    #[error("VOC annotation {path} has no <filename>")]
    MissingFilename { path: PathBuf },

    #[error("Degenerate image size {width}x{height} (both sides must be at least 1 pixel)")]
    DegenerateImage { width: u32, height: u32 },

    #[error("Invalid split ratios: {message}")]
    InvalidRatio { message: String },

    #[error("Split list file not found: {path}")]
    MissingSplitList { path: PathBuf },

    #[error("Invalid dataset layout at {path}: {message}")]
    LayoutInvalid { path: PathBuf, message: String },

    #[error("Failed to parse config {path}: {source}")]
    ConfigParse {
        path: PathBuf,
        #[source]
        source: serde_yaml::Error,
    },

    #[error("Invalid config: {message}")]
    ConfigInvalid { message: String },

    #[error("Unknown class '{name}' (known classes: {known})")]
    UnknownClass { name: String, known: String },

    #[error("Failed to parse detections from {path}: {source}")]
    DetectionsParse {
        path: PathBuf,
        #[source]
        source: serde_json::Error,
    },

    #[error("Failed to serialize report: {0}")]
    ReportSerialize(#[source] serde_json::Error),

    #[error("Dataset check failed: {dangling} dangling reference(s), {error_files} error file(s)")]
    CheckFailed {
        dangling: usize,
        error_files: usize,
        report: Box<CheckReport>,
    },

    #[error("VOC dataset check failed: {problems} problem(s) found")]
    VocCheckFailed { problems: usize },
}
