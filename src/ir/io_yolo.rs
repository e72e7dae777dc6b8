//! YOLO text labels and the `data.yaml` dataset descriptor.
//!
//! A label file holds one object per line:
//! `<class_id> <x_center> <y_center> <width> <height>`, the four floats
//! normalized to the image and written with six decimals.

use std::collections::BTreeMap;
use std::fs;
use std::io::Write;
use std::path::{Path, PathBuf};

use serde::Serialize;

use super::{AnnotationRecord, BBoxCxCyWh, ClassId, Normalized, SampleKey};
use crate::config::{has_extension, ClassTable};
use crate::error::BoardlabelError;
use crate::split::Split;

pub const LABEL_EXTENSION: &str = "txt";
pub const IMAGES_DIR: &str = "images";
pub const LABELS_DIR: &str = "labels";

/// Render one record as a label line, without the trailing newline.
pub fn format_label_line(record: &AnnotationRecord) -> String {
    let [cx, cy, w, h] = record.bbox.components();
    format!("{} {:.6} {:.6} {:.6} {:.6}", record.class_id, cx, cy, w, h)
}

/// Write a label file, one line per record in the given order.
///
/// An empty slice produces an empty file: the image is a negative sample.
pub fn write_label_file(path: &Path, records: &[AnnotationRecord]) -> Result<(), BoardlabelError> {
    if let Some(parent) = path.parent() {
        fs::create_dir_all(parent).map_err(BoardlabelError::Io)?;
    }

    let mut file = fs::File::create(path).map_err(BoardlabelError::Io)?;
    for record in records {
        writeln!(file, "{}", format_label_line(record)).map_err(BoardlabelError::Io)?;
    }
    Ok(())
}

/// Why a label line was rejected.
#[derive(Clone, Debug, PartialEq, Serialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum LineIssue {
    TokenCount { found: usize },
    InvalidClassId { raw: String },
    UnknownClassId { id: i64 },
    InvalidNumber { field: &'static str, raw: String },
    OutOfRange { field: &'static str, value: f64 },
}

impl std::fmt::Display for LineIssue {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            LineIssue::TokenCount { found } => write!(f, "expected 5 tokens, found {found}"),
            LineIssue::InvalidClassId { raw } => {
                write!(f, "invalid class_id '{raw}'; expected integer")
            }
            LineIssue::UnknownClassId { id } => {
                write!(f, "class_id {id} is not in the class table")
            }
            LineIssue::InvalidNumber { field, raw } => {
                write!(f, "invalid {field} '{raw}'; expected floating-point number")
            }
            LineIssue::OutOfRange { field, value } => {
                write!(f, "{field} {value} is outside [0, 1]")
            }
        }
    }
}

const FIELD_NAMES: [&str; 4] = ["x_center", "y_center", "width", "height"];

/// Parse and validate one label line against the class table.
///
/// Blank lines yield `Ok(None)`.
pub fn parse_label_line(
    line: &str,
    classes: &ClassTable,
) -> Result<Option<AnnotationRecord>, LineIssue> {
    let trimmed = line.trim();
    if trimmed.is_empty() {
        return Ok(None);
    }

    // Six is enough to tell "too many" apart from "exactly five".
    let tokens: Vec<&str> = trimmed.split_whitespace().take(6).collect();
    if tokens.len() != 5 {
        let found = if tokens.len() > 5 {
            trimmed.split_whitespace().count()
        } else {
            tokens.len()
        };
        return Err(LineIssue::TokenCount { found });
    }

    let raw_id = tokens[0]
        .parse::<i64>()
        .map_err(|_| LineIssue::InvalidClassId {
            raw: tokens[0].to_string(),
        })?;
    let class_id = classes
        .lookup_raw(raw_id)
        .ok_or(LineIssue::UnknownClassId { id: raw_id })?;

    let mut values = [0.0_f64; 4];
    for (slot, (raw, field)) in values
        .iter_mut()
        .zip(tokens[1..].iter().zip(FIELD_NAMES))
    {
        let value = raw.parse::<f64>().map_err(|_| LineIssue::InvalidNumber {
            field,
            raw: raw.to_string(),
        })?;
        if !(0.0..=1.0).contains(&value) {
            return Err(LineIssue::OutOfRange { field, value });
        }
        *slot = value;
    }

    let [cx, cy, w, h] = values;
    Ok(Some(AnnotationRecord::new(
        class_id,
        BBoxCxCyWh::<Normalized>::new(cx, cy, w, h),
    )))
}

/// Files directly inside `dir` that carry one of `extensions`, keyed by
/// sample key.
#[derive(Clone, Debug, Default)]
pub struct KeyedFiles {
    pub files: BTreeMap<SampleKey, PathBuf>,
    /// Keys matched by more than one file. The first file in name order wins.
    pub duplicates: Vec<SampleKey>,
}

/// Index the files of one store by their stem.
pub fn index_files_by_key(
    dir: &Path,
    extensions: &[String],
) -> Result<KeyedFiles, BoardlabelError> {
    if !dir.is_dir() {
        return Err(BoardlabelError::LayoutInvalid {
            path: dir.to_path_buf(),
            message: "directory does not exist".to_string(),
        });
    }

    let mut paths = Vec::new();
    for entry in fs::read_dir(dir).map_err(BoardlabelError::Io)? {
        let path = entry.map_err(BoardlabelError::Io)?.path();
        if path.is_file() && has_extension(&path, extensions) {
            paths.push(path);
        }
    }
    paths.sort();

    let mut indexed = KeyedFiles::default();
    for path in paths {
        let Some(key) = SampleKey::from_path(&path) else {
            continue;
        };
        if indexed.files.contains_key(&key) {
            if !indexed.duplicates.contains(&key) {
                indexed.duplicates.push(key);
            }
            continue;
        }
        indexed.files.insert(key, path);
    }

    Ok(indexed)
}

/// Write `data.yaml` at the dataset root for the external detector.
pub fn write_data_yaml(
    root: &Path,
    splits: &[Split],
    classes: &ClassTable,
) -> Result<(), BoardlabelError> {
    let root_display = fs::canonicalize(root).unwrap_or_else(|_| root.to_path_buf());

    let mut yaml = format!(
        "path: {}\n",
        yaml_single_quoted(&root_display.to_string_lossy())
    );
    for split in splits {
        yaml.push_str(&format!("{}: {}/{}\n", split.name(), split.name(), IMAGES_DIR));
    }
    yaml.push_str(&format!("nc: {}\n", classes.len()));
    yaml.push_str("names:\n");
    for (id, name) in classes.iter() {
        yaml.push_str(&format!("  {}: {}\n", id, yaml_single_quoted(name)));
    }

    fs::write(root.join("data.yaml"), yaml).map_err(BoardlabelError::Io)
}

fn yaml_single_quoted(raw: &str) -> String {
    format!("'{}'", raw.replace('\'', "''"))
}

/// Label file path for `key` inside a labels directory.
pub fn label_path(labels_dir: &Path, key: &SampleKey) -> PathBuf {
    labels_dir.join(key.file_name(LABEL_EXTENSION))
}
