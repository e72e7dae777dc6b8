//! In-place (or out-of-place) repair of VOC bounding boxes.
//!
//! Every object goes through [`check_box`]: swapped corners are written back
//! in order and rejected objects are removed. Objects without a readable
//! `<bndbox>` are removed too. Under the warn policy an out-of-frame box is
//! left as authored and only counted. The original text is patched, so
//! elements other than the edited boxes are kept. A file is written only
//! when something changed.

use std::fmt;
use std::fs;
use std::path::{Path, PathBuf};

use serde::Serialize;

use crate::error::BoardlabelError;
use crate::ir::io_voc_xml::{
    collect_xml_files, parse_voc_xml_str, patch_voc_xml, ObjectEdit, VocDocument,
};
use crate::validation::{check_box, BoxCheck, BoxRules};

#[derive(Clone, Debug)]
pub struct RepairOptions {
    /// A single `.xml` file or a directory of them.
    pub input: PathBuf,
    /// Write fixed files here instead of overwriting the originals.
    pub output_dir: Option<PathBuf>,
    pub rules: BoxRules,
}

#[derive(Clone, Debug, Default, Serialize)]
pub struct RepairReport {
    pub files_scanned: usize,
    pub files_changed: Vec<PathBuf>,
    pub boxes_repaired: usize,
    /// Boxes kept although they leave the frame (warn policy).
    pub boxes_out_of_frame: usize,
    pub objects_removed: usize,
    /// Files that could not be read or have no `<size>`, with the reason.
    pub failed: Vec<FailedFile>,
}

#[derive(Clone, Debug, Serialize)]
pub struct FailedFile {
    pub path: PathBuf,
    pub message: String,
}

impl fmt::Display for RepairReport {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        writeln!(f, "Scanned {} annotation file(s)", self.files_scanned)?;
        writeln!(f, "  files changed:   {}", self.files_changed.len())?;
        writeln!(f, "  boxes repaired:  {}", self.boxes_repaired)?;
        writeln!(f, "  out of frame:    {}", self.boxes_out_of_frame)?;
        writeln!(f, "  objects removed: {}", self.objects_removed)?;
        if !self.failed.is_empty() {
            writeln!(f, "  failed ({}):", self.failed.len())?;
            for failed in &self.failed {
                writeln!(f, "    {}: {}", failed.path.display(), failed.message)?;
            }
        }
        Ok(())
    }
}

#[derive(Debug, Default, PartialEq)]
struct DocumentFix {
    edits: Vec<ObjectEdit>,
    repaired: usize,
    out_of_frame: usize,
    removed: usize,
}

impl DocumentFix {
    fn changed(&self) -> bool {
        self.repaired + self.removed > 0
    }
}

/// Repair every annotation under `options.input`.
pub fn repair_voc(options: &RepairOptions) -> Result<RepairReport, BoardlabelError> {
    let files = if options.input.is_file() {
        vec![options.input.clone()]
    } else {
        collect_xml_files(&options.input)?
    };

    let mut report = RepairReport::default();
    for path in files {
        report.files_scanned += 1;

        let parsed = fs::read_to_string(&path)
            .map_err(BoardlabelError::Io)
            .and_then(|xml| parse_voc_xml_str(&xml, &path).map(|document| (xml, document)));
        let (xml, document) = match parsed {
            Ok(parsed) => parsed,
            Err(err) => {
                tracing::warn!(path = %path.display(), "cannot repair: {err}");
                report.failed.push(FailedFile {
                    path,
                    message: err.to_string(),
                });
                continue;
            }
        };

        let Some(fix) = fix_document(&document, &options.rules) else {
            tracing::warn!(path = %path.display(), "cannot repair: no <size> block");
            report.failed.push(FailedFile {
                path,
                message: "no <size> block".to_string(),
            });
            continue;
        };

        if fix.out_of_frame > 0 {
            tracing::warn!(
                path = %path.display(),
                "{} box(es) leave the image frame; kept as authored",
                fix.out_of_frame
            );
        }
        report.boxes_out_of_frame += fix.out_of_frame;

        if !fix.changed() {
            continue;
        }

        let patched = patch_voc_xml(&xml, &path, &fix.edits)?;
        let target = output_path(&path, options.output_dir.as_deref());
        if let Some(parent) = target.parent() {
            fs::create_dir_all(parent).map_err(BoardlabelError::Io)?;
        }
        fs::write(&target, patched).map_err(BoardlabelError::Io)?;
        tracing::info!(
            path = %target.display(),
            repaired = fix.repaired,
            removed = fix.removed,
            "annotation rewritten"
        );

        report.boxes_repaired += fix.repaired;
        report.objects_removed += fix.removed;
        report.files_changed.push(target);
    }

    Ok(report)
}

fn output_path(path: &Path, output_dir: Option<&Path>) -> PathBuf {
    match (output_dir, path.file_name()) {
        (Some(dir), Some(name)) => dir.join(name),
        _ => path.to_path_buf(),
    }
}

/// Decide an edit for every object. `None` when the size is unknown.
fn fix_document(document: &VocDocument, rules: &BoxRules) -> Option<DocumentFix> {
    let size = document.size?.image_size();
    let mut fix = DocumentFix::default();

    for object in &document.objects {
        let bbox = match &object.bndbox {
            Ok(bbox) => *bbox,
            Err(message) => {
                tracing::debug!("removing object: {message}");
                fix.removed += 1;
                fix.edits.push(ObjectEdit::Remove);
                continue;
            }
        };

        let edit = match check_box(&bbox, size, rules) {
            BoxCheck::Accepted {
                bbox: checked,
                repaired,
                out_of_frame,
            } => {
                if out_of_frame {
                    fix.out_of_frame += 1;
                }
                if repaired {
                    fix.repaired += 1;
                    ObjectEdit::Replace(checked)
                } else {
                    ObjectEdit::Keep
                }
            }
            BoxCheck::Rejected { reason, .. } => {
                tracing::debug!("removing box {bbox}: {reason}");
                fix.removed += 1;
                ObjectEdit::Remove
            }
        };
        fix.edits.push(edit);
    }

    Some(fix)
}
