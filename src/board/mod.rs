//! Normal/abnormal board status from detector output.
//!
//! A board image is abnormal iff the detector reports both a
//! missing-fastener object and the board body in the same image.
//! Detections whose class id is not in the class table are counted and
//! left out of the rule.

use std::collections::BTreeMap;
use std::fmt;
use std::fs;
use std::path::Path;

use serde::{Deserialize, Serialize};

use crate::config::{BoardRuleConfig, ClassTable};
use crate::error::BoardlabelError;
use crate::ir::ClassId;

/// One detection as exported by the detector.
#[derive(Clone, Debug, Deserialize)]
pub struct Detection {
    pub class_id: ClassId,
    pub confidence: f64,
    pub bbox: PixelBox,
}

/// Absolute box corners as they appear in the detections file.
#[derive(Clone, Copy, Debug, Deserialize)]
pub struct PixelBox {
    pub xmin: f64,
    pub ymin: f64,
    pub xmax: f64,
    pub ymax: f64,
}

/// Detector output for one image. `detections` is null when inference failed.
#[derive(Clone, Debug, Deserialize)]
pub struct ImageDetections {
    pub image: String,
    pub detections: Option<Vec<Detection>>,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, PartialOrd, Ord, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum BoardStatus {
    Normal,
    Abnormal,
    /// No detector output for the image.
    Unknown,
}

impl fmt::Display for BoardStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.pad(match self {
            BoardStatus::Normal => "normal",
            BoardStatus::Abnormal => "abnormal",
            BoardStatus::Unknown => "unknown",
        })
    }
}

/// The two classes whose co-occurrence makes a board abnormal.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct BoardRule {
    pub missing_class: ClassId,
    pub board_class: ClassId,
}

impl BoardRule {
    /// Resolve the configured class names against the class table.
    pub fn from_config(
        config: &BoardRuleConfig,
        classes: &ClassTable,
    ) -> Result<Self, BoardlabelError> {
        Ok(Self {
            missing_class: classes.require(&config.missing_class)?,
            board_class: classes.require(&config.board_class)?,
        })
    }

    pub fn status(&self, detections: Option<&[Detection]>) -> BoardStatus {
        let Some(detections) = detections else {
            return BoardStatus::Unknown;
        };

        let has = |class_id: ClassId| detections.iter().any(|d| d.class_id == class_id);
        if has(self.missing_class) && has(self.board_class) {
            BoardStatus::Abnormal
        } else {
            BoardStatus::Normal
        }
    }
}

#[derive(Clone, Debug, Serialize)]
pub struct ImageStatus {
    pub image: String,
    pub status: BoardStatus,
    /// Detections with a known class id.
    pub detections: usize,
    pub unknown_class_detections: usize,
    /// Highest confidence among missing-fastener detections.
    pub missing_confidence: Option<f64>,
}

#[derive(Clone, Debug, Default, Serialize)]
pub struct BoardReport {
    pub images: Vec<ImageStatus>,
    pub totals: BTreeMap<BoardStatus, usize>,
    pub unknown_class_detections: usize,
}

impl fmt::Display for BoardReport {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        for image in &self.images {
            match image.missing_confidence {
                Some(conf) => writeln!(
                    f,
                    "{:<9} {} ({} detection(s), missing fastener at {:.2})",
                    image.status, image.image, image.detections, conf
                )?,
                None => writeln!(
                    f,
                    "{:<9} {} ({} detection(s))",
                    image.status, image.image, image.detections
                )?,
            }
        }
        writeln!(f)?;
        let total = |status: BoardStatus| self.totals.get(&status).copied().unwrap_or(0);
        writeln!(
            f,
            "{} image(s): {} normal, {} abnormal, {} unknown",
            self.images.len(),
            total(BoardStatus::Normal),
            total(BoardStatus::Abnormal),
            total(BoardStatus::Unknown)
        )?;
        if self.unknown_class_detections > 0 {
            writeln!(
                f,
                "{} detection(s) with a class id outside the class table were ignored",
                self.unknown_class_detections
            )?;
        }
        Ok(())
    }
}

/// Classify every image of a detections file.
pub fn classify_file(
    path: &Path,
    rule: &BoardRule,
    classes: &ClassTable,
) -> Result<BoardReport, BoardlabelError> {
    let raw = fs::read_to_string(path).map_err(BoardlabelError::Io)?;
    let entries: Vec<ImageDetections> =
        serde_json::from_str(&raw).map_err(|source| BoardlabelError::DetectionsParse {
            path: path.to_path_buf(),
            source,
        })?;
    Ok(classify(&entries, rule, classes))
}

pub fn classify(
    entries: &[ImageDetections],
    rule: &BoardRule,
    classes: &ClassTable,
) -> BoardReport {
    let mut report = BoardReport::default();
    for entry in entries {
        let mut unknown_class_detections = 0;
        let known: Option<Vec<Detection>> = entry.detections.as_ref().map(|all| {
            all.iter()
                .filter(|d| {
                    let known = classes.name_of(d.class_id).is_some();
                    if !known {
                        tracing::warn!(
                            image = %entry.image,
                            "ignoring detection with unknown class id {}",
                            d.class_id
                        );
                        unknown_class_detections += 1;
                    }
                    known
                })
                .cloned()
                .collect()
        });
        let detections = known.as_deref();
        let status = rule.status(detections);
        if status == BoardStatus::Unknown {
            tracing::warn!(image = %entry.image, "no detections recorded");
        }

        let missing_confidence = detections
            .unwrap_or_default()
            .iter()
            .filter(|d| d.class_id == rule.missing_class)
            .map(|d| d.confidence)
            .reduce(f64::max);

        *report.totals.entry(status).or_insert(0) += 1;
        report.unknown_class_detections += unknown_class_detections;
        report.images.push(ImageStatus {
            image: entry.image.clone(),
            status,
            detections: detections.map_or(0, <[Detection]>::len),
            unknown_class_detections,
            missing_confidence,
        });
    }
    report
}
