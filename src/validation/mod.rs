//! Bounding box validation.
//!
//! [`classify_box`] is the decision table: given a pixel box and its image
//! size it answers `Valid`, `Invertible` or `Invalid(reason)`, first match
//! wins:
//!
//! 1. any coordinate NaN or infinite: invalid
//! 2. an inverted axis (`min > max`) that is ordered after swapping: invertible
//! 3. a collapsed axis (`min == max`): invalid
//! 4. any coordinate outside `[0, width] x [0, height]`: invalid (out of frame)
//! 5. area below the minimum: invalid (too small)
//! 6. valid
//!
//! [`check_box`] applies the verdict: it swaps invertible boxes and runs them
//! through the table again, then decides whether the box is kept, honoring
//! the out-of-frame policy. A kept out-of-frame box is returned as authored;
//! the normalizer clamps it.

mod report;

pub use report::{IssueCode, IssueContext, Severity, ValidationIssue, ValidationReport};

use serde::Serialize;

use crate::config::DEFAULT_MIN_BOX_AREA;
use crate::ir::{BBoxXYXY, ImageSize, Pixel};

/// Outcome of classifying one box.
#[derive(Clone, Copy, Debug, PartialEq)]
pub enum BoxVerdict {
    Valid,
    /// At least one axis is inverted and swapping makes the box ordered.
    Invertible,
    Invalid(InvalidReason),
}

#[derive(Clone, Copy, Debug, PartialEq, Serialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum InvalidReason {
    NotFinite,
    /// Zero width or zero height.
    Degenerate,
    OutOfFrame,
    TooSmall { area: f64 },
}

impl std::fmt::Display for InvalidReason {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            InvalidReason::NotFinite => write!(f, "non-finite coordinate"),
            InvalidReason::Degenerate => write!(f, "zero width or height"),
            InvalidReason::OutOfFrame => write!(f, "outside the image frame"),
            InvalidReason::TooSmall { area } => write!(f, "area {area} is below the minimum"),
        }
    }
}

/// What to do with a box that is otherwise valid but leaves the frame.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum OutOfFramePolicy {
    /// Keep the box as authored and count a warning.
    #[default]
    Warn,
    /// Reject the box.
    Drop,
}

/// Thresholds and policies for [`check_box`].
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct BoxRules {
    pub min_area: f64,
    pub out_of_frame: OutOfFramePolicy,
}

impl Default for BoxRules {
    fn default() -> Self {
        Self {
            min_area: DEFAULT_MIN_BOX_AREA,
            out_of_frame: OutOfFramePolicy::Warn,
        }
    }
}

/// What [`check_box`] decided for one box.
#[derive(Clone, Copy, Debug, PartialEq)]
pub enum BoxCheck {
    Accepted {
        bbox: BBoxXYXY<Pixel>,
        /// The box had inverted axes that were swapped.
        repaired: bool,
        /// The box leaves the frame. It is returned unclipped.
        out_of_frame: bool,
    },
    Rejected {
        reason: InvalidReason,
        repaired: bool,
    },
}

/// Classify a box against its image. Does not modify it.
pub fn classify_box(bbox: &BBoxXYXY<Pixel>, size: ImageSize, min_area: f64) -> BoxVerdict {
    if !bbox.is_finite() {
        return BoxVerdict::Invalid(InvalidReason::NotFinite);
    }

    let inverted = bbox.xmin > bbox.xmax || bbox.ymin > bbox.ymax;
    if inverted && bbox.with_swapped_axes().is_ordered() {
        return BoxVerdict::Invertible;
    }

    match classify_ordered(bbox, size, min_area) {
        Ok(()) => BoxVerdict::Valid,
        Err(reason) => BoxVerdict::Invalid(reason),
    }
}

// Rules 3 to 5 for a finite box with no inverted axis.
fn classify_ordered(
    bbox: &BBoxXYXY<Pixel>,
    size: ImageSize,
    min_area: f64,
) -> Result<(), InvalidReason> {
    if !bbox.is_ordered() {
        return Err(InvalidReason::Degenerate);
    }
    if !bbox.is_within(size) {
        return Err(InvalidReason::OutOfFrame);
    }
    let area = bbox.area();
    if area < min_area {
        return Err(InvalidReason::TooSmall { area });
    }
    Ok(())
}

/// Validate a box and, where the rules allow it, repair it.
pub fn check_box(bbox: &BBoxXYXY<Pixel>, size: ImageSize, rules: &BoxRules) -> BoxCheck {
    let (candidate, repaired) = match classify_box(bbox, size, rules.min_area) {
        BoxVerdict::Valid => {
            return BoxCheck::Accepted {
                bbox: *bbox,
                repaired: false,
                out_of_frame: false,
            }
        }
        BoxVerdict::Invalid(InvalidReason::OutOfFrame) => (*bbox, false),
        BoxVerdict::Invalid(reason) => {
            return BoxCheck::Rejected {
                reason,
                repaired: false,
            }
        }
        BoxVerdict::Invertible => (bbox.with_swapped_axes(), true),
    };

    match classify_ordered(&candidate, size, rules.min_area) {
        Ok(()) => BoxCheck::Accepted {
            bbox: candidate,
            repaired,
            out_of_frame: false,
        },
        Err(InvalidReason::OutOfFrame) => match rules.out_of_frame {
            OutOfFramePolicy::Drop => BoxCheck::Rejected {
                reason: InvalidReason::OutOfFrame,
                repaired,
            },
            OutOfFramePolicy::Warn => {
                let area = candidate.area();
                if area < rules.min_area {
                    BoxCheck::Rejected {
                        reason: InvalidReason::TooSmall { area },
                        repaired,
                    }
                } else {
                    BoxCheck::Accepted {
                        bbox: candidate,
                        repaired,
                        out_of_frame: true,
                    }
                }
            }
        },
        Err(reason) => BoxCheck::Rejected { reason, repaired },
    }
}
