//! Pixel corners to normalized center form.

use crate::error::BoardlabelError;
use crate::ir::{BBoxCxCyWh, BBoxXYXY, ImageSize, Normalized, Pixel};

/// Convert a pixel box to normalized `(cx, cy, w, h)` for its image.
///
/// Each component is clamped to `[0, 1]` on its own, which absorbs rounding
/// at the image border. Fails if either image side is below one pixel.
pub fn normalize_box(
    bbox: &BBoxXYXY<Pixel>,
    size: ImageSize,
) -> Result<BBoxCxCyWh<Normalized>, BoardlabelError> {
    if size.width < 1 || size.height < 1 {
        return Err(BoardlabelError::DegenerateImage {
            width: size.width,
            height: size.height,
        });
    }

    let (w, h) = (size.width as f64, size.height as f64);
    let cx = (bbox.xmin + bbox.xmax) / 2.0 / w;
    let cy = (bbox.ymin + bbox.ymax) / 2.0 / h;
    let bw = (bbox.xmax - bbox.xmin) / w;
    let bh = (bbox.ymax - bbox.ymin) / h;

    Ok(BBoxCxCyWh::new(
        unit_clamp(cx),
        unit_clamp(cy),
        unit_clamp(bw),
        unit_clamp(bh),
    ))
}

fn unit_clamp(value: f64) -> f64 {
    value.clamp(0.0, 1.0)
}
