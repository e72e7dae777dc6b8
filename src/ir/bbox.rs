//! Bounding box types: corner form (XYXY) and center form (CxCyWh).

use serde::Serialize;
use std::marker::PhantomData;

use super::model::ImageSize;
use super::space::{Normalized, Pixel};

/// An axis-aligned box in corner form (xmin, ymin, xmax, ymax).
///
/// The constructor does not enforce `min < max`; inverted or empty boxes
/// must be representable so the validator can classify and repair them.
#[derive(Clone, Copy, PartialEq)]
pub struct BBoxXYXY<TSpace> {
    pub xmin: f64,
    pub ymin: f64,
    pub xmax: f64,
    pub ymax: f64,
    _space: PhantomData<TSpace>,
}

impl<TSpace> BBoxXYXY<TSpace> {
    #[inline]
    pub fn from_xyxy(xmin: f64, ymin: f64, xmax: f64, ymax: f64) -> Self {
        Self {
            xmin,
            ymin,
            xmax,
            ymax,
            _space: PhantomData,
        }
    }

    /// Width of the box. Negative when the x axis is inverted.
    #[inline]
    pub fn width(&self) -> f64 {
        self.xmax - self.xmin
    }

    /// Height of the box. Negative when the y axis is inverted.
    #[inline]
    pub fn height(&self) -> f64 {
        self.ymax - self.ymin
    }

    #[inline]
    pub fn area(&self) -> f64 {
        self.width() * self.height()
    }

    /// Returns true if all four coordinates are finite.
    #[inline]
    pub fn is_finite(&self) -> bool {
        self.xmin.is_finite()
            && self.ymin.is_finite()
            && self.xmax.is_finite()
            && self.ymax.is_finite()
    }

    /// Returns true if min is strictly below max on both axes.
    #[inline]
    pub fn is_ordered(&self) -> bool {
        self.xmin < self.xmax && self.ymin < self.ymax
    }

    /// Returns a copy with each inverted axis (min > max) swapped.
    ///
    /// Axes that are already ordered, or collapsed (min == max), are left
    /// untouched.
    pub fn with_swapped_axes(&self) -> Self {
        let (xmin, xmax) = if self.xmin > self.xmax {
            (self.xmax, self.xmin)
        } else {
            (self.xmin, self.xmax)
        };
        let (ymin, ymax) = if self.ymin > self.ymax {
            (self.ymax, self.ymin)
        } else {
            (self.ymin, self.ymax)
        };
        Self::from_xyxy(xmin, ymin, xmax, ymax)
    }
}

impl BBoxXYXY<Pixel> {
    /// Returns true if the box lies inside `[0, width] x [0, height]`.
    pub fn is_within(&self, size: ImageSize) -> bool {
        let x_range = 0.0..=size.width as f64;
        let y_range = 0.0..=size.height as f64;
        x_range.contains(&self.xmin)
            && x_range.contains(&self.xmax)
            && y_range.contains(&self.ymin)
            && y_range.contains(&self.ymax)
    }
}

impl<TSpace> std::fmt::Debug for BBoxXYXY<TSpace> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("BBoxXYXY")
            .field("xmin", &self.xmin)
            .field("ymin", &self.ymin)
            .field("xmax", &self.xmax)
            .field("ymax", &self.ymax)
            .finish()
    }
}

impl<TSpace> std::fmt::Display for BBoxXYXY<TSpace> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(
            f,
            "({}, {}, {}, {})",
            self.xmin, self.ymin, self.xmax, self.ymax
        )
    }
}

// Hand-written so TSpace does not need a Serialize bound.
impl<TSpace> Serialize for BBoxXYXY<TSpace> {
    fn serialize<S: serde::Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        use serde::ser::SerializeStruct;
        let mut state = serializer.serialize_struct("BBoxXYXY", 4)?;
        state.serialize_field("xmin", &self.xmin)?;
        state.serialize_field("ymin", &self.ymin)?;
        state.serialize_field("xmax", &self.xmax)?;
        state.serialize_field("ymax", &self.ymax)?;
        state.end()
    }
}

/// An axis-aligned box in center form (x_center, y_center, width, height).
#[derive(Clone, Copy, PartialEq)]
pub struct BBoxCxCyWh<TSpace> {
    pub cx: f64,
    pub cy: f64,
    pub w: f64,
    pub h: f64,
    _space: PhantomData<TSpace>,
}

impl<TSpace> BBoxCxCyWh<TSpace> {
    #[inline]
    pub fn new(cx: f64, cy: f64, w: f64, h: f64) -> Self {
        Self {
            cx,
            cy,
            w,
            h,
            _space: PhantomData,
        }
    }

    /// Returns the components in label-line order.
    #[inline]
    pub fn components(&self) -> [f64; 4] {
        [self.cx, self.cy, self.w, self.h]
    }
}

impl BBoxCxCyWh<Normalized> {
    /// Scales a normalized box back to pixel corners for the given image.
    pub fn to_pixel(&self, size: ImageSize) -> BBoxXYXY<Pixel> {
        let (w, h) = (size.width as f64, size.height as f64);
        let half_w = self.w * w / 2.0;
        let half_h = self.h * h / 2.0;
        BBoxXYXY::from_xyxy(
            self.cx * w - half_w,
            self.cy * h - half_h,
            self.cx * w + half_w,
            self.cy * h + half_h,
        )
    }
}

impl<TSpace> std::fmt::Debug for BBoxCxCyWh<TSpace> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("BBoxCxCyWh")
            .field("cx", &self.cx)
            .field("cy", &self.cy)
            .field("w", &self.w)
            .field("h", &self.h)
            .finish()
    }
}
