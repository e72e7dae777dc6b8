//! Core records that flow through the normalization pipeline.
//!
//! A source annotation is read into [`SourceAnnotation`] (pixel corners,
//! class names), each surviving object becomes an [`AnnotationRecord`]
//! (class id, normalized center form), and records are written once.

use serde::Serialize;

use super::bbox::{BBoxCxCyWh, BBoxXYXY};
use super::ids::ClassId;
use super::space::{Normalized, Pixel};

/// Pixel dimensions of an image.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize)]
pub struct ImageSize {
    pub width: u32,
    pub height: u32,
}

impl ImageSize {
    pub fn new(width: u32, height: u32) -> Self {
        Self { width, height }
    }
}

impl std::fmt::Display for ImageSize {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}x{}", self.width, self.height)
    }
}

/// One object as authored in the source annotation, class resolved.
#[derive(Clone, Debug, PartialEq)]
pub struct SourceObject {
    pub class_id: ClassId,
    pub class_name: String,
    pub bbox: BBoxXYXY<Pixel>,
}

/// An object the reader could not turn into a [`SourceObject`].
#[derive(Clone, Debug, PartialEq)]
pub enum SkippedObject {
    /// The class name is not in the class table.
    UnknownClass { name: String },
    /// The object has no `<name>`.
    MissingName,
    /// The object has no `<bndbox>`, or one of its four fields is absent
    /// or not a number.
    MalformedBox { message: String },
}

/// A parsed source annotation file for one image.
#[derive(Clone, Debug)]
pub struct SourceAnnotation {
    /// Image file name as recorded in the annotation.
    pub filename: String,
    pub size: ImageSize,
    /// Objects with a known class, in document order.
    pub objects: Vec<SourceObject>,
    /// Objects dropped while reading, in document order.
    pub skipped: Vec<SkippedObject>,
}

/// The atomic unit persisted to a label file.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct AnnotationRecord {
    pub class_id: ClassId,
    pub bbox: BBoxCxCyWh<Normalized>,
}

impl AnnotationRecord {
    pub fn new(class_id: ClassId, bbox: BBoxCxCyWh<Normalized>) -> Self {
        Self { class_id, bbox }
    }
}
