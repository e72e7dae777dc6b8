//! Value types shared by every stage of the pipeline, and the two on-disk
//! annotation formats.
//!
//! - Source side: Pascal VOC XML, absolute pixel corners, class names.
//! - Target side: YOLO text labels, normalized center/size, class ids.
//!
//! Box types carry a coordinate-space marker ([`Pixel`] or [`Normalized`])
//! so the two conventions cannot be mixed by accident. Constructors are
//! permissive: an inverted or out-of-frame box can be represented, and it
//! is the validator's job to classify it.

mod bbox;
mod ids;
pub mod io_voc_xml;
pub mod io_yolo;
mod model;
mod space;

pub use bbox::{BBoxCxCyWh, BBoxXYXY};
pub use ids::{ClassId, SampleKey};
pub use model::{AnnotationRecord, ImageSize, SkippedObject, SourceAnnotation, SourceObject};
pub use space::{Normalized, Pixel};
