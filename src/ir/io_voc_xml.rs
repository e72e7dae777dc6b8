//! Pascal VOC XML reader and box patcher.
//!
//! Parsing happens in two layers. [`parse_voc_xml_str`] is permissive: it
//! only fails on malformed XML or unparseable `<size>` numbers, and records
//! every missing piece as an `Option`/`Err` inside [`VocDocument`], so the
//! audit and repair commands can see exactly what the file contains.
//! [`read_source_annotation`] is the converter's contract on top of that:
//! it demands `<size>` and `<filename>`, and resolves class names through
//! the class table. [`patch_voc_xml`] edits boxes in the original text so
//! that elements this crate does not model survive a repair.

use std::cmp::Reverse;
use std::fs;
use std::ops::Range;
use std::path::{Path, PathBuf};

use roxmltree::Node;
use walkdir::WalkDir;

use super::{BBoxXYXY, ImageSize, Pixel, SkippedObject, SourceAnnotation, SourceObject};
use crate::config::ClassTable;
use crate::error::BoardlabelError;

pub const VOC_XML_EXTENSION: &str = "xml";

/// Everything a VOC file says, with absent pieces left as `None`.
#[derive(Clone, Debug, PartialEq)]
pub struct VocDocument {
    pub filename: Option<String>,
    pub size: Option<VocSize>,
    pub objects: Vec<VocObject>,
}

#[derive(Clone, Copy, Debug, PartialEq)]
pub struct VocSize {
    pub width: u32,
    pub height: u32,
    pub depth: Option<u32>,
}

impl VocSize {
    pub fn image_size(&self) -> ImageSize {
        ImageSize::new(self.width, self.height)
    }
}

#[derive(Clone, Debug, PartialEq)]
pub struct VocObject {
    pub name: Option<String>,
    /// The four `<bndbox>` fields, or why they could not be read.
    pub bndbox: Result<BBoxXYXY<Pixel>, String>,
}

/// Read one VOC file and resolve it against the class table.
///
/// Fails with [`BoardlabelError::MissingSize`] or
/// [`BoardlabelError::MissingFilename`] when the required metadata is
/// absent; callers skip such files. Objects with an unknown class or an
/// unreadable box are returned in `skipped`, the rest of the file is kept.
pub fn read_source_annotation(
    path: &Path,
    classes: &ClassTable,
) -> Result<SourceAnnotation, BoardlabelError> {
    let document = parse_voc_file(path)?;
    source_annotation_from_document(document, path, classes)
}

/// Same as [`read_source_annotation`], from an already parsed document.
pub fn source_annotation_from_document(
    document: VocDocument,
    path: &Path,
    classes: &ClassTable,
) -> Result<SourceAnnotation, BoardlabelError> {
    let size = document
        .size
        .ok_or_else(|| BoardlabelError::MissingSize {
            path: path.to_path_buf(),
        })?
        .image_size();
    let filename = document
        .filename
        .ok_or_else(|| BoardlabelError::MissingFilename {
            path: path.to_path_buf(),
        })?;

    let mut objects = Vec::with_capacity(document.objects.len());
    let mut skipped = Vec::new();

    for object in document.objects {
        let Some(name) = object.name else {
            skipped.push(SkippedObject::MissingName);
            continue;
        };

        let Some(class_id) = classes.id_of(&name) else {
            skipped.push(SkippedObject::UnknownClass { name });
            continue;
        };

        match object.bndbox {
            Ok(bbox) => objects.push(SourceObject {
                class_id,
                class_name: name,
                bbox,
            }),
            Err(message) => skipped.push(SkippedObject::MalformedBox { message }),
        }
    }

    Ok(SourceAnnotation {
        filename,
        size,
        objects,
        skipped,
    })
}

/// Parse a VOC file from disk.
pub fn parse_voc_file(path: &Path) -> Result<VocDocument, BoardlabelError> {
    let xml = fs::read_to_string(path).map_err(BoardlabelError::Io)?;
    parse_voc_xml_str(&xml, path)
}

/// Parse VOC XML from a string. `path` is only used in error messages.
pub fn parse_voc_xml_str(xml: &str, path: &Path) -> Result<VocDocument, BoardlabelError> {
    let document = parse_document(xml, path)?;
    let annotation = annotation_root(&document, path)?;

    let size = child_element(annotation, "size")
        .map(|size| parse_size(size, path))
        .transpose()?;

    let objects = object_nodes(annotation).map(parse_object).collect();

    Ok(VocDocument {
        filename: optional_child_text(annotation, "filename"),
        size,
        objects,
    })
}

fn parse_document<'input>(
    xml: &'input str,
    path: &Path,
) -> Result<roxmltree::Document<'input>, BoardlabelError> {
    roxmltree::Document::parse(xml).map_err(|source| BoardlabelError::VocXmlParse {
        path: path.to_path_buf(),
        message: source.to_string(),
    })
}

fn annotation_root<'a, 'input>(
    document: &'a roxmltree::Document<'input>,
    path: &Path,
) -> Result<Node<'a, 'input>, BoardlabelError> {
    let annotation = document.root_element();
    if annotation.tag_name().name() != "annotation" {
        return Err(BoardlabelError::VocXmlParse {
            path: path.to_path_buf(),
            message: "missing <annotation> root element".to_string(),
        });
    }
    Ok(annotation)
}

fn object_nodes<'a, 'input>(
    annotation: Node<'a, 'input>,
) -> impl Iterator<Item = Node<'a, 'input>> {
    annotation
        .children()
        .filter(|node| node.is_element() && node.tag_name().name() == "object")
}

fn parse_size(size: Node<'_, '_>, path: &Path) -> Result<VocSize, BoardlabelError> {
    let width = parse_required_u32(size, "width", path)?;
    let height = parse_required_u32(size, "height", path)?;
    let depth = optional_child_text(size, "depth")
        .map(|raw| {
            raw.parse::<u32>().map_err(|_| BoardlabelError::VocXmlParse {
                path: path.to_path_buf(),
                message: format!("invalid <depth> value '{raw}' in <size>; expected u32"),
            })
        })
        .transpose()?;

    Ok(VocSize {
        width,
        height,
        depth,
    })
}

fn parse_object(object: Node<'_, '_>) -> VocObject {
    let bndbox = match child_element(object, "bndbox") {
        Some(bndbox) => parse_bndbox(bndbox),
        None => Err("missing <bndbox> in <object>".to_string()),
    };

    VocObject {
        name: optional_child_text(object, "name"),
        bndbox,
    }
}

fn parse_bndbox(bndbox: Node<'_, '_>) -> Result<BBoxXYXY<Pixel>, String> {
    let field = |tag: &str| -> Result<f64, String> {
        let raw = optional_child_text(bndbox, tag)
            .ok_or_else(|| format!("missing <{tag}> in <bndbox>"))?;
        raw.parse::<f64>().map_err(|_| {
            format!("invalid <{tag}> value '{raw}' in <bndbox>; expected floating-point number")
        })
    };

    Ok(BBoxXYXY::from_xyxy(
        field("xmin")?,
        field("ymin")?,
        field("xmax")?,
        field("ymax")?,
    ))
}

fn parse_required_u32(node: Node<'_, '_>, tag: &str, path: &Path) -> Result<u32, BoardlabelError> {
    let raw = optional_child_text(node, tag).ok_or_else(|| BoardlabelError::VocXmlParse {
        path: path.to_path_buf(),
        message: format!("missing <{tag}> in <size>"),
    })?;
    raw.parse::<u32>().map_err(|_| BoardlabelError::VocXmlParse {
        path: path.to_path_buf(),
        message: format!("invalid <{tag}> value '{raw}' in <size>; expected u32"),
    })
}

fn child_element<'a, 'input>(node: Node<'a, 'input>, tag: &str) -> Option<Node<'a, 'input>> {
    node.children()
        .find(|child| child.is_element() && child.tag_name().name() == tag)
}

fn optional_child_text(node: Node<'_, '_>, tag: &str) -> Option<String> {
    child_element(node, tag)
        .and_then(|child| child.text())
        .map(str::trim)
        .filter(|text| !text.is_empty())
        .map(ToOwned::to_owned)
}

/// What happens to one `<object>` when a file is patched.
#[derive(Clone, Copy, Debug, PartialEq)]
pub enum ObjectEdit {
    Keep,
    /// Rewrite the four `<bndbox>` values.
    Replace(BBoxXYXY<Pixel>),
    /// Cut the element, together with the indentation in front of it.
    Remove,
}

/// Apply one edit per `<object>`, in document order, to the original text.
///
/// Only the replaced `<bndbox>` fields and the removed `<object>` elements
/// change. Everything else in `xml` is kept byte for byte.
pub fn patch_voc_xml(
    xml: &str,
    path: &Path,
    edits: &[ObjectEdit],
) -> Result<String, BoardlabelError> {
    let document = parse_document(xml, path)?;
    let annotation = annotation_root(&document, path)?;
    let objects: Vec<Node<'_, '_>> = object_nodes(annotation).collect();
    if objects.len() != edits.len() {
        return Err(BoardlabelError::VocXmlParse {
            path: path.to_path_buf(),
            message: format!(
                "{} edit(s) for {} <object> element(s)",
                edits.len(),
                objects.len()
            ),
        });
    }

    let mut splices: Vec<(Range<usize>, String)> = Vec::new();
    for (object, edit) in objects.into_iter().zip(edits) {
        match edit {
            ObjectEdit::Keep => {}
            ObjectEdit::Replace(bbox) => {
                let bndbox = child_element(object, "bndbox").ok_or_else(|| {
                    BoardlabelError::VocXmlParse {
                        path: path.to_path_buf(),
                        message: "missing <bndbox> in <object>".to_string(),
                    }
                })?;
                for (tag, value) in [
                    ("xmin", bbox.xmin),
                    ("ymin", bbox.ymin),
                    ("xmax", bbox.xmax),
                    ("ymax", bbox.ymax),
                ] {
                    let field = child_element(bndbox, tag).ok_or_else(|| {
                        BoardlabelError::VocXmlParse {
                            path: path.to_path_buf(),
                            message: format!("missing <{tag}> in <bndbox>"),
                        }
                    })?;
                    splices.push((field.range(), format!("<{tag}>{value}</{tag}>")));
                }
            }
            ObjectEdit::Remove => splices.push((removal_range(object), String::new())),
        }
    }

    // Back to front, so earlier offsets stay valid.
    splices.sort_by_key(|(range, _)| Reverse(range.start));
    let mut patched = xml.to_string();
    for (range, text) in splices {
        patched.replace_range(range, &text);
    }
    Ok(patched)
}

fn removal_range(object: Node<'_, '_>) -> Range<usize> {
    let range = object.range();
    match object.prev_sibling() {
        Some(prev)
            if prev.is_text() && prev.text().is_some_and(|text| text.trim().is_empty()) =>
        {
            prev.range().start..range.end
        }
        _ => range,
    }
}

/// List the `.xml` files directly inside `dir`, sorted by file name.
///
/// The scan is flat; nested XML files are reported once and ignored.
pub fn collect_xml_files(dir: &Path) -> Result<Vec<PathBuf>, BoardlabelError> {
    if !dir.is_dir() {
        return Err(BoardlabelError::LayoutInvalid {
            path: dir.to_path_buf(),
            message: "annotations directory does not exist".to_string(),
        });
    }

    let mut files = Vec::new();
    for entry in fs::read_dir(dir).map_err(BoardlabelError::Io)? {
        let path = entry.map_err(BoardlabelError::Io)?.path();
        if path.is_file() && has_xml_extension(&path) {
            files.push(path);
        }
    }
    files.sort();

    let nested = WalkDir::new(dir)
        .min_depth(2)
        .into_iter()
        .filter_map(Result::ok)
        .filter(|entry| entry.file_type().is_file() && has_xml_extension(entry.path()))
        .count();
    if nested > 0 {
        tracing::warn!(
            dir = %dir.display(),
            "annotations are scanned flat; skipping {nested} nested .xml file(s)"
        );
    }

    Ok(files)
}

fn has_xml_extension(path: &Path) -> bool {
    path.extension()
        .and_then(|ext| ext.to_str())
        .map(|ext| ext.eq_ignore_ascii_case(VOC_XML_EXTENSION))
        .unwrap_or(false)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ir::ClassId;

    const SAMPLE: &str = r#"<?xml version="1.0" encoding="utf-8"?>
<annotation>
  <folder>JPEGImages</folder>
  <filename>frame_001.jpg</filename>
  <size>
    <width>640</width>
    <height>480</height>
    <depth>3</depth>
  </size>
  <object>
    <name>missing-fastener</name>
    <difficult>0</difficult>
    <bndbox>
      <xmin>10</xmin>
      <ymin>20</ymin>
      <xmax>30.5</xmax>
      <ymax>40</ymax>
    </bndbox>
  </object>
  <object>
    <name>coffee-cup</name>
    <bndbox><xmin>1</xmin><ymin>1</ymin><xmax>9</xmax><ymax>9</ymax></bndbox>
  </object>
  <object>
    <name>board-body</name>
  </object>
</annotation>"#;

    #[test]
    fn parse_keeps_every_object_permissively() {
        let doc = parse_voc_xml_str(SAMPLE, Path::new("sample.xml")).expect("parse xml");
        assert_eq!(doc.filename.as_deref(), Some("frame_001.jpg"));
        assert_eq!(
            doc.size,
            Some(VocSize {
                width: 640,
                height: 480,
                depth: Some(3)
            })
        );
        assert_eq!(doc.objects.len(), 3);
        assert_eq!(
            doc.objects[0].bndbox,
            Ok(BBoxXYXY::from_xyxy(10.0, 20.0, 30.5, 40.0))
        );
        assert!(doc.objects[2].bndbox.is_err());
    }

    #[test]
    fn reader_resolves_classes_and_reports_skips() {
        let doc = parse_voc_xml_str(SAMPLE, Path::new("sample.xml")).expect("parse xml");
        let source =
            source_annotation_from_document(doc, Path::new("sample.xml"), &ClassTable::default())
                .expect("read annotation");

        assert_eq!(source.size, ImageSize::new(640, 480));
        assert_eq!(source.objects.len(), 1);
        assert_eq!(source.objects[0].class_id, ClassId(1));
        assert_eq!(
            source.skipped,
            vec![
                SkippedObject::UnknownClass {
                    name: "coffee-cup".to_string()
                },
                SkippedObject::MalformedBox {
                    message: "missing <bndbox> in <object>".to_string()
                },
            ]
        );
    }

    #[test]
    fn reader_requires_size_block() {
        let xml = "<annotation><filename>a.jpg</filename></annotation>";
        let doc = parse_voc_xml_str(xml, Path::new("a.xml")).expect("parse xml");
        let err = source_annotation_from_document(doc, Path::new("a.xml"), &ClassTable::default())
            .unwrap_err();
        assert!(matches!(err, BoardlabelError::MissingSize { .. }));
    }

    #[test]
    fn reader_requires_filename() {
        let xml = "<annotation><size><width>4</width><height>4</height></size></annotation>";
        let doc = parse_voc_xml_str(xml, Path::new("a.xml")).expect("parse xml");
        let err = source_annotation_from_document(doc, Path::new("a.xml"), &ClassTable::default())
            .unwrap_err();
        assert!(matches!(err, BoardlabelError::MissingFilename { .. }));
    }

    #[test]
    fn non_numeric_size_is_a_parse_error() {
        let xml = "<annotation><size><width>wide</width><height>4</height></size></annotation>";
        let err = parse_voc_xml_str(xml, Path::new("a.xml")).unwrap_err();
        assert!(matches!(err, BoardlabelError::VocXmlParse { .. }));
    }

    #[test]
    fn patch_swaps_fields_and_cuts_objects() {
        let xml = "<annotation>\n  <object><name>a</name><bndbox><xmin>50</xmin><ymin>10</ymin><xmax>10</xmax><ymax>50</ymax></bndbox></object>\n  <object><name>b</name></object>\n</annotation>";
        let edits = [
            ObjectEdit::Replace(BBoxXYXY::from_xyxy(10.0, 10.0, 50.0, 50.0)),
            ObjectEdit::Remove,
        ];

        let patched = patch_voc_xml(xml, Path::new("a.xml"), &edits).expect("patch");
        assert_eq!(
            patched,
            "<annotation>\n  <object><name>a</name><bndbox><xmin>10</xmin><ymin>10</ymin><xmax>50</xmax><ymax>50</ymax></bndbox></object>\n</annotation>"
        );
    }

    #[test]
    fn patch_keeps_unmodeled_elements() {
        let edits = [ObjectEdit::Remove, ObjectEdit::Keep, ObjectEdit::Keep];
        let patched = patch_voc_xml(SAMPLE, Path::new("sample.xml"), &edits).expect("patch");

        assert!(patched.starts_with("<?xml version=\"1.0\" encoding=\"utf-8\"?>"));
        assert!(patched.contains("<folder>JPEGImages</folder>"));
        assert!(patched.contains("<depth>3</depth>"));
        assert!(!patched.contains("missing-fastener"));

        let doc = parse_voc_xml_str(&patched, Path::new("sample.xml")).expect("reparse");
        assert_eq!(doc.objects.len(), 2);
        assert_eq!(doc.objects[0].name.as_deref(), Some("coffee-cup"));
    }

    #[test]
    fn patch_rejects_edit_count_mismatch() {
        let err = patch_voc_xml(SAMPLE, Path::new("sample.xml"), &[ObjectEdit::Keep]).unwrap_err();
        assert!(matches!(err, BoardlabelError::VocXmlParse { .. }));
    }
}
