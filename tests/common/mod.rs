#![allow(dead_code)]

use std::fs;
use std::path::{Path, PathBuf};

/// One `<object>` of a VOC fixture.
pub struct VocObject<'a> {
    pub name: &'a str,
    pub bbox: [f64; 4],
}

pub fn obj(name: &str, bbox: [f64; 4]) -> VocObject<'_> {
    VocObject { name, bbox }
}

pub fn voc_xml(filename: &str, width: u32, height: u32, objects: &[VocObject<'_>]) -> String {
    let mut xml = format!(
        "<?xml version=\"1.0\"?>\n<annotation>\n  <folder>JPEGImages</folder>\n  <filename>{filename}</filename>\n  <size>\n    <width>{width}</width>\n    <height>{height}</height>\n    <depth>3</depth>\n  </size>\n"
    );
    for object in objects {
        let [xmin, ymin, xmax, ymax] = object.bbox;
        xml.push_str(&format!(
            "  <object>\n    <name>{}</name>\n    <difficult>0</difficult>\n    <bndbox>\n      <xmin>{xmin}</xmin>\n      <ymin>{ymin}</ymin>\n      <xmax>{xmax}</xmax>\n      <ymax>{ymax}</ymax>\n    </bndbox>\n  </object>\n",
            object.name
        ));
    }
    xml.push_str("</annotation>\n");
    xml
}

/// Create an empty VOC tree under `root` and return its path.
pub fn voc_root(root: &Path) -> PathBuf {
    for dir in ["Annotations", "JPEGImages", "ImageSets/Main"] {
        fs::create_dir_all(root.join(dir)).expect("create voc dir");
    }
    root.to_path_buf()
}

/// Write `<stem>.xml` on a 100x100 image, plus `<stem>.jpg` when `with_image`.
pub fn write_sample(root: &Path, stem: &str, objects: &[VocObject<'_>], with_image: bool) {
    let file_name = format!("{stem}.jpg");
    fs::write(
        root.join("Annotations").join(format!("{stem}.xml")),
        voc_xml(&file_name, 100, 100, objects),
    )
    .expect("write annotation");
    if with_image {
        fs::write(root.join("JPEGImages").join(&file_name), b"\xff\xd8jpeg").expect("write image");
    }
}

pub fn write_split_list(root: &Path, split: &str, keys: &[&str]) {
    let mut content = keys.join("\n");
    content.push('\n');
    fs::write(
        root.join("ImageSets/Main").join(format!("{split}.txt")),
        content,
    )
    .expect("write split list");
}

pub fn read_label(output: &Path, split: &str, stem: &str) -> String {
    fs::read_to_string(output.join(split).join("labels").join(format!("{stem}.txt")))
        .expect("read label file")
}
