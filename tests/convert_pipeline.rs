//! End-to-end library tests: VOC tree in, YOLO splits out, checker over the result.

mod common;

use std::fs;
use std::path::Path;

use boardlabel::check::check_yolo_dataset;
use boardlabel::config::PipelineConfig;
use boardlabel::convert::{
    convert_voc_to_yolo, ConversionIssueCode, ConvertOptions, SplitPolicy, VocLayout,
};
use boardlabel::ir::SampleKey;
use boardlabel::split::{Split, SplitRatios};
use boardlabel::validation::{BoxRules, OutOfFramePolicy};
use boardlabel::BoardlabelError;
use common::{obj, read_label, voc_root, write_sample, write_split_list};

fn options(root: &Path, output: &Path, split_policy: SplitPolicy) -> ConvertOptions {
    let config = PipelineConfig::default();
    ConvertOptions {
        layout: VocLayout::discover(root).expect("discover layout"),
        output: output.to_path_buf(),
        split_policy,
        rules: BoxRules::default(),
        image_extensions: config.image_extensions,
    }
}

fn lists() -> SplitPolicy {
    SplitPolicy::Lists {
        splits: vec![Split::Train, Split::Val],
    }
}

#[test]
fn missing_fastener_on_square_image_becomes_one_label_line() {
    let temp = tempfile::tempdir().expect("create temp dir");
    let root = voc_root(&temp.path().join("voc"));
    let output = temp.path().join("yolo");
    write_sample(&root, "board_001", &[obj("missing-fastener", [10.0, 10.0, 50.0, 50.0])], true);
    write_split_list(&root, "train", &["board_001"]);
    write_split_list(&root, "val", &[]);

    let config = PipelineConfig::default();
    let classes = config.class_table().expect("class table");
    let report = convert_voc_to_yolo(&options(&root, &output, lists()), &classes).expect("convert");

    assert_eq!(report.files_written(), 1);
    assert_eq!(report.objects_written(), 1);
    assert_eq!(report.warning_count(), 0);
    assert_eq!(
        read_label(&output, "train", "board_001"),
        "1 0.300000 0.300000 0.400000 0.400000\n"
    );
    assert!(output.join("train/images/board_001.jpg").is_file());

    let yaml = fs::read_to_string(output.join("data.yaml")).expect("read data.yaml");
    assert!(yaml.contains("train: train/images"));
    assert!(yaml.contains("nc: 4"));
    assert!(yaml.contains("1: 'missing-fastener'"));
}

#[test]
fn converted_dataset_passes_the_checker() {
    let temp = tempfile::tempdir().expect("create temp dir");
    let root = voc_root(&temp.path().join("voc"));
    let output = temp.path().join("yolo");
    let stems = ["a", "b", "c", "d", "e"];
    for stem in stems {
        write_sample(
            &root,
            stem,
            &[
                obj("board-body", [0.0, 0.0, 100.0, 100.0]),
                obj("present-fastener", [20.0, 20.0, 30.0, 30.0]),
            ],
            true,
        );
    }
    write_split_list(&root, "train", &["a", "b", "c"]);
    write_split_list(&root, "val", &["d", "e"]);

    let config = PipelineConfig::default();
    let classes = config.class_table().expect("class table");
    let report = convert_voc_to_yolo(&options(&root, &output, lists()), &classes).expect("convert");
    assert_eq!(report.splits[&Split::Train].files, 3);
    assert_eq!(report.splits[&Split::Val].objects, 4);

    let check = check_yolo_dataset(&output, &classes, &config.image_extensions).expect("check");
    assert!(check.passed, "{check}");
    assert_eq!(check.total_objects(), 10);
    assert_eq!(check.stores.len(), 2);
}

#[test]
fn missing_image_fails_the_check_with_its_key() {
    let temp = tempfile::tempdir().expect("create temp dir");
    let root = voc_root(&temp.path().join("voc"));
    let output = temp.path().join("yolo");
    write_sample(&root, "with_image", &[obj("board-body", [0.0, 0.0, 90.0, 90.0])], true);
    write_sample(&root, "no_image", &[obj("board-body", [0.0, 0.0, 90.0, 90.0])], false);
    write_split_list(&root, "train", &["with_image", "no_image"]);
    write_split_list(&root, "val", &[]);

    let config = PipelineConfig::default();
    let classes = config.class_table().expect("class table");
    let report = convert_voc_to_yolo(&options(&root, &output, lists()), &classes).expect("convert");
    assert_eq!(report.count(ConversionIssueCode::ImageCopyFailed), 1);

    let check = check_yolo_dataset(&output, &classes, &config.image_extensions).expect("check");
    assert!(!check.passed);
    assert_eq!(check.dangling_count(), 1);
    let train = check.stores.iter().find(|s| s.name == "train").expect("train store");
    assert_eq!(train.labels_without_images, vec![SampleKey::new("no_image")]);
}

#[test]
fn bad_boxes_are_repaired_kept_or_dropped() {
    let temp = tempfile::tempdir().expect("create temp dir");
    let root = voc_root(&temp.path().join("voc"));
    let output = temp.path().join("yolo");
    write_sample(
        &root,
        "mixed",
        &[
            obj("present-fastener", [50.0, 50.0, 10.0, 10.0]),
            obj("board-body", [-10.0, 0.0, 100.0, 100.0]),
            obj("fiducial-marker", [5.0, 5.0, 6.0, 6.0]),
            obj("screwdriver", [5.0, 5.0, 20.0, 20.0]),
        ],
        true,
    );
    write_split_list(&root, "train", &["mixed"]);
    write_split_list(&root, "val", &[]);

    let config = PipelineConfig::default();
    let classes = config.class_table().expect("class table");
    let report = convert_voc_to_yolo(&options(&root, &output, lists()), &classes).expect("convert");

    assert_eq!(report.count(ConversionIssueCode::BoxRepaired), 1);
    assert_eq!(report.count(ConversionIssueCode::BoxOutOfFrame), 1);
    assert_eq!(report.count(ConversionIssueCode::GeometryDrop), 1);
    assert_eq!(report.count(ConversionIssueCode::UnknownClass), 1);
    assert_eq!(
        read_label(&output, "train", "mixed"),
        "2 0.300000 0.300000 0.400000 0.400000\n3 0.450000 0.500000 1.000000 1.000000\n"
    );
}

#[test]
fn out_of_frame_boxes_are_clamped_per_component() {
    let temp = tempfile::tempdir().expect("create temp dir");
    let root = voc_root(&temp.path().join("voc"));
    let output = temp.path().join("yolo");
    write_sample(
        &root,
        "a",
        &[
            obj("board-body", [-20.0, 10.0, 40.0, 50.0]),
            obj("board-body", [120.0, 10.0, 150.0, 50.0]),
        ],
        true,
    );
    write_split_list(&root, "train", &["a"]);
    write_split_list(&root, "val", &[]);

    let classes = PipelineConfig::default().class_table().expect("class table");
    let report = convert_voc_to_yolo(&options(&root, &output, lists()), &classes).expect("convert");

    assert_eq!(report.count(ConversionIssueCode::BoxOutOfFrame), 2);
    assert_eq!(report.count(ConversionIssueCode::GeometryDrop), 0);
    assert_eq!(
        read_label(&output, "train", "a"),
        "3 0.100000 0.300000 0.600000 0.400000\n3 1.000000 0.300000 0.300000 0.400000\n"
    );
}

#[test]
fn drop_policy_rejects_out_of_frame_boxes() {
    let temp = tempfile::tempdir().expect("create temp dir");
    let root = voc_root(&temp.path().join("voc"));
    let output = temp.path().join("yolo");
    write_sample(&root, "edge", &[obj("board-body", [0.0, 0.0, 120.0, 100.0])], true);
    write_split_list(&root, "train", &["edge"]);
    write_split_list(&root, "val", &[]);

    let classes = PipelineConfig::default().class_table().expect("class table");
    let mut opts = options(&root, &output, lists());
    opts.rules.out_of_frame = OutOfFramePolicy::Drop;
    let report = convert_voc_to_yolo(&opts, &classes).expect("convert");

    assert_eq!(report.count(ConversionIssueCode::GeometryDrop), 1);
    assert_eq!(read_label(&output, "train", "edge"), "");
}

#[test]
fn listed_key_without_annotation_is_reported() {
    let temp = tempfile::tempdir().expect("create temp dir");
    let root = voc_root(&temp.path().join("voc"));
    let output = temp.path().join("yolo");
    write_sample(&root, "present", &[obj("board-body", [0.0, 0.0, 50.0, 50.0])], true);
    write_split_list(&root, "train", &["present", "ghost"]);
    write_split_list(&root, "val", &[]);

    let classes = PipelineConfig::default().class_table().expect("class table");
    let report = convert_voc_to_yolo(&options(&root, &output, lists()), &classes).expect("convert");

    assert_eq!(report.count(ConversionIssueCode::MissingAnnotation), 1);
    assert_eq!(report.files_written(), 1);
}

#[test]
fn missing_split_list_aborts_before_writing() {
    let temp = tempfile::tempdir().expect("create temp dir");
    let root = voc_root(&temp.path().join("voc"));
    let output = temp.path().join("yolo");
    write_sample(&root, "a", &[obj("board-body", [0.0, 0.0, 50.0, 50.0])], true);
    write_split_list(&root, "train", &["a"]);

    let classes = PipelineConfig::default().class_table().expect("class table");
    let err = convert_voc_to_yolo(&options(&root, &output, lists()), &classes).unwrap_err();

    assert!(matches!(err, BoardlabelError::MissingSplitList { .. }));
    assert!(!output.exists());
}

#[test]
fn ratio_split_covers_every_annotation_once() {
    let temp = tempfile::tempdir().expect("create temp dir");
    let root = voc_root(&temp.path().join("voc"));
    let output = temp.path().join("yolo");
    for idx in 0..20 {
        write_sample(
            &root,
            &format!("img_{idx:02}"),
            &[obj("board-body", [0.0, 0.0, 80.0, 80.0])],
            true,
        );
    }

    let classes = PipelineConfig::default().class_table().expect("class table");
    let policy = SplitPolicy::Ratio {
        ratios: SplitRatios::new(0.7, 0.15, 0.15).expect("ratios"),
        seed: 42,
    };
    let report = convert_voc_to_yolo(&options(&root, &output, policy), &classes).expect("convert");

    assert_eq!(report.files_written(), 20);
    assert_eq!(report.excluded_keys, 0);
    assert_eq!(report.splits.len(), 3);
    assert_eq!(report.splits[&Split::Val].files, 3);
    assert_eq!(report.splits[&Split::Test].files, 3);
    assert_eq!(report.splits[&Split::Train].files, 14);
}
