//! Property tests for box validation and normalization.

mod proptest_helpers;

use boardlabel::ir::BBoxXYXY;
use boardlabel::normalize::normalize_box;
use boardlabel::validation::{check_box, classify_box, BoxCheck, BoxRules, BoxVerdict};
use proptest::prelude::*;
use proptest_helpers::{arb_sized_box, proptest_config, EPS_ROUND_TRIP};

proptest! {
    #![proptest_config(proptest_config())]

    #[test]
    fn normalized_box_scales_back_to_its_corners((size, bbox) in arb_sized_box()) {
        let norm = normalize_box(&bbox, size).expect("normalize in-frame box");
        for component in norm.components() {
            prop_assert!((0.0..=1.0).contains(&component));
        }

        let back = norm.to_pixel(size);
        let tol = EPS_ROUND_TRIP * f64::from(size.width.max(size.height));
        prop_assert!((back.xmin - bbox.xmin).abs() <= tol);
        prop_assert!((back.ymin - bbox.ymin).abs() <= tol);
        prop_assert!((back.xmax - bbox.xmax).abs() <= tol);
        prop_assert!((back.ymax - bbox.ymax).abs() <= tol);
    }

    #[test]
    fn inverted_box_is_repaired_or_rejected((size, bbox) in arb_sized_box()) {
        let inverted = BBoxXYXY::from_xyxy(bbox.xmax, bbox.ymax, bbox.xmin, bbox.ymin);
        let rules = BoxRules::default();

        prop_assert_eq!(classify_box(&inverted, size, rules.min_area), BoxVerdict::Invertible);
        match check_box(&inverted, size, &rules) {
            BoxCheck::Accepted { bbox: fixed, repaired, out_of_frame } => {
                prop_assert!(repaired);
                prop_assert!(!out_of_frame);
                prop_assert_eq!(fixed, bbox);
                prop_assert!(fixed.area() >= rules.min_area);
            }
            BoxCheck::Rejected { repaired, .. } => {
                prop_assert!(repaired);
                prop_assert!(bbox.area() < rules.min_area);
            }
        }
    }

    #[test]
    fn accepted_boxes_normalize_into_the_unit_square(
        (size, bbox) in arb_sized_box(),
        dx in -50.0..50.0f64,
        dy in -50.0..50.0f64,
    ) {
        let shifted = BBoxXYXY::from_xyxy(bbox.xmin + dx, bbox.ymin + dy, bbox.xmax + dx, bbox.ymax + dy);
        let rules = BoxRules::default();
        if let BoxCheck::Accepted { bbox: kept, out_of_frame, .. } = check_box(&shifted, size, &rules) {
            prop_assert_eq!(out_of_frame, !kept.is_within(size));
            prop_assert!(kept.area() >= rules.min_area);
            let norm = normalize_box(&kept, size).expect("normalize accepted box");
            for component in norm.components() {
                prop_assert!((0.0..=1.0).contains(&component));
            }
        }
    }
}
