#![allow(dead_code)]

use boardlabel::ir::{BBoxXYXY, ImageSize, Pixel, SampleKey};
use proptest::prelude::*;
use proptest::test_runner::{Config as ProptestConfig, FileFailurePersistence};

pub const EPS_ROUND_TRIP: f64 = 1e-9;

pub fn proptest_config() -> ProptestConfig {
    let cases = std::env::var("PROPTEST_CASES")
        .ok()
        .and_then(|v| v.parse::<u32>().ok())
        .unwrap_or(64);

    let mut config = ProptestConfig::with_failure_persistence(FileFailurePersistence::WithSource(
        "proptest-regressions",
    ));
    config.cases = cases;
    config.max_shrink_iters = 1024;
    config
}

pub fn arb_image_size() -> impl Strategy<Value = ImageSize> {
    (1u32..=4096, 1u32..=4096).prop_map(|(w, h)| ImageSize::new(w, h))
}

/// An ordered box fully inside the frame, with positive extent on both axes.
pub fn arb_in_frame_box(size: ImageSize) -> impl Strategy<Value = BBoxXYXY<Pixel>> {
    let w = size.width as f64;
    let h = size.height as f64;
    (0.0..1.0f64, 0.0..1.0f64, 0.0..1.0f64, 0.0..1.0f64).prop_filter_map(
        "box must have positive extent",
        move |(a, b, c, d)| {
            let (x0, x1) = if a <= c { (a, c) } else { (c, a) };
            let (y0, y1) = if b <= d { (b, d) } else { (d, b) };
            let bbox = BBoxXYXY::from_xyxy(x0 * w, y0 * h, x1 * w, y1 * h);
            bbox.is_ordered().then_some(bbox)
        },
    )
}

/// An image size together with an in-frame box on it.
pub fn arb_sized_box() -> impl Strategy<Value = (ImageSize, BBoxXYXY<Pixel>)> {
    arb_image_size().prop_flat_map(|size| (Just(size), arb_in_frame_box(size)))
}

/// Up to `max` keys, possibly with duplicates.
pub fn arb_keys(max: usize) -> impl Strategy<Value = Vec<SampleKey>> {
    prop::collection::vec("[a-z0-9_]{1,8}", 0..=max)
        .prop_map(|names| names.into_iter().map(SampleKey::new).collect())
}

/// Ratios that sum to one, test share possibly zero.
pub fn arb_ratios() -> impl Strategy<Value = (f64, f64, f64)> {
    (0u32..=100, 0u32..=100).prop_map(|(a, b)| {
        let (lo, hi) = if a <= b { (a, b) } else { (b, a) };
        let train = lo as f64 / 100.0;
        let val = (hi - lo) as f64 / 100.0;
        let test = (100 - hi) as f64 / 100.0;
        (train, val, test)
    })
}
