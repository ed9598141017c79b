#![allow(dead_code)]

use inspektline::geometry::{BBoxXYXY, ImageSize, NormalizedBox, Pixel};
use proptest::prelude::*;
use proptest::strategy::BoxedStrategy;
use proptest::test_runner::{Config as ProptestConfig, FileFailurePersistence};

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

pub fn arb_image_size() -> BoxedStrategy<ImageSize> {
    (1u32..=4096, 1u32..=4096)
        .prop_map(|(w, h)| ImageSize::new(w, h))
        .boxed()
}

/// An image size together with an integer rectangle of positive size
/// inside it, as the canvas would produce.
pub fn arb_image_and_rect() -> BoxedStrategy<(ImageSize, [i64; 4])> {
    (2u32..=4096, 2u32..=4096)
        .prop_flat_map(|(w, h)| {
            let (w64, h64) = (w as i64, h as i64);
            (
                Just(ImageSize::new(w, h)),
                0..w64,
                0..h64,
                1..=w64,
                1..=h64,
            )
                .prop_map(move |(size, x, y, dw, dh)| {
                    (size, [x, y, (x + dw).min(w64), (y + dh).min(h64)])
                })
        })
        .boxed()
}

pub fn rect_bbox(r: &[i64; 4]) -> BBoxXYXY<Pixel> {
    BBoxXYXY::from_xyxy(r[0] as f64, r[1] as f64, r[2] as f64, r[3] as f64)
}

/// A normalized box that passes store validation.
pub fn arb_valid_box() -> BoxedStrategy<NormalizedBox> {
    (0.001f64..=1.0, 0.001f64..=1.0)
        .prop_flat_map(|(w, h)| {
            (
                (w / 2.0)..=(1.0 - w / 2.0),
                (h / 2.0)..=(1.0 - h / 2.0),
                Just(w),
                Just(h),
            )
        })
        .prop_map(|(xc, yc, w, h)| NormalizedBox::new(xc, yc, w, h))
        .boxed()
}

/// One mutation applied to a single image's annotations.
#[derive(Clone, Debug)]
pub enum AnnotationOp {
    Add(NormalizedBox),
    /// Delete the annotation at this position (modulo the current count).
    Delete(usize),
    Clear,
}

pub fn arb_annotation_ops(max_len: usize) -> BoxedStrategy<Vec<AnnotationOp>> {
    let op = prop_oneof![
        4 => arb_valid_box().prop_map(AnnotationOp::Add),
        3 => any::<usize>().prop_map(AnnotationOp::Delete),
        1 => Just(AnnotationOp::Clear),
    ];
    prop::collection::vec(op, 0..=max_len).boxed()
}
