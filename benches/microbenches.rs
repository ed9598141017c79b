//! Criterion microbenches for geometry transforms and label-line I/O.
//!
//! Run with: `cargo bench`

use criterion::{criterion_group, criterion_main, Criterion, Throughput};
use std::hint::black_box;
use std::path::Path;

use inspektline::geometry::{
    format_label_line, parse_label_lines, to_normalized, to_pixels, BBoxXYXY, ImageSize,
    NormalizedBox, Pixel,
};

const LABEL_FILE: &str = "0 0.150000 0.200000 0.200000 0.200000
1 0.512500 0.487500 0.125000 0.090000
0 0.900000 0.100000 0.050000 0.050000
not a label line
1 0.333333 0.666667 0.250000 0.250000
";

fn bench_transform_round_trip(c: &mut Criterion) {
    let size = ImageSize::new(1920, 1080);
    let rects: Vec<BBoxXYXY<Pixel>> = (0..256)
        .map(|i| {
            let x = (i * 7 % 1800) as f64;
            let y = (i * 5 % 1000) as f64;
            BBoxXYXY::from_xyxy(x, y, x + 64.0, y + 48.0)
        })
        .collect();

    let mut group = c.benchmark_group("geometry");
    group.throughput(Throughput::Elements(rects.len() as u64));
    group.bench_function("to_normalized_to_pixels", |b| {
        b.iter(|| {
            for rect in &rects {
                let normalized = to_normalized(black_box(rect), size);
                black_box(to_pixels(&normalized, size));
            }
        })
    });
    group.finish();
}

fn bench_format_lines(c: &mut Criterion) {
    let boxes: Vec<NormalizedBox> = (0..256)
        .map(|i| {
            let t = i as f64 / 256.0;
            NormalizedBox::new(0.1 + t * 0.8, 0.9 - t * 0.8, 0.05, 0.07)
        })
        .collect();

    let mut group = c.benchmark_group("label_lines");
    group.throughput(Throughput::Elements(boxes.len() as u64));
    group.bench_function("format", |b| {
        b.iter(|| {
            let mut out = String::new();
            for (idx, bbox) in boxes.iter().enumerate() {
                out.push_str(&format_label_line(idx % 2, black_box(bbox)));
                out.push('\n');
            }
            black_box(out)
        })
    });
    group.finish();
}

fn bench_parse_lines(c: &mut Criterion) {
    let mut group = c.benchmark_group("label_lines");
    group.throughput(Throughput::Bytes(LABEL_FILE.len() as u64));
    group.bench_function("parse", |b| {
        b.iter(|| black_box(parse_label_lines(black_box(LABEL_FILE), Path::new("bench.txt"))))
    });
    group.finish();
}

criterion_group!(
    benches,
    bench_transform_round_trip,
    bench_format_lines,
    bench_parse_lines
);
criterion_main!(benches);
