// SPDX-License-Identifier: PMPL-1.0-or-later
// Copyright (c) 2026 Jonathan D.A. Jewell (hyperpolymath) <jonathan.jewell@open.ac.uk>
//
// Criterion benchmarks for the docwarp-document crate: the full pipeline on a
// synthetic rotated document, and skew estimation alone.

use criterion::{Criterion, black_box, criterion_group, criterion_main};
use image::{GrayImage, Luma};

use docwarp_core::config::{ProcessorConfig, SkewConfig};
use docwarp_core::types::RasterImage;
use docwarp_document::{DocumentProcessor, estimate_skew};

// ---------------------------------------------------------------------------
// Fixtures
// ---------------------------------------------------------------------------

/// A 640x480 dark frame holding a light 380x240 card rotated by `angle`
/// degrees, with dark text bars parallel to its long edge.
fn rotated_card(angle: f64) -> GrayImage {
    let (width, height) = (640u32, 480u32);
    let (cx, cy) = (width as f64 / 2.0, height as f64 / 2.0);
    let (sin, cos) = angle.to_radians().sin_cos();
    GrayImage::from_fn(width, height, |x, y| {
        let (dx, dy) = (x as f64 + 0.5 - cx, y as f64 + 0.5 - cy);
        let u = dx * cos + dy * sin;
        let v = -dx * sin + dy * cos;
        if u.abs() > 190.0 || v.abs() > 120.0 {
            return Luma([40u8]);
        }
        let row = (v + 95.0) / 18.0;
        let on_bar = (0.0..10.0).contains(&row) && row.fract() < 0.28 && u.abs() < 160.0;
        if on_bar { Luma([30u8]) } else { Luma([235u8]) }
    })
}

// ---------------------------------------------------------------------------
// Benchmarks
// ---------------------------------------------------------------------------

/// Full pipeline on an encoded PNG: decode, detect, rectify, estimate, correct.
///
/// This is the document path; a failed detection would show up as a sudden
/// drop in time because the full-frame path skips rectification.
fn bench_process_document(c: &mut Criterion) {
    let raster = RasterImage::from_gray(rotated_card(7.0)).expect("fixture has pixels");
    let bytes = raster.to_png_bytes().expect("PNG encoding");
    let processor = DocumentProcessor::new(ProcessorConfig::default()).expect("default config");

    c.bench_function("process (640x480 rotated card)", |b| {
        b.iter(|| {
            let result = processor.process(black_box(&bytes)).expect("processing");
            black_box(result.angle);
        });
    });
}

/// The three skew strategies and their combination on the raw frame.
fn bench_estimate_skew(c: &mut Criterion) {
    let gray = rotated_card(-4.0);
    let config = SkewConfig::default();

    c.bench_function("estimate_skew (640x480)", |b| {
        b.iter(|| black_box(estimate_skew(black_box(&gray), &config).angle));
    });
}

criterion_group!(benches, bench_process_document, bench_estimate_skew);
criterion_main!(benches);
