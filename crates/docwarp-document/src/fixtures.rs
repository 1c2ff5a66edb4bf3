// SPDX-License-Identifier: PMPL-1.0-or-later
// Copyright (c) 2026 Jonathan D.A. Jewell (hyperpolymath) <jonathan.jewell@open.ac.uk>
//
// Synthetic scenes shared by the unit tests.

use docwarp_core::types::{Point, Quadrilateral, RasterImage};
use image::{Luma, Rgb, RgbImage};

const INK: u8 = 30;

/// A light document with dark text bars, rotated on a dark background.
#[derive(Debug, Clone)]
pub struct Scene {
    pub width: u32,
    pub height: u32,
    pub doc_width: f64,
    pub doc_height: f64,
    /// Rotation of the document in the frame, degrees (positive = clockwise on screen).
    pub doc_angle: f64,
    /// Rotation of the text relative to the document, degrees.
    pub text_angle: f64,
}

impl Default for Scene {
    fn default() -> Self {
        Self {
            width: 480,
            height: 360,
            doc_width: 300.0,
            doc_height: 190.0,
            doc_angle: 8.0,
            text_angle: 0.0,
        }
    }
}

impl Scene {
    fn center(&self) -> (f64, f64) {
        (self.width as f64 / 2.0, self.height as f64 / 2.0)
    }

    /// Ground-truth document corners, ordered TL, TR, BR, BL.
    pub fn corners(&self) -> Quadrilateral {
        let (cx, cy) = self.center();
        let (sin, cos) = self.doc_angle.to_radians().sin_cos();
        let (hw, hh) = (self.doc_width / 2.0, self.doc_height / 2.0);
        let corner = |u: f64, v: f64| {
            Point::new((cx + u * cos - v * sin) as f32, (cy + u * sin + v * cos) as f32)
        };
        Quadrilateral::new([
            corner(-hw, -hh),
            corner(hw, -hh),
            corner(hw, hh),
            corner(-hw, hh),
        ])
        .normalized()
    }
}

/// Render `scene` as an RGB raster.
pub fn document_scene(scene: &Scene) -> RasterImage {
    let (cx, cy) = scene.center();
    let (doc_sin, doc_cos) = scene.doc_angle.to_radians().sin_cos();
    let (text_sin, text_cos) = scene.text_angle.to_radians().sin_cos();
    let (hw, hh) = (scene.doc_width / 2.0, scene.doc_height / 2.0);

    let rgb = RgbImage::from_fn(scene.width, scene.height, |x, y| {
        let (dx, dy) = (x as f64 + 0.5 - cx, y as f64 + 0.5 - cy);
        // Frame -> document coordinates.
        let u = dx * doc_cos + dy * doc_sin;
        let v = -dx * doc_sin + dy * doc_cos;
        if u.abs() > hw || v.abs() > hh {
            return Rgb([40, 45, 50]);
        }
        // Document -> text coordinates.
        let s = u * text_cos + v * text_sin;
        let t = -u * text_sin + v * text_cos;
        if on_text_bar(s, t, hw - 25.0, hh - 25.0) {
            Rgb([INK, INK, INK])
        } else {
            Rgb([235, 235, 230])
        }
    });
    RasterImage::from_rgb(rgb).unwrap()
}

/// A frame-filling page of text bars rotated by `angle` degrees: no outline to find.
pub fn text_page(width: u32, height: u32, angle: f64) -> RasterImage {
    let (cx, cy) = (width as f64 / 2.0, height as f64 / 2.0);
    let (sin, cos) = angle.to_radians().sin_cos();
    let gray = image::GrayImage::from_fn(width, height, |x, y| {
        let (dx, dy) = (x as f64 + 0.5 - cx, y as f64 + 0.5 - cy);
        let s = dx * cos + dy * sin;
        let t = -dx * sin + dy * cos;
        if on_text_bar(s, t, cx - 30.0, cy - 30.0) {
            Luma([INK])
        } else {
            Luma([240])
        }
    });
    RasterImage::from_gray(gray).unwrap()
}

/// A light page with small scattered specks.
pub fn speckled_page(width: u32, height: u32) -> RasterImage {
    let mut gray = image::GrayImage::from_pixel(width, height, Luma([220u8]));
    let mut state: u32 = 0x2545_f491;
    let mut next = || {
        state ^= state << 13;
        state ^= state >> 17;
        state ^= state << 5;
        state
    };
    for gy in (8..height.saturating_sub(8)).step_by(16) {
        for gx in (8..width.saturating_sub(8)).step_by(16) {
            let x = gx + next() % 5;
            let y = gy + next() % 5;
            for py in y..(y + 3).min(height) {
                for px in x..(x + 3).min(width) {
                    gray.put_pixel(px, py, Luma([60]));
                }
            }
        }
    }
    RasterImage::from_gray(gray).unwrap()
}

/// Horizontal bars 5 px thick every 18 px, with ragged right ends.
fn on_text_bar(s: f64, t: f64, half_width: f64, half_height: f64) -> bool {
    if t < -half_height || t > half_height || s < -half_width {
        return false;
    }
    let row = ((t + half_height) / 18.0).floor();
    let within_row = (t + half_height) - row * 18.0;
    if within_row >= 5.0 {
        return false;
    }
    let ragged = (row as i64 % 3) as f64 * 30.0;
    s <= half_width - ragged
}
