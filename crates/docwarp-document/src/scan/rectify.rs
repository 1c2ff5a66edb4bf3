// SPDX-License-Identifier: PMPL-1.0-or-later
// Copyright (c) 2026 Jonathan D.A. Jewell (hyperpolymath) <jonathan.jewell@open.ac.uk>
//
// Perspective rectification — map a four-point outline onto an upright
// rectangle with a projective warp.

use docwarp_core::error::{DocError, Result};
use docwarp_core::types::{Point, Quadrilateral, RasterImage};
use image::{DynamicImage, GrayImage, Luma, Rgb, RgbImage};
use imageproc::geometric_transformations::{Interpolation, Projection, warp_into};
use tracing::{debug, instrument};

/// Corners closer than this (px) or triangles thinner than this (px^2) are degenerate.
const MIN_EDGE: f64 = 1.0;
const MIN_TRIANGLE_AREA: f64 = 1.0;

/// Warp the region bounded by `quad` onto an upright rectangle.
///
/// The output is as wide as the longer of the top and bottom edges and as tall
/// as the longer of the left and right edges. Pixels that map outside the
/// source are white.
#[instrument(skip(image), fields(width = image.width(), height = image.height()))]
pub fn rectify(image: &RasterImage, quad: &Quadrilateral) -> Result<RasterImage> {
    let ordered = quad.normalized();
    check_geometry(&ordered)?;

    let [top, right, bottom, left] = ordered.edge_lengths();
    let out_w = top.max(bottom).round().max(1.0) as u32;
    let out_h = left.max(right).round().max(1.0) as u32;

    let src = ordered.points.map(|p| (p.x, p.y));
    let (max_x, max_y) = ((out_w - 1) as f32, (out_h - 1) as f32);
    let dest = [(0.0, 0.0), (max_x, 0.0), (max_x, max_y), (0.0, max_y)];

    let projection = Projection::from_control_points(src, dest).ok_or_else(|| {
        DocError::DegenerateQuadrilateral("no projective transform for these corners".into())
    })?;

    let output = match image.as_dynamic() {
        DynamicImage::ImageLuma8(gray) => {
            let mut out = GrayImage::new(out_w, out_h);
            warp_into(gray, &projection, Interpolation::Bilinear, Luma([255u8]), &mut out);
            DynamicImage::ImageLuma8(out)
        }
        other => {
            let rgb = match other {
                DynamicImage::ImageRgb8(rgb) => rgb.clone(),
                _ => other.to_rgb8(),
            };
            let mut out = RgbImage::new(out_w, out_h);
            warp_into(&rgb, &projection, Interpolation::Bilinear, Rgb([255u8; 3]), &mut out);
            DynamicImage::ImageRgb8(out)
        }
    };

    debug!(out_w, out_h, "Perspective rectified");
    RasterImage::from_dynamic(output)
}

/// Reject outlines a homography cannot sensibly rectify.
fn check_geometry(ordered: &Quadrilateral) -> Result<()> {
    if !ordered.has_distinct_corners() {
        return Err(DocError::DegenerateQuadrilateral(
            "corner ordering maps two roles to one point".into(),
        ));
    }
    if let Some(edge) = ordered.edge_lengths().iter().find(|l| **l < MIN_EDGE) {
        return Err(DocError::DegenerateQuadrilateral(format!(
            "edge of length {edge:.2} px"
        )));
    }
    let p = &ordered.points;
    for i in 0..4 {
        let area = triangle_area(p[i], p[(i + 1) % 4], p[(i + 2) % 4]);
        if area < MIN_TRIANGLE_AREA {
            return Err(DocError::DegenerateQuadrilateral(
                "three corners are collinear".into(),
            ));
        }
    }
    Ok(())
}

fn triangle_area(a: Point, b: Point, c: Point) -> f64 {
    let (abx, aby) = ((b.x - a.x) as f64, (b.y - a.y) as f64);
    let (acx, acy) = ((c.x - a.x) as f64, (c.y - a.y) as f64);
    (abx * acy - aby * acx).abs() / 2.0
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::fixtures;

    fn quad(points: [(f32, f32); 4]) -> Quadrilateral {
        Quadrilateral::new(points.map(|(x, y)| Point::new(x, y)))
    }

    /// Rectifying the true outline yields the document's size and aspect.
    #[test]
    fn rectifies_rotated_document_to_its_aspect() {
        let scene = fixtures::Scene::default();
        let image = fixtures::document_scene(&scene);
        let crop = rectify(&image, &scene.corners()).unwrap();

        let expected = scene.doc_width / scene.doc_height;
        let actual = crop.width() as f64 / crop.height() as f64;
        assert!((actual - expected).abs() / expected < 0.05, "aspect {actual}");
        assert!((crop.width() as f64 - scene.doc_width).abs() <= 2.0);
        assert_eq!(crop.channels(), 3);
    }

    #[test]
    fn axis_aligned_crop_keeps_content() {
        let mut gray = GrayImage::from_pixel(60, 40, Luma([0u8]));
        for y in 10..30 {
            for x in 10..50 {
                gray.put_pixel(x, y, Luma([200u8]));
            }
        }
        let image = RasterImage::from_gray(gray).unwrap();
        let crop = rectify(&image, &quad([(10.0, 10.0), (49.0, 10.0), (49.0, 29.0), (10.0, 29.0)]))
            .unwrap();
        assert_eq!((crop.width(), crop.height()), (39, 19));
        let gray = crop.to_gray();
        assert_eq!(gray.get_pixel(20, 10).0[0], 200);
    }

    #[test]
    fn scrambled_corner_order_is_accepted() {
        let image = RasterImage::from_gray(GrayImage::from_pixel(50, 50, Luma([90u8]))).unwrap();
        let crop = rectify(&image, &quad([(40.0, 40.0), (5.0, 5.0), (40.0, 5.0), (5.0, 40.0)]))
            .unwrap();
        assert_eq!((crop.width(), crop.height()), (35, 35));
    }

    #[test]
    fn collinear_corners_are_degenerate() {
        let image = RasterImage::from_gray(GrayImage::from_pixel(50, 50, Luma([90u8]))).unwrap();
        let err = rectify(&image, &quad([(0.0, 0.0), (10.0, 10.0), (20.0, 20.0), (30.0, 30.0)]))
            .unwrap_err();
        assert!(matches!(err, DocError::DegenerateQuadrilateral(_)));
    }

    /// A diamond maps two corner roles onto one point.
    #[test]
    fn diamond_is_degenerate() {
        let image = RasterImage::from_gray(GrayImage::from_pixel(120, 120, Luma([90u8]))).unwrap();
        let err = rectify(&image, &quad([(60.0, 10.0), (110.0, 60.0), (60.0, 110.0), (10.0, 60.0)]))
            .unwrap_err();
        assert!(matches!(err, DocError::DegenerateQuadrilateral(_)));
    }

    #[test]
    fn coincident_corners_are_degenerate() {
        let image = RasterImage::from_gray(GrayImage::from_pixel(50, 50, Luma([90u8]))).unwrap();
        let err = rectify(&image, &quad([(5.0, 5.0), (5.0, 5.0), (40.0, 40.0), (5.0, 40.0)]))
            .unwrap_err();
        assert!(matches!(err, DocError::DegenerateQuadrilateral(_)));
    }
}
