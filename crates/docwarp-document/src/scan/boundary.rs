// SPDX-License-Identifier: PMPL-1.0-or-later
// Copyright (c) 2026 Jonathan D.A. Jewell (hyperpolymath) <jonathan.jewell@open.ac.uk>
//
// Boundary detection — search several edge maps for the best-scoring
// four-sided outline of a document.
//
// The search order is fixed: edge strategy, then contour rank (largest area
// first), then simplification tolerance. Candidates are compared with a single
// strict "greater score wins" rule, so equal scores keep the earliest candidate.

use docwarp_core::config::{DetectionConfig, EdgeSource, EdgeStrategy};
use docwarp_core::types::{DetectionMethod, Dimensions, Point, Quadrilateral, polygon_area};
use image::GrayImage;
use imageproc::contours::{BorderType, find_contours};
use imageproc::distance_transform::Norm;
use imageproc::edges::canny;
use imageproc::geometry::{approximate_polygon_dp, arc_length, convex_hull};
use imageproc::morphology::close;
use imageproc::point::Point as PixelPoint;
use tracing::{debug, info, instrument};

use super::preprocess::Preprocessed;

/// Per-component scores of a candidate, each in [0, 1].
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ScoreBreakdown {
    /// Outline area / frame area (raw ratio, not a score).
    pub area_ratio: f64,
    pub area: f64,
    pub aspect: f64,
    /// Angular regularity: 1 for right angles, falling to 0 at 45 degrees mean deviation.
    pub angle: f64,
    /// 1.0, or the configured penalty when the outline hugs the frame.
    pub border_factor: f64,
    /// Weighted composite, after the border factor.
    pub score: f64,
}

/// A four-vertex outline found by one edge strategy.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Candidate {
    /// Vertices in contour traversal order (not yet normalized).
    pub quad: Quadrilateral,
    pub score: f64,
    pub breakdown: ScoreBreakdown,
    pub method: DetectionMethod,
}

/// Outcome of a boundary search.
#[derive(Debug, Clone, PartialEq)]
pub enum Detection {
    Found(Candidate),
    NotFound,
}

impl Detection {
    pub fn candidate(&self) -> Option<&Candidate> {
        match self {
            Self::Found(candidate) => Some(candidate),
            Self::NotFound => None,
        }
    }

    pub fn is_found(&self) -> bool {
        matches!(self, Self::Found(_))
    }
}

/// A top-level outer contour and the area it encloses.
struct Outline {
    points: Vec<PixelPoint<i32>>,
    area: f64,
}

/// Search every configured edge map for the best document outline.
#[instrument(skip_all, fields(width = pre.width(), height = pre.height()))]
pub fn detect_boundary(pre: &Preprocessed, config: &DetectionConfig) -> Detection {
    let frame = Dimensions::new(pre.width(), pre.height());
    let mut best: Option<Candidate> = None;

    for strategy in &config.strategies {
        let edges = edge_map(pre, strategy, config.close_passes);
        let outlines = external_outlines(&edges);
        debug!(
            method = %strategy.method,
            contours = outlines.len(),
            "Edge map traced"
        );

        if let Some(candidate) = best_outline(&outlines, frame, strategy.method, config) {
            keep_better(&mut best, candidate);
        }
    }

    match best {
        Some(candidate) if candidate.score >= config.acceptance_threshold => {
            info!(
                method = %candidate.method,
                score = candidate.score,
                "Document outline accepted"
            );
            Detection::Found(candidate)
        }
        Some(candidate) => {
            debug!(
                score = candidate.score,
                threshold = config.acceptance_threshold,
                "Best outline below acceptance threshold"
            );
            Detection::NotFound
        }
        None => {
            debug!("No four-sided outline in the area band");
            Detection::NotFound
        }
    }
}

/// Canny edges of the strategy's source image, closed to bridge small gaps.
fn edge_map(pre: &Preprocessed, strategy: &EdgeStrategy, close_passes: u32) -> GrayImage {
    let source = match strategy.source {
        EdgeSource::Blurred => &pre.blurred,
        EdgeSource::Threshold => &pre.threshold,
    };
    let mut edges = canny(source, strategy.low_threshold, strategy.high_threshold);
    for _ in 0..close_passes {
        // Radius 2 in the L-infinity norm is a 5x5 square.
        edges = close(&edges, Norm::LInf, 2);
    }
    edges
}

/// Outer contours without a parent, largest enclosed area first.
fn external_outlines(edges: &GrayImage) -> Vec<Outline> {
    let mut outlines: Vec<Outline> = find_contours::<i32>(edges)
        .into_iter()
        .filter(|contour| contour.border_type == BorderType::Outer && contour.parent.is_none())
        .map(|contour| {
            let area = polygon_area(&to_points(&contour.points));
            Outline {
                points: contour.points,
                area,
            }
        })
        .collect();
    // Stable sort: equal areas keep tracing order.
    outlines.sort_by(|a, b| b.area.total_cmp(&a.area));
    outlines
}

/// Best candidate among the first `max_contours` outlines of one edge map.
fn best_outline(
    outlines: &[Outline],
    frame: Dimensions,
    method: DetectionMethod,
    config: &DetectionConfig,
) -> Option<Candidate> {
    let mut best = None;
    for outline in outlines.iter().take(config.max_contours) {
        let Some(candidate) = evaluate_outline(outline, frame, method, config) else {
            continue;
        };
        debug!(
            method = %candidate.method,
            score = candidate.score,
            area_ratio = candidate.breakdown.area_ratio,
            "Candidate outline"
        );
        keep_better(&mut best, candidate);
    }
    best
}

/// Replace `best` only on a strictly greater score; ties keep the incumbent.
fn keep_better(best: &mut Option<Candidate>, candidate: Candidate) {
    if best.as_ref().is_none_or(|current| candidate.score > current.score) {
        *best = Some(candidate);
    }
}

fn evaluate_outline(
    outline: &Outline,
    frame: Dimensions,
    method: DetectionMethod,
    config: &DetectionConfig,
) -> Option<Candidate> {
    let area_ratio = outline.area / frame.area();
    if area_ratio < config.min_area_ratio || area_ratio > config.max_area_ratio {
        return None;
    }

    let hull_area = polygon_area(&to_points(&convex_hull(outline.points.as_slice())));
    if hull_area <= 0.0 || outline.area / hull_area < config.min_solidity {
        return None;
    }

    let perimeter = arc_length(&outline.points, true);
    for factor in &config.epsilon_factors {
        let vertices = simplify_closed(&outline.points, factor * perimeter);
        if vertices.len() != 4 {
            continue;
        }
        let quad = Quadrilateral::new([
            to_point(vertices[0]),
            to_point(vertices[1]),
            to_point(vertices[2]),
            to_point(vertices[3]),
        ]);
        let breakdown = score_quadrilateral(&quad, frame, config);
        return Some(Candidate {
            quad,
            score: breakdown.score,
            breakdown,
            method,
        });
    }
    None
}

/// Douglas-Peucker simplification of a closed contour.
///
/// The contour is cut at two far-apart anchor points and each open half is
/// simplified separately; the anchors always survive.
fn simplify_closed(points: &[PixelPoint<i32>], epsilon: f64) -> Vec<PixelPoint<i32>> {
    if points.len() < 4 {
        return points.to_vec();
    }

    let first = farthest_from(points, points[0]);
    let second = farthest_from(points, points[first]);
    if first == second {
        return points.to_vec();
    }
    let (start, end) = (first.min(second), first.max(second));

    let forward = &points[start..=end];
    let mut backward: Vec<PixelPoint<i32>> = points[end..].to_vec();
    backward.extend_from_slice(&points[..=start]);

    let mut simplified = approximate_polygon_dp(forward, epsilon, false);
    simplified.pop();
    let mut tail = approximate_polygon_dp(&backward, epsilon, false);
    tail.pop();
    simplified.extend(tail);
    simplified
}

fn farthest_from(points: &[PixelPoint<i32>], origin: PixelPoint<i32>) -> usize {
    let mut best = 0;
    let mut best_dist = -1i64;
    for (i, p) in points.iter().enumerate() {
        let dx = (p.x - origin.x) as i64;
        let dy = (p.y - origin.y) as i64;
        let dist = dx * dx + dy * dy;
        if dist > best_dist {
            best = i;
            best_dist = dist;
        }
    }
    best
}

/// Composite plausibility score of a four-sided outline within `frame`.
///
/// Angular regularity is measured in the given vertex order; aspect uses the
/// normalized corner order.
pub fn score_quadrilateral(
    quad: &Quadrilateral,
    frame: Dimensions,
    config: &DetectionConfig,
) -> ScoreBreakdown {
    let area_ratio = quad.area() / frame.area();
    let area = (area_ratio / config.max_area_ratio).clamp(0.0, 1.0);

    let [top, right, bottom, left] = quad.normalized().edge_lengths();
    let width = top.max(bottom);
    let height = left.max(right);
    let long_side = width.max(height);
    let ratio = if long_side > 0.0 {
        width.min(height) / long_side
    } else {
        0.0
    };
    let aspect = if config.plausible_aspect > config.min_aspect {
        ((ratio - config.min_aspect) / (config.plausible_aspect - config.min_aspect))
            .clamp(0.0, 1.0)
    } else if ratio >= config.plausible_aspect {
        1.0
    } else {
        0.0
    };

    let mean_deviation = quad
        .interior_angles()
        .iter()
        .map(|angle| (angle - 90.0).abs())
        .sum::<f64>()
        / 4.0;
    let angle = (1.0 - mean_deviation / 45.0).clamp(0.0, 1.0);

    let border_factor = if border_distance(quad, frame) < config.border_margin {
        config.border_penalty
    } else {
        1.0
    };

    let w = &config.weights;
    let composite = (w.area * area + w.aspect * aspect + w.angle * angle) / w.total();

    ScoreBreakdown {
        area_ratio,
        area,
        aspect,
        angle,
        border_factor,
        score: composite * border_factor,
    }
}

/// Smallest distance from any corner to the frame edge.
fn border_distance(quad: &Quadrilateral, frame: Dimensions) -> f64 {
    let (w, h) = (frame.width as f64 - 1.0, frame.height as f64 - 1.0);
    quad.points
        .iter()
        .map(|p| {
            let (x, y) = (p.x as f64, p.y as f64);
            x.min(y).min(w - x).min(h - y)
        })
        .fold(f64::INFINITY, f64::min)
}

fn to_point(p: PixelPoint<i32>) -> Point {
    Point::new(p.x as f32, p.y as f32)
}

fn to_points(points: &[PixelPoint<i32>]) -> Vec<Point> {
    points.iter().map(|p| to_point(*p)).collect()
}
