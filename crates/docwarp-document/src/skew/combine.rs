// SPDX-License-Identifier: PMPL-1.0-or-later
// Copyright (c) 2026 Jonathan D.A. Jewell (hyperpolymath) <jonathan.jewell@open.ac.uk>
//
// Outlier-rejecting weighted average of angle estimates.

/// One angle with its combination weight.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct WeightedAngle {
    pub angle: f64,
    pub weight: f64,
}

/// Combine estimates into a single angle.
///
/// Estimates further than `outlier_threshold` degrees from the median are
/// discarded; the rest are averaged by weight. If every estimate is an
/// outlier, all of them are averaged. Returns `None` for an empty input or
/// when the averaged estimates carry no weight.
pub fn combine_estimates(estimates: &[WeightedAngle], outlier_threshold: f64) -> Option<f64> {
    if estimates.is_empty() {
        return None;
    }

    let angles: Vec<f64> = estimates.iter().map(|e| e.angle).collect();
    let center = median(&angles);

    let inliers: Vec<WeightedAngle> = estimates
        .iter()
        .copied()
        .filter(|e| (e.angle - center).abs() <= outlier_threshold)
        .collect();
    let pool = if inliers.is_empty() {
        estimates
    } else {
        inliers.as_slice()
    };

    let total_weight: f64 = pool.iter().map(|e| e.weight).sum();
    if total_weight <= 0.0 || !total_weight.is_finite() {
        return None;
    }
    Some(pool.iter().map(|e| e.angle * e.weight).sum::<f64>() / total_weight)
}

/// Median of `values`; the mean of the two middle values for even counts.
pub fn median(values: &[f64]) -> f64 {
    if values.is_empty() {
        return 0.0;
    }
    let mut sorted = values.to_vec();
    sorted.sort_by(f64::total_cmp);
    let mid = sorted.len() / 2;
    if sorted.len() % 2 == 0 {
        (sorted[mid - 1] + sorted[mid]) / 2.0
    } else {
        sorted[mid]
    }
}

/// Weighted median: the first value (in ascending order) at which the
/// cumulative weight reaches half the total.
pub fn weighted_median(samples: &[(f64, f64)]) -> Option<f64> {
    let total: f64 = samples.iter().map(|(_, w)| w).sum();
    if samples.is_empty() || total <= 0.0 {
        return None;
    }
    let mut sorted = samples.to_vec();
    sorted.sort_by(|a, b| a.0.total_cmp(&b.0));
    let mut cumulative = 0.0;
    for (value, weight) in &sorted {
        cumulative += weight;
        if cumulative >= total / 2.0 {
            return Some(*value);
        }
    }
    sorted.last().map(|(value, _)| *value)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn w(angle: f64, weight: f64) -> WeightedAngle {
        WeightedAngle { angle, weight }
    }

    #[test]
    fn empty_input_has_no_angle() {
        assert_eq!(combine_estimates(&[], 10.0), None);
    }

    #[test]
    fn weighted_mean_of_agreeing_estimates() {
        let combined = combine_estimates(&[w(2.0, 0.6), w(4.0, 0.2)], 10.0).unwrap();
        assert!((combined - 2.5).abs() < 1e-12);
    }

    /// An estimate far from the median is ignored, however heavy.
    #[test]
    fn outlier_is_rejected() {
        let combined =
            combine_estimates(&[w(3.0, 0.3), w(3.2, 0.1), w(25.0, 0.6)], 10.0).unwrap();
        assert!((combined - 3.05).abs() < 1e-12, "combined {combined}");
    }

    /// Two estimates 30 degrees apart straddle the median symmetrically; both
    /// are outliers, so the weighted mean of all of them is used.
    #[test]
    fn all_outliers_fall_back_to_every_estimate() {
        let combined = combine_estimates(&[w(-15.0, 1.0), w(15.0, 3.0)], 10.0).unwrap();
        assert!((combined - 7.5).abs() < 1e-12);
    }

    /// Zero-confidence estimates carry no evidence and must not set an angle.
    #[test]
    fn weightless_estimates_have_no_angle() {
        assert_eq!(combine_estimates(&[w(1.0, 0.0), w(3.0, 0.0)], 10.0), None);
        assert_eq!(combine_estimates(&[w(-15.0, 0.0)], 10.0), None);
    }

    #[test]
    fn weightless_estimate_does_not_shift_the_mean() {
        let combined = combine_estimates(&[w(2.0, 0.5), w(-6.0, 0.0)], 10.0).unwrap();
        assert!((combined - 2.0).abs() < 1e-12);
    }

    #[test]
    fn median_even_and_odd() {
        assert_eq!(median(&[3.0, 1.0, 2.0]), 2.0);
        assert_eq!(median(&[4.0, 1.0, 2.0, 3.0]), 2.5);
        assert_eq!(median(&[]), 0.0);
    }

    #[test]
    fn weighted_median_follows_mass() {
        let samples = [(1.0, 1.0), (2.0, 1.0), (10.0, 5.0)];
        assert_eq!(weighted_median(&samples), Some(10.0));
        assert_eq!(weighted_median(&[]), None);
    }
}
