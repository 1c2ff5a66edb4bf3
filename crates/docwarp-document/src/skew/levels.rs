// SPDX-License-Identifier: PMPL-1.0-or-later
// Copyright (c) 2026 Jonathan D.A. Jewell (hyperpolymath) <jonathan.jewell@open.ac.uk>
//
// Gray-level histogram used by the ink-based skew strategies to separate ink
// from paper.

use image::GrayImage;

/// Pixel counts per 8-bit gray level.
#[derive(Debug, Clone)]
pub struct LevelHistogram {
    counts: [u64; 256],
    total: u64,
}

impl LevelHistogram {
    pub fn of(gray: &GrayImage) -> Self {
        let mut counts = [0u64; 256];
        for pixel in gray.pixels() {
            counts[pixel.0[0] as usize] += 1;
        }
        Self {
            counts,
            total: gray.width() as u64 * gray.height() as u64,
        }
    }

    /// Number of distinct gray levels present.
    pub fn distinct_levels(&self) -> usize {
        self.counts.iter().filter(|&&c| c > 0).count()
    }

    /// Otsu's level: ink is at or below it.
    ///
    /// Maximises the between-class variance `(mu_T * w - mu)^2 / (w * (1 - w))`
    /// over the cumulative class probability `w` and first moment `mu`.
    /// `None` when the image has fewer than two gray levels.
    pub fn otsu_level(&self) -> Option<u8> {
        if self.distinct_levels() < 2 {
            return None;
        }
        let total = self.total as f64;
        let mean_total: f64 = self
            .counts
            .iter()
            .enumerate()
            .map(|(level, &c)| level as f64 * c as f64)
            .sum::<f64>()
            / total;

        let mut omega = 0.0;
        let mut mu = 0.0;
        let mut best: Option<(u8, f64)> = None;
        for (level, &count) in self.counts.iter().enumerate().take(255) {
            let p = count as f64 / total;
            omega += p;
            mu += level as f64 * p;
            if omega <= 0.0 || omega >= 1.0 {
                continue;
            }
            let between = (mean_total * omega - mu).powi(2) / (omega * (1.0 - omega));
            if best.is_none_or(|(_, b)| between > b) {
                best = Some((level as u8, between));
            }
        }
        best.map(|(level, _)| level)
    }

    /// Lowest level at or below which at least `fraction` of the pixels lie.
    pub fn percentile(&self, fraction: f64) -> Option<u8> {
        if self.total == 0 {
            return None;
        }
        let target = (fraction.clamp(0.0, 1.0) * self.total as f64).ceil().max(1.0) as u64;
        let mut cumulative = 0;
        for (level, &count) in self.counts.iter().enumerate() {
            cumulative += count;
            if cumulative >= target {
                return Some(level as u8);
            }
        }
        Some(255)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use image::Luma;

    fn split(width: u32, dark: u8, light: u8, dark_columns: u32) -> GrayImage {
        GrayImage::from_fn(width, 10, |x, _| {
            if x < dark_columns { Luma([dark]) } else { Luma([light]) }
        })
    }

    #[test]
    fn otsu_separates_two_levels() {
        let hist = LevelHistogram::of(&split(10, 20, 200, 5));
        let level = hist.otsu_level().unwrap();
        assert!((20..200).contains(&level), "level {level}");
    }

    #[test]
    fn flat_image_has_no_otsu_level() {
        let flat = GrayImage::from_pixel(30, 30, Luma([128u8]));
        assert_eq!(LevelHistogram::of(&flat).otsu_level(), None);
    }

    #[test]
    fn percentile_finds_paper_level() {
        // 20% ink at 30, 80% paper at 235.
        let hist = LevelHistogram::of(&split(10, 30, 235, 2));
        assert_eq!(hist.percentile(0.1), Some(30));
        assert_eq!(hist.percentile(0.9), Some(235));
        assert_eq!(hist.distinct_levels(), 2);
    }

    #[test]
    fn empty_image_has_no_percentile() {
        assert_eq!(LevelHistogram::of(&GrayImage::new(0, 0)).percentile(0.5), None);
    }
}
