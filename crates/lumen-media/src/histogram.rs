//! Colour histograms for temporal segmentation.
//!
//! # Algorithm
//! 1. Bin every sampled pixel into a `bins x bins x bins` RGB cube,
//!    bin index `floor(v * bins / 256)` per channel
//! 2. Normalise counts to sum to 1.0 so exposure and resolution differences
//!    do not distort comparisons
//! 3. Compare two histograms with the Pearson correlation of their flattened
//!    bins: 1.0 identical distribution, 0 uncorrelated, negative inverse
//!
//! Correlation tolerates camera shake, exposure drift and motion blur far
//! better than raw pixel differences while still dropping sharply on cuts.

use image::RgbImage;
use ndarray::Array3;
use rayon::prelude::*;

use lumen_models::config::MAX_HISTOGRAM_BINS;

use crate::error::MediaResult;
use crate::frames::FrameRef;

/// Normalised 3-channel colour histogram.
#[derive(Debug, Clone, PartialEq)]
pub struct ColorHistogram {
    bins: usize,
    /// Indexed `[r, g, b]`; sums to 1.0 unless the source had no pixels
    counts: Array3<f32>,
}

/// Bin index for channel value `v` with `bins` bins per channel.
#[inline]
pub fn bin_index(v: u8, bins: usize) -> usize {
    (v as usize * bins) / 256
}

impl ColorHistogram {
    /// Histogram over every pixel of `image`.
    pub fn compute(image: &RgbImage, bins: usize) -> Self {
        Self::compute_sampled(image, bins, 1)
    }

    /// Histogram over every `stride`-th pixel in both directions.
    pub fn compute_sampled(image: &RgbImage, bins: usize, stride: u32) -> Self {
        let bins = bins.clamp(1, MAX_HISTOGRAM_BINS);
        let stride = stride.max(1);
        let mut counts = Array3::<f32>::zeros((bins, bins, bins));
        let mut total = 0u64;

        for y in (0..image.height()).step_by(stride as usize) {
            for x in (0..image.width()).step_by(stride as usize) {
                let [r, g, b] = image.get_pixel(x, y).0;
                counts[[bin_index(r, bins), bin_index(g, bins), bin_index(b, bins)]] += 1.0;
                total += 1;
            }
        }

        if total > 0 {
            let inv = 1.0 / total as f32;
            counts.mapv_inplace(|c| c * inv);
        }

        Self { bins, counts }
    }

    /// Bins per channel.
    pub fn bins(&self) -> usize {
        self.bins
    }

    /// Normalised count of one bin.
    pub fn get(&self, r: usize, g: usize, b: usize) -> f32 {
        self.counts[[r, g, b]]
    }

    /// Sum of all bins (1.0 for any non-empty source).
    pub fn total(&self) -> f64 {
        self.counts.iter().map(|&c| c as f64).sum()
    }

    /// Pearson correlation between the flattened histograms, in [-1, 1].
    ///
    /// Histograms of different resolution are uncorrelated by definition.
    pub fn similarity(&self, other: &ColorHistogram) -> f64 {
        if self.bins != other.bins {
            return 0.0;
        }
        // Exact, so identical frames never fall below a threshold of 1.0
        if self.counts == other.counts {
            return 1.0;
        }

        let n = self.counts.len() as f64;
        let mean_a = self.total() / n;
        let mean_b = other.total() / n;

        let mut cov = 0.0f64;
        let mut var_a = 0.0f64;
        let mut var_b = 0.0f64;
        for (&a, &b) in self.counts.iter().zip(other.counts.iter()) {
            let da = a as f64 - mean_a;
            let db = b as f64 - mean_b;
            cov += da * db;
            var_a += da * da;
            var_b += db * db;
        }

        // Flat histograms have no variance and differ here, so no correlation
        if var_a <= f64::EPSILON || var_b <= f64::EPSILON {
            return 0.0;
        }

        (cov / (var_a * var_b).sqrt()).clamp(-1.0, 1.0)
    }
}

/// Compute histograms for `frames` in parallel, preserving order.
///
/// Frames are decoded one at a time per thread and dropped right after
/// binning, so peak memory stays at a handful of decoded frames.
pub fn compute_histograms(
    frames: &[FrameRef],
    bins: usize,
    stride: u32,
) -> MediaResult<Vec<ColorHistogram>> {
    frames
        .par_iter()
        .map(|frame| {
            let pixels = frame.load_pixels()?;
            Ok(ColorHistogram::compute_sampled(&pixels, bins, stride))
        })
        .collect()
}
