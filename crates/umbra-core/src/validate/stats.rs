use ndarray::Array2;
use rayon::prelude::*;

use crate::consts::PARALLEL_PIXEL_THRESHOLD;

/// Robust summary of a single frame's pixel rectangle.
///
/// The ratio fields are `None` when the median is not positive; such a
/// frame cannot be validated.
#[derive(Clone, Copy, Debug, Default)]
pub struct ImageStats {
    pub median: f64,
    /// Median absolute deviation from the median.
    pub mad: f64,
    pub mean: f64,
    pub std: f64,
    pub p10: f64,
    pub p90: f64,
    pub mad_ratio: Option<f64>,
    /// (p90 - p10) / median.
    pub central_dispersion: Option<f64>,
    /// Fraction of pixels exceeding mean + 3*std.
    pub hot_pixel_fraction: f64,
}

impl ImageStats {
    /// Compute all statistics over the full rectangle, no masking.
    ///
    /// Order statistics use an O(n) selection kernel rather than a full
    /// sort; mean and std use a single-pass Welford accumulator.
    pub fn compute(pixels: &Array2<f32>) -> Self {
        let n = pixels.len();
        if n == 0 {
            return Self::default();
        }

        let mut scratch: Vec<f32> = pixels.iter().copied().collect();

        let (mean, std) = welford(&scratch);
        let median = median_in_place(&mut scratch);
        let p10 = percentile_in_place(&mut scratch, 0.10);
        let p90 = percentile_in_place(&mut scratch, 0.90);

        let mut deviations: Vec<f32> = scratch
            .iter()
            .map(|&v| (v as f64 - median).abs() as f32)
            .collect();
        let mad = median_in_place(&mut deviations);

        let cut = mean + 3.0 * std;
        let hot = if n >= PARALLEL_PIXEL_THRESHOLD {
            scratch.par_iter().filter(|&&v| v as f64 > cut).count()
        } else {
            scratch.iter().filter(|&&v| v as f64 > cut).count()
        };

        let (mad_ratio, central_dispersion) = if median > 0.0 {
            (Some(mad / median), Some((p90 - p10) / median))
        } else {
            (None, None)
        };

        Self {
            median,
            mad,
            mean,
            std,
            p10,
            p90,
            mad_ratio,
            central_dispersion,
            hot_pixel_fraction: hot as f64 / n as f64,
        }
    }
}

/// Median via selection. Even-length inputs average the two middle values.
/// Permutes `values`.
pub fn median_in_place(values: &mut [f32]) -> f64 {
    let n = values.len();
    if n == 0 {
        return 0.0;
    }
    let (lo, upper, _) = values.select_nth_unstable_by(n / 2, f32::total_cmp);
    let upper = *upper as f64;
    if n % 2 == 1 {
        upper
    } else {
        let lower = lo.iter().copied().fold(f32::NEG_INFINITY, f32::max) as f64;
        (lower + upper) / 2.0
    }
}

/// Nearest-rank percentile via the same selection kernel. Permutes `values`.
pub fn percentile_in_place(values: &mut [f32], q: f64) -> f64 {
    let n = values.len();
    if n == 0 {
        return 0.0;
    }
    let rank = ((n - 1) as f64 * q).round() as usize;
    let (_, value, _) = values.select_nth_unstable_by(rank, f32::total_cmp);
    *value as f64
}

/// Single-pass numerically stable mean and population standard deviation.
fn welford(values: &[f32]) -> (f64, f64) {
    let mut mean = 0.0f64;
    let mut m2 = 0.0f64;
    for (i, &v) in values.iter().enumerate() {
        let v = v as f64;
        let delta = v - mean;
        mean += delta / (i + 1) as f64;
        m2 += delta * (v - mean);
    }
    let n = values.len();
    if n == 0 {
        (0.0, 0.0)
    } else {
        (mean, (m2 / n as f64).sqrt())
    }
}
