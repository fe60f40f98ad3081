pub mod stats;

use serde::{Deserialize, Serialize};
use tracing::{debug, warn};

use crate::fits::FitsReader;
use crate::frame::FrameInfo;
use crate::group::Group;

pub use stats::ImageStats;

/// First failed test of the per-frame battery, or why no battery ran.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum RejectReason {
    /// Pixel data could not be read.
    UnreadablePixels,
    /// Median not positive; the ratio statistics are undefined.
    NonPositiveMedian,
    /// Light leak or open shutter: the frame is too bright overall.
    MedianCeiling,
    /// Stars or defects: too many pixels far above the mean.
    HotPixelFraction,
    /// Non-uniform illumination or gradients.
    RelativeNoise,
    /// Global variability or vignetting.
    CentralDispersion,
}

impl std::fmt::Display for RejectReason {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            RejectReason::UnreadablePixels => write!(f, "UnreadablePixels"),
            RejectReason::NonPositiveMedian => write!(f, "NonPositiveMedian"),
            RejectReason::MedianCeiling => write!(f, "MedianCeiling"),
            RejectReason::HotPixelFraction => write!(f, "HotPixelFraction"),
            RejectReason::RelativeNoise => write!(f, "RelativeNoise"),
            RejectReason::CentralDispersion => write!(f, "CentralDispersion"),
        }
    }
}

/// Thresholds of the validation battery. Defaults are sensor-scale ADU
/// values tuned for typical cooled CMOS dark frames.
#[derive(Clone, Copy, Debug, Serialize, Deserialize)]
pub struct ValidationLimits {
    /// Maximum allowed median, in ADU.
    #[serde(default = "default_max_median")]
    pub max_median: f64,
    /// Maximum fraction of pixels above mean + 3*std.
    #[serde(default = "default_max_hot_pixel_fraction")]
    pub max_hot_pixel_fraction: f64,
    /// Maximum mad / median.
    #[serde(default = "default_max_mad_ratio")]
    pub max_mad_ratio: f64,
    /// Maximum (p90 - p10) / median.
    #[serde(default = "default_max_central_dispersion")]
    pub max_central_dispersion: f64,
}

fn default_max_median() -> f64 {
    200.0
}
fn default_max_hot_pixel_fraction() -> f64 {
    0.002
}
fn default_max_mad_ratio() -> f64 {
    0.15
}
fn default_max_central_dispersion() -> f64 {
    0.4
}

impl Default for ValidationLimits {
    fn default() -> Self {
        Self {
            max_median: default_max_median(),
            max_hot_pixel_fraction: default_max_hot_pixel_fraction(),
            max_mad_ratio: default_max_mad_ratio(),
            max_central_dispersion: default_max_central_dispersion(),
        }
    }
}

/// A frame that failed validation, with the evidence.
#[derive(Clone, Debug)]
pub struct RejectedFrame {
    pub frame: FrameInfo,
    pub reason: RejectReason,
    /// Absent when the pixels could not be read at all.
    pub stats: Option<ImageStats>,
}

/// Apply the battery in order; the first failure is the reason.
fn check(stats: &ImageStats, limits: &ValidationLimits) -> Option<RejectReason> {
    if stats.median <= 0.0 {
        return Some(RejectReason::NonPositiveMedian);
    }
    if stats.median > limits.max_median {
        return Some(RejectReason::MedianCeiling);
    }
    if stats.hot_pixel_fraction > limits.max_hot_pixel_fraction {
        return Some(RejectReason::HotPixelFraction);
    }
    match (stats.mad_ratio, stats.central_dispersion) {
        (Some(mad_ratio), Some(dispersion)) => {
            if mad_ratio > limits.max_mad_ratio {
                return Some(RejectReason::RelativeNoise);
            }
            if dispersion > limits.max_central_dispersion {
                return Some(RejectReason::CentralDispersion);
            }
            None
        }
        _ => Some(RejectReason::NonPositiveMedian),
    }
}

/// Validate every frame of a group.
///
/// Accepted frames preserve the group's order; accepted + rejected always
/// account for the whole group. One frame's pixels are resident at a time.
pub fn validate_group(
    group: &Group,
    limits: &ValidationLimits,
) -> (Vec<FrameInfo>, Vec<RejectedFrame>) {
    let mut accepted = Vec::with_capacity(group.len());
    let mut rejected = Vec::new();

    for frame in &group.frames {
        let pixels = match FitsReader::open(&frame.path).and_then(|r| r.read_pixels()) {
            Ok(pixels) => pixels,
            Err(err) => {
                warn!(path = %frame.path.display(), error = %err, "pixel data unreadable");
                rejected.push(RejectedFrame {
                    frame: frame.clone(),
                    reason: RejectReason::UnreadablePixels,
                    stats: None,
                });
                continue;
            }
        };

        let stats = ImageStats::compute(&pixels);
        drop(pixels);

        match check(&stats, limits) {
            None => {
                debug!(path = %frame.path.display(), median = stats.median, "frame accepted");
                accepted.push(frame.clone());
            }
            Some(reason) => {
                warn!(
                    path = %frame.path.display(),
                    %reason,
                    median = stats.median,
                    hot = stats.hot_pixel_fraction,
                    "frame rejected"
                );
                rejected.push(RejectedFrame {
                    frame: frame.clone(),
                    reason,
                    stats: Some(stats),
                });
            }
        }
    }

    (accepted, rejected)
}
