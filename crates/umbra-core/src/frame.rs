use std::path::PathBuf;

use chrono::{DateTime, Utc};

/// Calibration frame classification, derived from header hints.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum FrameKind {
    Dark,
    Bias,
    Other,
}

impl FrameKind {
    pub fn is_calibration(self) -> bool {
        matches!(self, FrameKind::Dark | FrameKind::Bias)
    }
}

/// Metadata for one input file, immutable once the scanner emits it.
/// Pixel data is never held here; the validator reads it on demand.
#[derive(Clone, Debug)]
pub struct FrameInfo {
    pub path: PathBuf,
    pub acquired_at: DateTime<Utc>,
    pub camera_id: String,
    /// Horizontal and vertical binning, e.g. (1, 1) or (2, 2).
    pub binning: (u32, u32),
    pub gain: i64,
    /// Seconds; 0 means bias, treated as just another exposure bucket.
    pub exposure_s: f64,
    /// As recorded, before quantisation.
    pub temperature_c: f64,
    pub is_cfa: bool,
    pub kind: FrameKind,
}
