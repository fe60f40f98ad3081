use std::collections::HashMap;

use chrono::{DateTime, Utc};

use crate::frame::FrameInfo;

/// Quantise `value` to the nearest multiple of `precision`.
///
/// Ties round to even multiples (banker's rounding) so temperatures sitting
/// exactly on a half-bucket don't drift between runs.
pub fn quantize(value: f64, precision: f64) -> f64 {
    if precision <= 0.0 {
        return value;
    }
    (value / precision).round_ties_even() * precision
}

/// Acquisition equivalence class. Frames with equal keys may be stacked
/// together.
///
/// Exposure and quantised temperature are carried as scaled integers
/// (milliseconds, millidegrees) so equality and hashing are exact; the
/// float views are derived.
#[derive(Clone, Debug, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct GroupKey {
    pub camera_id: String,
    pub binning: (u32, u32),
    pub gain: i64,
    exposure_ms: i64,
    temperature_mc: i64,
    pub is_cfa: bool,
}

impl GroupKey {
    pub fn new(frame: &FrameInfo, temperature_precision: f64) -> Self {
        Self {
            camera_id: frame.camera_id.clone(),
            binning: frame.binning,
            gain: frame.gain,
            exposure_ms: (frame.exposure_s * 1000.0).round() as i64,
            temperature_mc: (quantize(frame.temperature_c, temperature_precision) * 1000.0)
                .round() as i64,
            is_cfa: frame.is_cfa,
        }
    }

    pub fn exposure_s(&self) -> f64 {
        self.exposure_ms as f64 / 1000.0
    }

    /// Quantised temperature in degrees Celsius.
    pub fn temperature_c(&self) -> f64 {
        self.temperature_mc as f64 / 1000.0
    }

    pub fn is_bias(&self) -> bool {
        self.exposure_ms == 0
    }

    /// Library filename for this key's master. Stable across runs; the
    /// update policy locates existing masters by this name alone.
    pub fn master_filename(&self) -> String {
        let kind = if self.is_bias() { "bias" } else { "dark" };
        let cfa = if self.is_cfa { "_cfa" } else { "" };
        format!(
            "master_{}_{}_bin{}x{}_gain{}_{}s_{}C{}.fits",
            kind,
            sanitize(&self.camera_id),
            self.binning.0,
            self.binning.1,
            self.gain,
            format_trimmed(self.exposure_s()),
            format_trimmed(self.temperature_c()),
            cfa,
        )
    }
}

impl std::fmt::Display for GroupKey {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(
            f,
            "{} bin{}x{} gain{} {}s {}\u{b0}C{}",
            self.camera_id,
            self.binning.0,
            self.binning.1,
            self.gain,
            format_trimmed(self.exposure_s()),
            format_trimmed(self.temperature_c()),
            if self.is_cfa { " cfa" } else { "" },
        )
    }
}

/// Render a float with up to three decimals, trailing zeros trimmed.
fn format_trimmed(value: f64) -> String {
    let mut s = format!("{:.3}", value);
    while s.ends_with('0') {
        s.pop();
    }
    if s.ends_with('.') {
        s.pop();
    }
    s
}

fn sanitize(s: &str) -> String {
    s.chars()
        .map(|c| if c.is_ascii_alphanumeric() { c } else { '-' })
        .collect()
}

/// One equivalence class and its frames, newest first.
#[derive(Clone, Debug)]
pub struct Group {
    pub key: GroupKey,
    pub frames: Vec<FrameInfo>,
}

impl Group {
    /// Most recent acquisition timestamp. Groups are never empty.
    pub fn latest_acquired(&self) -> DateTime<Utc> {
        self.frames[0].acquired_at
    }

    pub fn len(&self) -> usize {
        self.frames.len()
    }

    pub fn is_empty(&self) -> bool {
        self.frames.is_empty()
    }
}

/// Partition frames into groups by key.
///
/// Frames within a group are sorted by `acquired_at` descending, ties broken
/// by path. Groups come back in lexicographic key order so a run processes
/// them deterministically.
pub fn group_frames(frames: Vec<FrameInfo>, temperature_precision: f64) -> Vec<Group> {
    let mut buckets: HashMap<GroupKey, Vec<FrameInfo>> = HashMap::new();
    for frame in frames {
        let key = GroupKey::new(&frame, temperature_precision);
        buckets.entry(key).or_default().push(frame);
    }

    let mut groups: Vec<Group> = buckets
        .into_iter()
        .map(|(key, mut frames)| {
            frames.sort_by(|a, b| {
                b.acquired_at
                    .cmp(&a.acquired_at)
                    .then_with(|| a.path.cmp(&b.path))
            });
            Group { key, frames }
        })
        .collect();
    groups.sort_by(|a, b| a.key.cmp(&b.key));
    groups
}
