use std::path::{Path, PathBuf};

use chrono::Duration;
use tracing::{debug, warn};
use walkdir::WalkDir;

use crate::consts::{BIAS_EXPOSURE_CEILING_S, FITS_EXTENSIONS};
use crate::error::{Result, UmbraError};
use crate::fits::FitsReader;
use crate::frame::{FrameInfo, FrameKind};
use crate::header::{keys, HeaderView};

/// A file the scanner saw but did not emit, with the reason why.
#[derive(Clone, Debug)]
pub struct SkippedFile {
    pub path: PathBuf,
    pub reason: String,
}

/// Everything the scanner produced: calibration frames plus skip
/// diagnostics, both fed to the reporter.
#[derive(Debug, Default)]
pub struct ScanOutcome {
    pub frames: Vec<FrameInfo>,
    pub skipped: Vec<SkippedFile>,
}

impl ScanOutcome {
    /// Candidate files the traversal considered (emitted + skipped).
    pub fn files_seen(&self) -> usize {
        self.frames.len() + self.skipped.len()
    }
}

fn has_image_extension(path: &Path) -> bool {
    path.extension()
        .and_then(|e| e.to_str())
        .map(|e| e.to_ascii_lowercase())
        .is_some_and(|e| FITS_EXTENSIONS.contains(&e.as_str()))
}

/// Classify a frame: explicit header hint wins, exposure decides otherwise.
fn classify(image_type: Option<&str>, exposure_s: f64) -> FrameKind {
    if let Some(hint) = image_type {
        let hint = hint.trim().to_ascii_lowercase();
        return match hint.as_str() {
            "dark" | "dark frame" => FrameKind::Dark,
            "bias" | "bias frame" | "offset" => FrameKind::Bias,
            _ => FrameKind::Other,
        };
    }
    if exposure_s <= BIAS_EXPOSURE_CEILING_S {
        FrameKind::Bias
    } else {
        FrameKind::Dark
    }
}

/// Parse one file's header into a `FrameInfo`.
pub fn read_frame_info(path: &Path) -> Result<FrameInfo> {
    let reader = FitsReader::open(path)?;
    let view = HeaderView::new(&reader.header);

    let missing = |field: &'static str| UmbraError::MissingHeaderField {
        path: path.to_path_buf(),
        field,
    };

    let acquired_at = view.timestamp().ok_or_else(|| missing(keys::DATE_OBS))?;
    let temperature_c = view.temperature_c().ok_or_else(|| missing(keys::CCD_TEMP))?;
    let exposure_s = view.exposure_s().ok_or_else(|| missing(keys::EXPTIME))?;
    let gain = view.gain().ok_or_else(|| missing(keys::GAIN))?;
    let binning = view.binning().ok_or_else(|| missing(keys::XBINNING))?;
    let camera_id = view
        .camera_id()
        .ok_or_else(|| missing(keys::INSTRUME))?
        .to_string();
    let kind = classify(view.image_type(), exposure_s);

    Ok(FrameInfo {
        path: path.to_path_buf(),
        acquired_at,
        camera_id,
        binning,
        gain,
        exposure_s,
        temperature_c,
        is_cfa: view.is_cfa(),
        kind,
    })
}

/// Walk the input roots and collect dark/bias frames.
///
/// Unreadable headers and non-calibration frames are skipped with a
/// diagnostic; an unreachable root is fatal. When `max_age_days` is set,
/// only frames acquired within that many days of the newest frame seen
/// survive (a second pass, since the newest timestamp is only known after
/// buffering everything).
pub fn scan_roots(roots: &[PathBuf], max_age_days: Option<u32>) -> Result<ScanOutcome> {
    let mut outcome = ScanOutcome::default();

    for root in roots {
        if !root.is_dir() {
            return Err(UmbraError::InputRootMissing(root.clone()));
        }
        for entry in WalkDir::new(root).follow_links(true) {
            let entry = match entry {
                Ok(entry) => entry,
                Err(err) => {
                    warn!(root = %root.display(), error = %err, "skipping unreadable entry");
                    continue;
                }
            };
            if !entry.file_type().is_file() || !has_image_extension(entry.path()) {
                continue;
            }
            match read_frame_info(entry.path()) {
                Ok(frame) if frame.kind.is_calibration() => outcome.frames.push(frame),
                Ok(frame) => {
                    debug!(path = %frame.path.display(), "not a calibration frame, skipping");
                    outcome.skipped.push(SkippedFile {
                        path: frame.path,
                        reason: "not a dark or bias frame".into(),
                    });
                }
                Err(err) => {
                    warn!(path = %entry.path().display(), error = %err, "skipping frame");
                    outcome.skipped.push(SkippedFile {
                        path: entry.path().to_path_buf(),
                        reason: err.to_string(),
                    });
                }
            }
        }
    }

    if let Some(days) = max_age_days {
        apply_age_window(&mut outcome, days);
    }

    Ok(outcome)
}

fn apply_age_window(outcome: &mut ScanOutcome, max_age_days: u32) {
    let Some(latest) = outcome.frames.iter().map(|f| f.acquired_at).max() else {
        return;
    };
    let cutoff = latest - Duration::days(max_age_days as i64);
    let (kept, dropped): (Vec<_>, Vec<_>) = std::mem::take(&mut outcome.frames)
        .into_iter()
        .partition(|f| f.acquired_at >= cutoff);
    outcome.frames = kept;
    for frame in dropped {
        debug!(path = %frame.path.display(), "outside age window");
        outcome.skipped.push(SkippedFile {
            path: frame.path,
            reason: format!("older than {} days before newest frame", max_age_days),
        });
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn exposure_fallback_splits_at_bias_ceiling() {
        assert_eq!(classify(None, 0.05), FrameKind::Bias);
        assert_eq!(classify(None, 0.050001), FrameKind::Dark);
        assert_eq!(classify(None, 0.0), FrameKind::Bias);
    }

    #[test]
    fn header_hint_beats_exposure() {
        assert_eq!(classify(Some("Dark"), 0.0), FrameKind::Dark);
        assert_eq!(classify(Some("Offset"), 300.0), FrameKind::Bias);
        assert_eq!(classify(Some("Light"), 300.0), FrameKind::Other);
        // masters in the tree must not be re-ingested
        assert_eq!(classify(Some("Master Dark"), 300.0), FrameKind::Other);
    }
}
