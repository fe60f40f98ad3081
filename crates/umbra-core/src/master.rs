use std::fs;
use std::path::{Path, PathBuf};

use chrono::{DateTime, Utc};
use tracing::{debug, warn};

use crate::engine::StackParams;
use crate::error::{Result, UmbraError};
use crate::fits::{self, FitsReader};
use crate::frame::FrameInfo;
use crate::group::GroupKey;
use crate::header::{format_timestamp, keys, HeaderView};

/// What the update policy needs to know about an existing master.
#[derive(Clone, Debug)]
pub struct MasterInfo {
    pub path: PathBuf,
    /// Stamped acquisition timestamp; `None` on masters from other tools.
    pub created_at: Option<DateTime<Utc>>,
    /// 0 when the header carries no frame count (older masters).
    pub n_frames_used: usize,
    pub stack_signature: Option<String>,
}

pub fn read_master(path: &Path) -> Result<MasterInfo> {
    let reader = FitsReader::open(path)?;
    let view = HeaderView::new(&reader.header);
    Ok(MasterInfo {
        path: path.to_path_buf(),
        created_at: view.timestamp(),
        n_frames_used: view.n_frames_used(),
        stack_signature: view.stack_signature().map(str::to_string),
    })
}

/// Locate the master for a key, if the library has one.
///
/// A master that exists but cannot be parsed is reported with no signature,
/// which makes the update policy rebuild it rather than trust it.
pub fn find_master(library_root: &Path, key: &GroupKey) -> Option<MasterInfo> {
    let path = library_root.join(key.master_filename());
    if !path.is_file() {
        return None;
    }
    match read_master(&path) {
        Ok(master) => Some(master),
        Err(err) => {
            warn!(path = %path.display(), error = %err, "unreadable master, will rebuild");
            Some(MasterInfo {
                path,
                created_at: None,
                n_frames_used: 0,
                stack_signature: None,
            })
        }
    }
}

/// Enumerate the masters currently in the library, sorted by filename.
pub fn list_masters(library_root: &Path) -> Result<Vec<MasterInfo>> {
    let mut masters = Vec::new();
    for entry in fs::read_dir(library_root)? {
        let entry = entry?;
        let path = entry.path();
        let name = entry.file_name();
        let name = name.to_string_lossy();
        if entry.file_type()?.is_file() && name.starts_with("master_") && name.ends_with(".fits") {
            match read_master(&path) {
                Ok(master) => masters.push(master),
                Err(err) => warn!(path = %path.display(), error = %err, "skipping unreadable master"),
            }
        }
    }
    masters.sort_by(|a, b| a.path.cmp(&b.path));
    Ok(masters)
}

/// Stamp the engine's intermediate output with group metadata and move it
/// into the library.
///
/// The augmented file is written next to its final path under a temporary
/// name, fsynced, then renamed. A crashed run never leaves a readable but
/// incomplete master behind.
pub fn write_master(
    intermediate: &Path,
    final_path: &Path,
    key: &GroupKey,
    accepted: &[FrameInfo],
    params: &StackParams,
    command: &str,
) -> Result<MasterInfo> {
    let reader = FitsReader::open(intermediate)
        .map_err(|err| UmbraError::HeaderWriteFailed(err.to_string()))?;
    let mut header = reader.header.clone();

    let latest = accepted
        .iter()
        .map(|f| f.acquired_at)
        .max()
        .ok_or_else(|| UmbraError::HeaderWriteFailed("no accepted frames".into()))?;

    let image_type = if key.is_bias() { "Master Bias" } else { "Master Dark" };
    header.set_str(keys::IMAGETYP, image_type, None);
    header.set_str(keys::INSTRUME, &key.camera_id, None);
    header.set_i64(keys::XBINNING, key.binning.0 as i64, None);
    header.set_i64(keys::YBINNING, key.binning.1 as i64, None);
    header.set_i64(keys::GAIN, key.gain, None);
    header.set_f64(keys::EXPTIME, key.exposure_s(), Some("seconds"));
    header.set_f64(keys::CCD_TEMP, key.temperature_c(), Some("quantised, degrees C"));
    header.set_logical(keys::CFAIMG, key.is_cfa, Some("colour filter array"));
    header.set_str(keys::DATE_OBS, &format_timestamp(latest), None);
    header.set_i64(keys::NSTACK, accepted.len() as i64, Some("frames stacked"));
    header.set_str(keys::STACKSIG, &params.signature(), None);
    header.set_str(keys::STACKCMD, command, None);

    let tmp_path = final_path.with_extension("fits.tmp");
    fits::write_fits(&tmp_path, &header, reader.data_bytes())
        .map_err(|err| UmbraError::HeaderWriteFailed(err.to_string()))?;
    fs::rename(&tmp_path, final_path)
        .map_err(|err| UmbraError::HeaderWriteFailed(err.to_string()))?;
    debug!(path = %final_path.display(), n = accepted.len(), "master written");

    Ok(MasterInfo {
        path: final_path.to_path_buf(),
        created_at: Some(latest),
        n_frames_used: accepted.len(),
        stack_signature: Some(params.signature()),
    })
}
