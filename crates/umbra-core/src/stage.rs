use std::fs;
use std::path::{Path, PathBuf};

use tracing::{debug, warn};

use crate::error::{Result, UmbraError};
use crate::frame::FrameInfo;

/// Staging directory owned exclusively by the current run.
///
/// Created on construction (wiping any leftover from an interrupted run)
/// and removed again when dropped, on every exit path including
/// cancellation and fatal errors.
pub struct StagingArea {
    root: PathBuf,
}

impl StagingArea {
    pub fn create(root: PathBuf) -> Result<Self> {
        if root.exists() {
            fs::remove_dir_all(&root)?;
        }
        fs::create_dir_all(&root)?;
        #[cfg(unix)]
        {
            use std::os::unix::fs::PermissionsExt;
            fs::set_permissions(&root, fs::Permissions::from_mode(0o700))?;
        }
        Ok(Self { root })
    }

    pub fn path(&self) -> &Path {
        &self.root
    }

    /// Populate the staging directory with one entry per accepted frame.
    ///
    /// Any previous contents are wiped first; entry names are dense,
    /// 0-based `frame_<index:05>` so the engine sees a stable numbered
    /// sequence. Symbolic links are preferred; a frame that cannot be
    /// linked (e.g. cross-device) is copied instead, and a frame that can
    /// be neither linked nor copied aborts the group.
    pub fn stage(&self, accepted: &[FrameInfo]) -> Result<Vec<PathBuf>> {
        for entry in fs::read_dir(&self.root)? {
            let entry = entry?;
            if entry.file_type()?.is_dir() {
                fs::remove_dir_all(entry.path())?;
            } else {
                fs::remove_file(entry.path())?;
            }
        }

        let mut staged = Vec::with_capacity(accepted.len());
        for (index, frame) in accepted.iter().enumerate() {
            let ext = frame
                .path
                .extension()
                .and_then(|e| e.to_str())
                .unwrap_or("fits");
            let dest = self.root.join(format!("frame_{:05}.{}", index, ext));
            link_or_copy(&frame.path, &dest).map_err(|err| {
                UmbraError::StagingFailed(format!(
                    "{} -> {}: {}",
                    frame.path.display(),
                    dest.display(),
                    err
                ))
            })?;
            staged.push(dest);
        }
        debug!(dir = %self.root.display(), count = staged.len(), "staged frames");
        Ok(staged)
    }
}

impl Drop for StagingArea {
    fn drop(&mut self) {
        if let Err(err) = fs::remove_dir_all(&self.root) {
            if err.kind() != std::io::ErrorKind::NotFound {
                warn!(dir = %self.root.display(), error = %err, "failed to remove staging directory");
            }
        }
    }
}

#[cfg(unix)]
fn link_or_copy(src: &Path, dest: &Path) -> std::io::Result<()> {
    match std::os::unix::fs::symlink(src, dest) {
        Ok(()) => Ok(()),
        Err(err) => {
            debug!(src = %src.display(), error = %err, "symlink refused, copying");
            fs::copy(src, dest).map(|_| ())
        }
    }
}

#[cfg(not(unix))]
fn link_or_copy(src: &Path, dest: &Path) -> std::io::Result<()> {
    fs::copy(src, dest).map(|_| ())
}
