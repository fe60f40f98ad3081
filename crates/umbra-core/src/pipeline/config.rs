use std::path::PathBuf;

use serde::{Deserialize, Serialize};

use crate::engine::{EngineMode, StackParams};
use crate::validate::ValidationLimits;

/// Immutable parameter record for one library update run.
///
/// A run is pure given this record plus the input set: no component
/// mutates it, and two runs with equal configs over equal inputs produce
/// the same library.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct RunConfig {
    /// Directories scanned recursively for dark/bias frames.
    #[serde(default)]
    pub input_roots: Vec<PathBuf>,
    /// Where masters live.
    #[serde(default)]
    pub library_root: PathBuf,
    /// Staging directory; defaults to `.staging` under the library root.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub staging_dir: Option<PathBuf>,
    /// Only frames within this many days of the newest frame are kept.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub max_age_days: Option<u32>,
    /// Temperature bucket width in degrees Celsius.
    #[serde(default = "default_temperature_precision")]
    pub temperature_precision: f64,
    /// Groups at least this large rebuild even without a frame-count gain.
    /// 0 disables the threshold.
    #[serde(default)]
    pub min_darks_threshold: usize,
    /// Rebuild every group regardless of the existing masters.
    #[serde(default)]
    pub force: bool,
    /// Generate scripts and report, but never spawn the engine or write.
    #[serde(default)]
    pub dry_run: bool,
    #[serde(default)]
    pub limits: ValidationLimits,
    #[serde(default)]
    pub stacking: StackParams,
    #[serde(default)]
    pub engine: EngineMode,
}

fn default_temperature_precision() -> f64 {
    0.5
}

impl Default for RunConfig {
    fn default() -> Self {
        Self {
            input_roots: Vec::new(),
            library_root: PathBuf::new(),
            staging_dir: None,
            max_age_days: None,
            temperature_precision: default_temperature_precision(),
            min_darks_threshold: 0,
            force: false,
            dry_run: false,
            limits: ValidationLimits::default(),
            stacking: StackParams::default(),
            engine: EngineMode::default(),
        }
    }
}

impl RunConfig {
    pub fn effective_staging_dir(&self) -> PathBuf {
        self.staging_dir
            .clone()
            .unwrap_or_else(|| self.library_root.join(".staging"))
    }
}
