use std::path::PathBuf;

use anyhow::{bail, Context, Result};
use clap::{Args, ValueEnum};
use indicatif::{ProgressBar, ProgressStyle};
use umbra_core::engine::{EngineMode, OutputNorm, RejectionMethod, StackMethod, StackParams};
use umbra_core::group::GroupKey;
use umbra_core::pipeline::{run_observed, CancelToken, ProgressObserver, RunConfig};
use umbra_core::validate::ValidationLimits;

use crate::summary::print_run_summary;

#[derive(Clone, Copy, ValueEnum)]
pub enum StackMethodArg {
    Average,
    Median,
}

#[derive(Clone, Copy, ValueEnum)]
pub enum RejectionArg {
    None,
    Sigma,
    WinsorizedSigma,
    Minmax,
    Percentile,
}

#[derive(Clone, Copy, ValueEnum)]
pub enum NormArg {
    Noscale,
    Addscale,
    Rejection,
}

#[derive(Clone, Copy, ValueEnum)]
pub enum EngineModeArg {
    Native,
    Flatpak,
    Appimage,
}

#[derive(Args)]
pub struct UpdateArgs {
    /// Input directories containing raw dark/bias frames
    #[arg(required = true)]
    pub roots: Vec<PathBuf>,

    /// Master library directory
    #[arg(short, long)]
    pub library: PathBuf,

    /// Run config file (TOML); command-line stacking options are ignored
    #[arg(long)]
    pub config: Option<PathBuf>,

    /// Only consider frames within this many days of the newest one
    #[arg(long)]
    pub max_age_days: Option<u32>,

    /// Temperature bucket width in degrees Celsius
    #[arg(long, default_value = "0.5")]
    pub tprec: f64,

    /// Rebuild when a group has at least this many frames (0 = disabled)
    #[arg(long, default_value = "0")]
    pub min_darks: usize,

    /// Rebuild every master regardless of dates and frame counts
    #[arg(long)]
    pub force: bool,

    /// Do everything except spawn the engine or write masters
    #[arg(long)]
    pub dry_run: bool,

    /// Stacking method
    #[arg(long, value_enum, default_value = "average")]
    pub method: StackMethodArg,

    /// Pixel rejection method
    #[arg(long, value_enum, default_value = "winsorized-sigma")]
    pub rejection: RejectionArg,

    /// First rejection parameter (low sigma / percentile)
    #[arg(long, default_value = "3.0")]
    pub rejection_param1: f64,

    /// Second rejection parameter (high sigma / percentile)
    #[arg(long, default_value = "3.0")]
    pub rejection_param2: f64,

    /// Output normalisation
    #[arg(long, value_enum, default_value = "noscale")]
    pub norm: NormArg,

    /// How the stacking engine is launched
    #[arg(long, value_enum, default_value = "native")]
    pub engine: EngineModeArg,

    /// Engine binary, flatpak package id, or bundle path for the mode
    #[arg(long, default_value = "siril")]
    pub engine_path: String,

    /// Staging directory override
    #[arg(long)]
    pub staging: Option<PathBuf>,
}

struct GroupProgress {
    bar: ProgressBar,
}

impl ProgressObserver for GroupProgress {
    fn begin(&self, total_groups: usize) {
        self.bar.set_length(total_groups as u64);
    }

    fn group_started(&self, key: &GroupKey) {
        self.bar.set_message(key.to_string());
    }

    fn group_finished(&self, _key: &GroupKey) {
        self.bar.inc(1);
    }
}

pub fn run(args: &UpdateArgs) -> Result<()> {
    let config = if let Some(ref config_path) = args.config {
        let contents = std::fs::read_to_string(config_path)
            .with_context(|| format!("Failed to read config {}", config_path.display()))?;
        let mut config: RunConfig = toml::from_str(&contents).context("Invalid run config")?;
        // roots and library always come from the command line
        config.input_roots = args.roots.clone();
        config.library_root = args.library.clone();
        config
    } else {
        build_config_from_args(args)
    };

    let cancel = CancelToken::new();
    {
        let cancel = cancel.clone();
        ctrlc::set_handler(move || {
            eprintln!("\ninterrupt received, finishing current group...");
            cancel.cancel();
        })
        .context("Failed to install interrupt handler")?;
    }

    let bar = ProgressBar::new(0);
    bar.set_style(
        ProgressStyle::default_bar()
            .template("{msg:40} [{bar:40}] {pos}/{len}")?
            .progress_chars("=> "),
    );
    let observer = GroupProgress { bar: bar.clone() };

    let summary = run_observed(&config, &cancel, &observer)?;
    bar.finish_and_clear();

    print_run_summary(&summary);

    if summary.cancelled {
        bail!("run cancelled");
    }
    if summary.groups_failed > 0 {
        bail!("{} group(s) failed", summary.groups_failed);
    }
    Ok(())
}

fn build_config_from_args(args: &UpdateArgs) -> RunConfig {
    let stacking = StackParams {
        method: match args.method {
            StackMethodArg::Average => StackMethod::Average,
            StackMethodArg::Median => StackMethod::Median,
        },
        rejection: match args.rejection {
            RejectionArg::None => RejectionMethod::None,
            RejectionArg::Sigma => RejectionMethod::Sigma,
            RejectionArg::WinsorizedSigma => RejectionMethod::WinsorizedSigma,
            RejectionArg::Minmax => RejectionMethod::MinMax,
            RejectionArg::Percentile => RejectionMethod::Percentile,
        },
        rejection_param1: args.rejection_param1,
        rejection_param2: args.rejection_param2,
        norm: match args.norm {
            NormArg::Noscale => OutputNorm::NoScale,
            NormArg::Addscale => OutputNorm::AddScale,
            NormArg::Rejection => OutputNorm::Rejection,
        },
    };

    let engine = match args.engine {
        EngineModeArg::Native => EngineMode::Native {
            binary: PathBuf::from(&args.engine_path),
        },
        EngineModeArg::Flatpak => EngineMode::Flatpak {
            package: args.engine_path.clone(),
        },
        EngineModeArg::Appimage => EngineMode::AppImage {
            bundle: PathBuf::from(&args.engine_path),
        },
    };

    RunConfig {
        input_roots: args.roots.clone(),
        library_root: args.library.clone(),
        staging_dir: args.staging.clone(),
        max_age_days: args.max_age_days,
        temperature_precision: args.tprec,
        min_darks_threshold: args.min_darks,
        force: args.force,
        dry_run: args.dry_run,
        limits: ValidationLimits::default(),
        stacking,
        engine,
    }
}
