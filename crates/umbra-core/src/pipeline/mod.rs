pub mod config;

use std::fs;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use tracing::{info, warn};

use crate::consts::MIN_STACKABLE_FRAMES;
use crate::engine::StackRunner;
use crate::error::{Result, UmbraError};
use crate::group::{group_frames, Group, GroupKey};
use crate::master::{find_master, write_master};
use crate::policy::{decide, Decision, SkipReason};
use crate::report::{GroupOutcome, GroupReport, Reporter, RunSummary};
use crate::scan::scan_roots;
use crate::stage::StagingArea;
use crate::validate::validate_group;

pub use config::RunConfig;

/// Cooperative cancellation flag, consulted between groups.
///
/// The orchestrator never interrupts a running engine invocation; setting
/// the token skips everything that has not started yet.
#[derive(Clone, Debug, Default)]
pub struct CancelToken {
    flag: Arc<AtomicBool>,
}

impl CancelToken {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn cancel(&self) {
        self.flag.store(true, Ordering::SeqCst);
    }

    pub fn is_cancelled(&self) -> bool {
        self.flag.load(Ordering::SeqCst)
    }
}

/// Progress feedback for a front-end. All methods default to no-ops.
pub trait ProgressObserver {
    fn begin(&self, _total_groups: usize) {}
    fn group_started(&self, _key: &GroupKey) {}
    fn group_finished(&self, _key: &GroupKey) {}
}

struct NoOpObserver;
impl ProgressObserver for NoOpObserver {}

/// Run the full library update.
pub fn run(config: &RunConfig, cancel: &CancelToken) -> Result<RunSummary> {
    run_observed(config, cancel, &NoOpObserver)
}

/// Run the full library update with progress feedback.
///
/// Groups are processed strictly sequentially, in lexicographic key order;
/// the stacking engine owns all intra-group parallelism. Per-frame and
/// per-group problems are recorded and recovered; only missing roots, an
/// unwritable library or a missing engine abort the run.
pub fn run_observed(
    config: &RunConfig,
    cancel: &CancelToken,
    observer: &dyn ProgressObserver,
) -> Result<RunSummary> {
    fs::create_dir_all(&config.library_root)
        .map_err(|_| UmbraError::LibraryNotWritable(config.library_root.clone()))?;
    if !config.dry_run {
        config.engine.preflight()?;
    }

    let scanned = scan_roots(&config.input_roots, config.max_age_days)?;
    let mut reporter = Reporter::new();
    reporter.set_scan_counts(scanned.frames.len(), scanned.skipped.len());

    let groups = group_frames(scanned.frames, config.temperature_precision);
    info!(
        groups = groups.len(),
        frames = groups.iter().map(Group::len).sum::<usize>(),
        "scan complete"
    );
    observer.begin(groups.len());

    let staging = StagingArea::create(config.effective_staging_dir())?;
    let runner = StackRunner::new(config.engine.clone(), config.stacking, config.dry_run);
    let signature = runner.signature();

    for group in &groups {
        if cancel.is_cancelled() {
            reporter.record(GroupReport {
                key: group.key.clone(),
                n_total: group.len(),
                outcome: GroupOutcome::Skipped(SkipReason::Cancelled),
                rejected: Vec::new(),
            });
            continue;
        }
        observer.group_started(&group.key);
        let report = process_group(config, &staging, &runner, &signature, group);
        reporter.record(report);
        observer.group_finished(&group.key);
    }

    if cancel.is_cancelled() {
        warn!("run cancelled, remaining groups skipped");
        reporter.set_cancelled();
    }
    Ok(reporter.finish())
}

fn process_group(
    config: &RunConfig,
    staging: &StagingArea,
    runner: &StackRunner,
    signature: &str,
    group: &Group,
) -> GroupReport {
    let key = &group.key;
    let master = find_master(&config.library_root, key);

    let decision = decide(
        group,
        master.as_ref(),
        signature,
        config.min_darks_threshold,
        config.force,
    );
    let reason = match decision {
        Decision::Skip(skip) => {
            info!(key = %key, %skip, "group skipped");
            return GroupReport {
                key: key.clone(),
                n_total: group.len(),
                outcome: GroupOutcome::Skipped(skip),
                rejected: Vec::new(),
            };
        }
        Decision::Build(reason) => reason,
    };
    info!(key = %key, %reason, frames = group.len(), "rebuilding master");

    // Pixel data is only ever read after the build decision; statistics
    // dominate cost and a skipped group must stay cheap.
    let (accepted, rejected) = validate_group(group, &config.limits);
    if accepted.len() < MIN_STACKABLE_FRAMES {
        warn!(key = %key, accepted = accepted.len(), "not enough valid frames to stack");
        return GroupReport {
            key: key.clone(),
            n_total: group.len(),
            outcome: GroupOutcome::Skipped(SkipReason::InsufficientValidFrames),
            rejected,
        };
    }

    let fail = |err: UmbraError, rejected: Vec<_>| GroupReport {
        key: key.clone(),
        n_total: group.len(),
        outcome: GroupOutcome::Failed(err.to_string()),
        rejected,
    };

    if let Err(err) = staging.stage(&accepted) {
        warn!(key = %key, error = %err, "staging failed");
        return fail(err, rejected);
    }

    let outcome = match runner.run(staging.path()) {
        Ok(outcome) => outcome,
        Err(err) => {
            warn!(key = %key, error = %err, "stacking failed, prior master untouched");
            return fail(err, rejected);
        }
    };

    let final_path = config.library_root.join(key.master_filename());
    let built = match outcome.output {
        Some(intermediate) => {
            match write_master(
                &intermediate,
                &final_path,
                key,
                &accepted,
                &config.stacking,
                &outcome.command,
            ) {
                Ok(master) => GroupOutcome::Built {
                    master: master.path,
                    n_used: accepted.len(),
                    reason,
                    command: outcome.command,
                    dry_run: false,
                },
                Err(err) => {
                    warn!(key = %key, error = %err, "header write failed");
                    return fail(err, rejected);
                }
            }
        }
        None => GroupOutcome::Built {
            master: final_path,
            n_used: accepted.len(),
            reason,
            command: outcome.command,
            dry_run: true,
        },
    };

    GroupReport {
        key: key.clone(),
        n_total: group.len(),
        outcome: built,
        rejected,
    }
}
