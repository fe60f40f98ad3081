use std::path::PathBuf;

use crate::group::GroupKey;
use crate::policy::{BuildReason, SkipReason};
use crate::validate::RejectedFrame;

/// What happened to one group.
#[derive(Clone, Debug)]
pub enum GroupOutcome {
    Built {
        master: PathBuf,
        n_used: usize,
        reason: BuildReason,
        command: String,
        /// Nothing was written; the command is what would have run.
        dry_run: bool,
    },
    Skipped(SkipReason),
    /// Staging, engine or header-write failure; the prior master is intact.
    Failed(String),
}

#[derive(Clone, Debug)]
pub struct GroupReport {
    pub key: GroupKey,
    pub n_total: usize,
    pub outcome: GroupOutcome,
    /// Per-frame validation outcomes, preserved even when the whole group
    /// was subsequently skipped or failed.
    pub rejected: Vec<RejectedFrame>,
}

/// Accumulates per-group outcomes during a run. Performs no frame I/O;
/// everything here was handed over by earlier stages.
#[derive(Debug, Default)]
pub struct Reporter {
    groups: Vec<GroupReport>,
    frames_scanned: usize,
    files_skipped: usize,
    cancelled: bool,
}

impl Reporter {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn set_scan_counts(&mut self, frames_scanned: usize, files_skipped: usize) {
        self.frames_scanned = frames_scanned;
        self.files_skipped = files_skipped;
    }

    pub fn set_cancelled(&mut self) {
        self.cancelled = true;
    }

    pub fn record(&mut self, report: GroupReport) {
        self.groups.push(report);
    }

    pub fn finish(self) -> RunSummary {
        let mut summary = RunSummary {
            frames_scanned: self.frames_scanned,
            files_skipped: self.files_skipped,
            cancelled: self.cancelled,
            ..RunSummary::default()
        };
        for group in &self.groups {
            match &group.outcome {
                GroupOutcome::Built { n_used, .. } => {
                    summary.masters_built += 1;
                    summary.frames_used += n_used;
                }
                GroupOutcome::Skipped(_) => summary.groups_skipped += 1,
                GroupOutcome::Failed(_) => summary.groups_failed += 1,
            }
            summary.frames_rejected += group.rejected.len();
        }
        summary.groups = self.groups;
        summary
    }
}

/// Final run accounting, rendered by the front-end.
#[derive(Debug, Default)]
pub struct RunSummary {
    pub groups: Vec<GroupReport>,
    pub frames_scanned: usize,
    pub files_skipped: usize,
    pub frames_used: usize,
    pub frames_rejected: usize,
    pub masters_built: usize,
    pub groups_skipped: usize,
    pub groups_failed: usize,
    pub cancelled: bool,
}

impl RunSummary {
    /// Fraction of scanned frames that made it into a master.
    pub fn success_rate(&self) -> f64 {
        if self.frames_scanned == 0 {
            0.0
        } else {
            self.frames_used as f64 / self.frames_scanned as f64
        }
    }

    /// True when the run should exit non-zero.
    pub fn any_failure(&self) -> bool {
        self.groups_failed > 0 || self.cancelled
    }

    pub fn updated(&self) -> impl Iterator<Item = &GroupReport> {
        self.groups
            .iter()
            .filter(|g| matches!(g.outcome, GroupOutcome::Built { .. }))
    }

    pub fn with_rejections(&self) -> impl Iterator<Item = &GroupReport> {
        self.groups.iter().filter(|g| !g.rejected.is_empty())
    }
}
