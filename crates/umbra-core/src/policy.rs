use crate::group::Group;
use crate::master::MasterInfo;

/// Why a group is being rebuilt.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum BuildReason {
    Forced,
    NoMaster,
    SignatureChanged,
    MoreFrames,
}

impl std::fmt::Display for BuildReason {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            BuildReason::Forced => write!(f, "forced"),
            BuildReason::NoMaster => write!(f, "no-master"),
            BuildReason::SignatureChanged => write!(f, "signature-differs"),
            BuildReason::MoreFrames => write!(f, "more-frames"),
        }
    }
}

/// Why a group is being left alone.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum SkipReason {
    DateNotNewer,
    DateNewerButInsufficientFrames,
    /// Fewer than two frames survived validation; the engine refuses to
    /// stack a single frame.
    InsufficientValidFrames,
    /// Remaining groups after a cancellation request.
    Cancelled,
}

impl std::fmt::Display for SkipReason {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            SkipReason::DateNotNewer => write!(f, "date-not-newer"),
            SkipReason::DateNewerButInsufficientFrames => {
                write!(f, "date-newer-but-insufficient-frames")
            }
            SkipReason::InsufficientValidFrames => write!(f, "insufficient-valid-frames"),
            SkipReason::Cancelled => write!(f, "cancelled"),
        }
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Decision {
    Build(BuildReason),
    Skip(SkipReason),
}

/// Decide whether a group's master should be rebuilt.
///
/// Rules, first match wins:
/// 1. forced runs always build;
/// 2. a key with no master builds;
/// 3. a master stacked with different parameters builds (the old master is
///    no longer comparable);
/// 4. no frame newer than the master skips;
/// 5. enough frames (>= threshold, or strictly more than the master used)
///    builds;
/// 6. otherwise skip.
pub fn decide(
    group: &Group,
    master: Option<&MasterInfo>,
    current_signature: &str,
    min_darks_threshold: usize,
    force: bool,
) -> Decision {
    if force {
        return Decision::Build(BuildReason::Forced);
    }
    let Some(master) = master else {
        return Decision::Build(BuildReason::NoMaster);
    };
    if master.stack_signature.as_deref() != Some(current_signature) {
        return Decision::Build(BuildReason::SignatureChanged);
    }
    if let Some(created_at) = master.created_at {
        if group.latest_acquired() <= created_at {
            return Decision::Skip(SkipReason::DateNotNewer);
        }
    }
    if (min_darks_threshold > 0 && group.len() >= min_darks_threshold)
        || group.len() > master.n_frames_used
    {
        return Decision::Build(BuildReason::MoreFrames);
    }
    Decision::Skip(SkipReason::DateNewerButInsufficientFrames)
}
