use std::fmt;

use flock_core::{
    FollowerId, RecentRing, ReconciliationResult, RemoteAccount, RunCounters, SkipReason, Skipped,
    Timestamp, UnfollowerRecord,
};
use flock_db::{ArchiveOutcome, BatchOutcome};
use flock_remote::RequestEstimate;
use serde::Serialize;

/// How many of the latest unfollowers a report carries
pub const RECENT_UNFOLLOWERS: usize = 10;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum Strategy {
    /// Diff id sets, look up only the new ones
    Cheap,
    /// Walk every rich record, refreshing known followers too
    Full,
}

impl fmt::Display for Strategy {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Strategy::Cheap => "cheap",
            Strategy::Full => "full",
        })
    }
}

/// Sizes of the reconciliation sets
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct ReconciliationSizes {
    pub new: usize,
    pub gone: usize,
    pub spare: usize,
}

impl From<&ReconciliationResult> for ReconciliationSizes {
    fn from(result: &ReconciliationResult) -> Self {
        Self {
            new: result.new_ids.len(),
            gone: result.gone_ids.len(),
            spare: result.spare_ids.len(),
        }
    }
}

/// Everything a finished run did
#[derive(Debug, Clone, Serialize)]
pub struct RunReport {
    pub account: RemoteAccount,
    pub strategy: Strategy,
    /// The store was empty, so a cheap run was promoted to a full one
    pub bootstrapped: bool,
    pub started_at: Timestamp,
    pub finished_at: Timestamp,
    pub local_count: usize,
    pub remote_count: usize,
    pub counters: RunCounters,
    pub reconciliation: ReconciliationSizes,
    pub skipped: Vec<Skipped>,
    pub recent_unfollowers: RecentRing<UnfollowerRecord>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub estimate: Option<RequestEstimate>,
}

/// Run-scoped accumulator, folded from per-batch outcomes
#[derive(Debug)]
pub(crate) struct RunLedger {
    pub(crate) counters: RunCounters,
    pub(crate) skipped: Vec<Skipped>,
    pub(crate) recent_unfollowers: RecentRing<UnfollowerRecord>,
}

impl RunLedger {
    pub(crate) fn new() -> Self {
        Self {
            counters: RunCounters::default(),
            skipped: vec![],
            recent_unfollowers: RecentRing::new(RECENT_UNFOLLOWERS),
        }
    }

    pub(crate) fn skip(&mut self, id: FollowerId, reason: SkipReason) {
        self.skipped.push(Skipped { id, reason });
    }

    pub(crate) fn absorb_batch(&mut self, outcome: BatchOutcome) {
        self.counters += outcome.counters;
        self.skipped.extend(outcome.skipped);
    }

    pub(crate) fn absorb_archive(&mut self, outcome: ArchiveOutcome) {
        self.counters += outcome.counters;
        self.recent_unfollowers.extend(outcome.archived);
    }
}
