//! The reconciliation engine
//!
//! A [`Syncer`] run compares the follower ids in the store with the ones the
//! remote directory lists right now, inserts the newcomers, optionally
//! refreshes everyone still following, and moves the ones that left into
//! the unfollower history.

mod report;

use std::collections::HashSet;
use std::sync::Arc;

use flock_core::{
    FollowerId, ReconciliationResult, RemoteAccount, RichRecord, RichWalk, Sighting, SkipReason,
    Timestamp, reconcile,
};
use flock_db::{Database, DbError};
use flock_remote::{FetchError, Fetcher, RequestEstimate};
use futures::StreamExt as _;
use snafu::{ResultExt as _, Snafu};
use tracing::{debug, info, instrument, warn};

use self::report::RunLedger;
pub use self::report::{RECENT_UNFOLLOWERS, ReconciliationSizes, RunReport, Strategy};

const LOG_TARGET: &str = "flock::sync";

pub const DEFAULT_BATCH_SIZE: usize = 100;

/// Asked before a rich walk that needs more than one quota window; `false`
/// aborts the run
pub type VolumeGuard = Box<dyn Fn(&RequestEstimate) -> bool + Send + Sync>;

#[derive(Debug, Snafu)]
#[snafu(visibility(pub(crate)))]
pub enum SyncError {
    #[snafu(display("Store tracks account {db_account}, not {account}"))]
    AccountMismatch {
        db_account: FollowerId,
        account: FollowerId,
    },
    #[snafu(display("Batch size must be positive"))]
    InvalidBatchSize,
    #[snafu(display("Store operation failed: {op}"))]
    Db {
        op: &'static str,
        source: DbError,
    },
    #[snafu(transparent)]
    Fetch { source: FetchError },
    #[snafu(display(
        "Declined a walk of {} pages spanning {} request windows",
        estimate.rich_pages,
        estimate.windows
    ))]
    Declined { estimate: RequestEstimate },
}

pub type SyncResult<T> = std::result::Result<T, SyncError>;

/// Reconciliation engine for one tracked account
pub struct Syncer {
    db: Arc<Database>,
    fetcher: Fetcher,
    account: RemoteAccount,
    batch_size: usize,
    volume_guard: Option<VolumeGuard>,
}

#[bon::bon]
impl Syncer {
    #[builder(finish_fn(name = "build"))]
    pub fn new(
        db: Arc<Database>,
        fetcher: Fetcher,
        account: RemoteAccount,
        #[builder(default = DEFAULT_BATCH_SIZE)] batch_size: usize,
        volume_guard: Option<VolumeGuard>,
    ) -> SyncResult<Self> {
        if db.account_id() != account.id {
            return AccountMismatchSnafu {
                db_account: db.account_id(),
                account: account.id,
            }
            .fail();
        }
        if batch_size == 0 {
            return InvalidBatchSizeSnafu.fail();
        }

        Ok(Self {
            db,
            fetcher,
            account,
            batch_size,
            volume_guard,
        })
    }

    /// Run one reconciliation
    ///
    /// Each store batch commits on its own, so an aborted run keeps the
    /// progress it made; running again picks up from there.
    #[instrument(skip_all, fields(account = %self.account.id, %strategy))]
    pub async fn run(&self, strategy: Strategy) -> SyncResult<RunReport> {
        let started_at = Timestamp::now();
        let account_id = self.account.id;

        let local = self
            .db
            .follower_ids()
            .await
            .context(DbSnafu {
                op: "read local snapshot",
            })?;

        let bootstrapped = strategy == Strategy::Cheap && local.is_empty();
        let strategy = if bootstrapped {
            info!(target: LOG_TARGET, %account_id, "Empty store, running full sync instead of cheap");
            Strategy::Full
        } else {
            strategy
        };

        let remote = self.fetcher.fetch_identifier_set(account_id).await?;
        info!(
            target: LOG_TARGET,
            %account_id,
            %strategy,
            local = local.len(),
            remote = remote.len(),
            "Starting reconciliation"
        );

        let local_count = local.len();
        let remote_count = remote.len();
        let mut ledger = RunLedger::new();

        let (result, estimate) = match strategy {
            Strategy::Cheap => (self.run_cheap(&local, &remote, &mut ledger).await?, None),
            Strategy::Full => {
                let estimate = self.check_volume(&remote)?;
                (
                    self.run_full(local, &remote, &mut ledger).await?,
                    Some(estimate),
                )
            }
        };

        self.archive_gone(&result, &mut ledger).await?;

        let report = RunReport {
            account: self.account.clone(),
            strategy,
            bootstrapped,
            started_at,
            finished_at: Timestamp::now(),
            local_count,
            remote_count,
            counters: ledger.counters,
            reconciliation: (&result).into(),
            skipped: ledger.skipped,
            recent_unfollowers: ledger.recent_unfollowers,
            estimate,
        };

        info!(
            target: LOG_TARGET,
            %account_id,
            inserted = report.counters.inserted,
            updated = report.counters.updated,
            removed = report.counters.removed,
            skipped = report.skipped.len(),
            "Reconciliation complete"
        );
        Ok(report)
    }

    fn check_volume(&self, remote: &HashSet<FollowerId>) -> SyncResult<RequestEstimate> {
        let estimate = RequestEstimate::for_identifiers(remote.len());
        if !estimate.exceeds_window() {
            return Ok(estimate);
        }

        warn!(
            target: LOG_TARGET,
            rich_pages = estimate.rich_pages,
            windows = estimate.windows,
            wait_secs = estimate.wait.as_secs(),
            "Full walk will exceed the request window"
        );
        if let Some(guard) = &self.volume_guard {
            if !guard(&estimate) {
                return DeclinedSnafu { estimate }.fail();
            }
        }
        Ok(estimate)
    }

    /// Look up and insert only the ids the store does not know yet
    async fn run_cheap(
        &self,
        local: &HashSet<FollowerId>,
        remote: &HashSet<FollowerId>,
        ledger: &mut RunLedger,
    ) -> SyncResult<ReconciliationResult> {
        let result = reconcile(local, remote);

        let mut new_ids: Vec<_> = result.new_ids.iter().copied().collect();
        new_ids.sort_unstable();

        for chunk in new_ids.chunks(self.batch_size) {
            let mut records = Vec::with_capacity(chunk.len());
            for &id in chunk {
                match self.fetcher.lookup(id).await? {
                    Some(record) => records.push(record),
                    None => ledger.skip(id, SkipReason::NotFound),
                }
            }
            self.apply(records, vec![], ledger).await?;
        }

        Ok(result)
    }

    /// Walk the whole rich listing, then resolve the spares
    async fn run_full(
        &self,
        local: HashSet<FollowerId>,
        remote: &HashSet<FollowerId>,
        ledger: &mut RunLedger,
    ) -> SyncResult<ReconciliationResult> {
        let mut walk = RichWalk::new(local, remote);

        {
            let mut pages = self.fetcher.fetch_rich_pages(self.account.id);
            while let Some(page) = pages.next().await {
                let mut inserts = vec![];
                let mut updates = vec![];

                for record in page? {
                    match walk.observe(record.id) {
                        Sighting::New => inserts.push(record),
                        Sighting::Existing => updates.push(record),
                        Sighting::Repeat => {
                            debug!(target: LOG_TARGET, follower_id = %record.id, "Follower listed twice, ignoring");
                        }
                    }
                }
                self.apply(inserts, updates, ledger).await?;
            }
        }

        let spares = walk.take_spares();
        if !spares.is_empty() {
            info!(target: LOG_TARGET, count = spares.len(), "Resolving spares missing from the rich listing");
        }
        for chunk in spares.chunks(self.batch_size) {
            let mut inserts = vec![];
            let mut updates = vec![];

            for &id in chunk {
                let Some(record) = self.fetcher.lookup(id).await? else {
                    if !walk.local().contains(&id) {
                        ledger.skip(id, SkipReason::NotFound);
                    }
                    continue;
                };
                match walk.resolve_spare(id) {
                    Some(Sighting::New) => {
                        debug!(target: LOG_TARGET, follower_id = %id, handle = %record.handle, "Inserting spare");
                        inserts.push(record);
                    }
                    Some(Sighting::Existing) => {
                        debug!(target: LOG_TARGET, follower_id = %id, handle = %record.handle, "Updating spare");
                        updates.push(record);
                    }
                    Some(Sighting::Repeat) | None => {}
                }
            }
            self.apply(inserts, updates, ledger).await?;
        }

        Ok(walk.finish())
    }

    async fn apply(
        &self,
        inserts: Vec<RichRecord>,
        updates: Vec<RichRecord>,
        ledger: &mut RunLedger,
    ) -> SyncResult<()> {
        let now = Timestamp::now();
        if !updates.is_empty() {
            let outcome = self
                .db
                .update_followers(&updates, now)
                .await
                .context(DbSnafu {
                    op: "update followers",
                })?;
            ledger.absorb_batch(outcome);
        }
        if !inserts.is_empty() {
            let outcome = self
                .db
                .insert_followers(&inserts, now)
                .await
                .context(DbSnafu {
                    op: "insert followers",
                })?;
            ledger.absorb_batch(outcome);
        }
        Ok(())
    }

    async fn archive_gone(
        &self,
        result: &ReconciliationResult,
        ledger: &mut RunLedger,
    ) -> SyncResult<()> {
        let mut gone: Vec<_> = result.gone_ids.iter().copied().collect();
        gone.sort_unstable();

        for chunk in gone.chunks(self.batch_size) {
            let outcome = self
                .db
                .remove_and_archive(chunk, Timestamp::now())
                .await
                .context(DbSnafu {
                    op: "archive unfollowers",
                })?;
            ledger.absorb_archive(outcome);
        }
        Ok(())
    }
}
