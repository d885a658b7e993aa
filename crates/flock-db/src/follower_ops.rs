use std::collections::HashSet;

use flock_core::{
    FollowerId, FollowerRecord, RichRecord, RunCounters, SkipReason, Skipped, Timestamp,
    UnfollowerRecord,
};
use tracing::{debug, info, warn};

use crate::{Database, DbResult, LOG_TARGET, followers, unfollowers, unfollowers_seq};

/// Result of an insert or update batch
#[derive(Debug, Clone, Default)]
pub struct BatchOutcome {
    /// Counts of rows actually written
    pub counters: RunCounters,
    pub written: Vec<FollowerId>,
    pub skipped: Vec<Skipped>,
}

/// Result of a [`Database::remove_and_archive`] batch
#[derive(Debug, Clone, Default)]
pub struct ArchiveOutcome {
    pub counters: RunCounters,
    pub archived: Vec<UnfollowerRecord>,
}

impl Database {
    /// Local snapshot: every id currently recorded as a follower
    pub async fn follower_ids(&self) -> DbResult<HashSet<FollowerId>> {
        self.read_with(|tx| {
            let followers_table = tx.open_table(&followers::TABLE)?;
            Database::read_follower_ids_tx(&followers_table)
        })
        .await
    }

    pub async fn follower_count(&self) -> DbResult<u64> {
        self.read_with(|tx| {
            let followers_table = tx.open_table(&followers::TABLE)?;
            Database::count_followers_tx(&followers_table)
        })
        .await
    }

    pub async fn get_follower(&self, id: FollowerId) -> DbResult<Option<FollowerRecord>> {
        self.read_with(|tx| {
            let followers_table = tx.open_table(&followers::TABLE)?;
            Database::get_follower_tx(id, &followers_table)
        })
        .await
    }

    /// Whole unfollower history, oldest first
    pub async fn unfollowers(&self) -> DbResult<Vec<UnfollowerRecord>> {
        self.read_with(|tx| {
            let unfollowers_table = tx.open_table(&unfollowers::TABLE)?;
            Database::read_unfollowers_tx(&unfollowers_table)
        })
        .await
    }

    /// Insert new followers in one transaction
    ///
    /// Ids that already have a live row are skipped and logged, the rest of
    /// the batch still goes in.
    pub async fn insert_followers(
        &self,
        records: &[RichRecord],
        now: Timestamp,
    ) -> DbResult<BatchOutcome> {
        self.write_with(|tx| {
            let mut followers_table = tx.open_table(&followers::TABLE)?;
            let mut outcome = BatchOutcome::default();

            for rich in records {
                if Database::insert_follower_tx(rich, now, &mut followers_table)? {
                    debug!(target: LOG_TARGET, follower_id = %rich.id, handle = %rich.handle, "Inserting new follower");
                    outcome.written.push(rich.id);
                } else {
                    warn!(target: LOG_TARGET, follower_id = %rich.id, handle = %rich.handle, "Follower already in database, skipping insert");
                    outcome.skipped.push(Skipped {
                        id: rich.id,
                        reason: SkipReason::AlreadyFollowing,
                    });
                }
            }
            outcome.counters = RunCounters::inserted(outcome.written.len() as u64);

            Ok(outcome)
        })
        .await
    }

    /// Refresh existing followers in one transaction
    ///
    /// `first_seen` is preserved. Ids without a live row are skipped and
    /// logged.
    pub async fn update_followers(
        &self,
        records: &[RichRecord],
        now: Timestamp,
    ) -> DbResult<BatchOutcome> {
        self.write_with(|tx| {
            let mut followers_table = tx.open_table(&followers::TABLE)?;
            let mut outcome = BatchOutcome::default();

            for rich in records {
                if Database::update_follower_tx(rich, now, &mut followers_table)? {
                    outcome.written.push(rich.id);
                } else {
                    warn!(target: LOG_TARGET, follower_id = %rich.id, handle = %rich.handle, "Follower not in database, skipping update");
                    outcome.skipped.push(Skipped {
                        id: rich.id,
                        reason: SkipReason::NotFollowing,
                    });
                }
            }
            outcome.counters = RunCounters::updated(outcome.written.len() as u64);

            Ok(outcome)
        })
        .await
    }

    /// Copy each live follower into the unfollower history, then delete it
    ///
    /// History rows and deletions commit together. Ids without a live row
    /// are a no-op, so the counters can be lower than `ids.len()`.
    pub async fn remove_and_archive(
        &self,
        ids: &[FollowerId],
        lost_at: Timestamp,
    ) -> DbResult<ArchiveOutcome> {
        self.write_with(|tx| {
            let mut followers_table = tx.open_table(&followers::TABLE)?;
            let mut unfollowers_table = tx.open_table(&unfollowers::TABLE)?;
            let mut unfollowers_seq_table = tx.open_table(&unfollowers_seq::TABLE)?;
            let mut outcome = ArchiveOutcome::default();

            for &id in ids {
                match Database::archive_follower_tx(
                    id,
                    lost_at,
                    &mut followers_table,
                    &mut unfollowers_table,
                    &mut unfollowers_seq_table,
                )? {
                    Some(record) => outcome.archived.push(record),
                    None => {
                        debug!(target: LOG_TARGET, follower_id = %id, "Follower already gone, nothing to archive");
                    }
                }
            }
            outcome.counters = RunCounters::archived(outcome.archived.len() as u64);

            let archived = outcome.archived.clone();
            tx.on_commit(move || {
                for record in archived {
                    info!(target: LOG_TARGET, follower_id = %record.id, handle = %record.handle, display_name = %record.display_name, "Unfollower");
                }
            });

            Ok(outcome)
        })
        .await
    }
}
