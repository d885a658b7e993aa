use std::collections::HashSet;

use flock_core::{FollowerId, FollowerRecord, RichRecord, Timestamp, UnfollowerRecord};
use itertools::Itertools as _;
use redb_bincode::ReadableTable as _;
use snafu::OptionExt as _;

use crate::{
    AccountMismatchSnafu, AccountSelfRecord, Database, DbResult, OverflowSnafu,
    account_self, followers, unfollowers, unfollowers_seq,
};

impl Database {
    pub(crate) fn read_account_tx(
        account_self_table: &impl account_self::ReadableTable,
    ) -> DbResult<Option<AccountSelfRecord>> {
        Ok(account_self_table.get(&())?.map(|v| v.value()))
    }

    pub(crate) fn verify_account_tx(
        account_id: FollowerId,
        account_self_table: &mut account_self::Table,
    ) -> DbResult<()> {
        if let Some(existing) = Self::read_account_tx(account_self_table)? {
            if existing.account_id != account_id {
                return AccountMismatchSnafu {
                    db_account: existing.account_id,
                    account: account_id,
                }
                .fail();
            }
        } else {
            account_self_table.insert(&(), &AccountSelfRecord { account_id })?;
        }
        Ok(())
    }

    pub fn read_follower_ids_tx(
        followers_table: &impl followers::ReadableTable,
    ) -> DbResult<HashSet<FollowerId>> {
        Ok(followers_table
            .range(..)?
            .map_ok(|(k, _)| k.value())
            .collect::<Result<HashSet<_>, _>>()?)
    }

    pub fn get_follower_tx(
        id: FollowerId,
        followers_table: &impl followers::ReadableTable,
    ) -> DbResult<Option<FollowerRecord>> {
        Ok(followers_table.get(&id)?.map(|g| g.value()))
    }

    /// Insert a new follower row
    ///
    /// Returns `false` and leaves the existing row alone if the id is
    /// already a live follower.
    pub fn insert_follower_tx(
        rich: &RichRecord,
        now: Timestamp,
        followers_table: &mut followers::Table,
    ) -> DbResult<bool> {
        if followers_table.get(&rich.id)?.is_some() {
            return Ok(false);
        }
        followers_table.insert(&rich.id, &FollowerRecord::new(rich, now))?;
        Ok(true)
    }

    /// Refresh an existing follower row
    ///
    /// Returns `false` if there is no live row for the id.
    pub fn update_follower_tx(
        rich: &RichRecord,
        now: Timestamp,
        followers_table: &mut followers::Table,
    ) -> DbResult<bool> {
        let Some(mut record) = followers_table.get(&rich.id)?.map(|g| g.value()) else {
            return Ok(false);
        };
        record.refresh(rich, now);
        followers_table.insert(&rich.id, &record)?;
        Ok(true)
    }

    /// Move a live follower row into the unfollower history
    ///
    /// The history row is written before the live row is removed. Returns
    /// `None` if there was no live row, in which case nothing is written.
    pub fn archive_follower_tx(
        id: FollowerId,
        lost_at: Timestamp,
        followers_table: &mut followers::Table,
        unfollowers_table: &mut unfollowers::Table,
        unfollowers_seq_table: &mut unfollowers_seq::Table,
    ) -> DbResult<Option<UnfollowerRecord>> {
        let Some(live) = followers_table.get(&id)?.map(|g| g.value()) else {
            return Ok(None);
        };

        let seq = Self::next_unfollower_seq_tx(unfollowers_seq_table)?;
        let record = UnfollowerRecord::archive(seq, id, &live, lost_at);
        unfollowers_table.insert(&seq, &record)?;
        followers_table.remove(&id)?;

        Ok(Some(record))
    }

    /// Sequence numbers start at 1 and are never reused
    fn next_unfollower_seq_tx(
        unfollowers_seq_table: &mut unfollowers_seq::Table,
    ) -> DbResult<u64> {
        let seq = unfollowers_seq_table
            .get(&())?
            .map(|g| g.value())
            .unwrap_or(1);
        let next = seq.checked_add(1).context(OverflowSnafu)?;
        unfollowers_seq_table.insert(&(), &next)?;
        Ok(seq)
    }

    pub fn read_unfollowers_tx(
        unfollowers_table: &impl unfollowers::ReadableTable,
    ) -> DbResult<Vec<UnfollowerRecord>> {
        let mut history = unfollowers_table
            .range(..)?
            .map_ok(|(_, v)| v.value())
            .collect::<Result<Vec<_>, _>>()?;
        history.sort_unstable_by_key(|record| record.seq);
        Ok(history)
    }

    pub fn count_followers_tx(followers_table: &impl followers::ReadableTable) -> DbResult<u64> {
        let mut count = 0u64;
        for res in followers_table.range(..)? {
            res?;
            count += 1;
        }
        Ok(count)
    }
}

