use crate::{FollowerId, Timestamp};

/// A follower as reported by the remote directory
///
/// `raw_payload` is the untouched JSON text of the remote object, stored
/// as-is so nothing the remote source knows about an account gets lost.
#[cfg_attr(feature = "serde", derive(::serde::Serialize))]
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RichRecord {
    pub id: FollowerId,
    pub display_name: String,
    pub handle: String,
    #[cfg_attr(feature = "serde", serde(skip))]
    pub raw_payload: String,
}

/// Live row of the `followers` table (keyed by [`FollowerId`])
#[cfg_attr(feature = "bincode", derive(::bincode::Encode, ::bincode::Decode))]
#[cfg_attr(feature = "serde", derive(::serde::Serialize))]
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FollowerRecord {
    pub display_name: String,
    pub handle: String,
    pub first_seen: Timestamp,
    pub last_updated: Timestamp,
    #[cfg_attr(feature = "serde", serde(skip))]
    pub raw_payload: String,
}

impl FollowerRecord {
    pub fn new(rich: &RichRecord, now: Timestamp) -> Self {
        Self {
            display_name: rich.display_name.clone(),
            handle: rich.handle.clone(),
            first_seen: now,
            last_updated: now,
            raw_payload: rich.raw_payload.clone(),
        }
    }

    /// Refresh everything the remote source may have changed
    ///
    /// `first_seen` is the one field that survives updates.
    pub fn refresh(&mut self, rich: &RichRecord, now: Timestamp) {
        self.display_name.clone_from(&rich.display_name);
        self.handle.clone_from(&rich.handle);
        self.raw_payload.clone_from(&rich.raw_payload);
        self.last_updated = now;
    }
}

/// Append-only row of the `unfollowers` table
#[cfg_attr(feature = "bincode", derive(::bincode::Encode, ::bincode::Decode))]
#[cfg_attr(feature = "serde", derive(::serde::Serialize))]
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct UnfollowerRecord {
    pub seq: u64,
    pub id: FollowerId,
    pub handle: String,
    pub display_name: String,
    pub first_seen: Timestamp,
    pub lost_at: Timestamp,
}

impl UnfollowerRecord {
    pub fn archive(seq: u64, id: FollowerId, live: &FollowerRecord, lost_at: Timestamp) -> Self {
        Self {
            seq,
            id,
            handle: live.handle.clone(),
            display_name: live.display_name.clone(),
            first_seen: live.first_seen,
            lost_at,
        }
    }
}

/// The tracked account itself
#[cfg_attr(feature = "serde", derive(::serde::Serialize))]
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RemoteAccount {
    pub id: FollowerId,
    pub handle: String,
    pub display_name: String,
    pub followers_count: u64,
    pub friends_count: u64,
}

impl RemoteAccount {
    /// Followers per followed account, `0.0` when following nobody
    pub fn follow_ratio(&self) -> f64 {
        if self.friends_count == 0 {
            return 0.0;
        }
        self.followers_count as f64 / self.friends_count as f64
    }
}
