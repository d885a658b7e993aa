use std::fmt;

use crate::FollowerId;

/// Why an identifier ended the run without being inserted, updated or
/// archived
#[cfg_attr(feature = "serde", derive(::serde::Serialize))]
#[cfg_attr(feature = "serde", serde(rename_all = "snake_case"))]
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum SkipReason {
    /// Insert found a live row with the same id
    AlreadyFollowing,
    /// Update found no live row for the id
    NotFollowing,
    /// The remote directory does not know the id (suspended, deleted)
    NotFound,
}

impl fmt::Display for SkipReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            SkipReason::AlreadyFollowing => "already following",
            SkipReason::NotFollowing => "not following",
            SkipReason::NotFound => "not found",
        })
    }
}

#[cfg_attr(feature = "serde", derive(::serde::Serialize))]
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct Skipped {
    pub id: FollowerId,
    pub reason: SkipReason,
}
