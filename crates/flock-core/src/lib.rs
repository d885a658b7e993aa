pub mod account;
pub mod counters;
pub mod reconcile;
pub mod record;
pub mod ring;
pub mod skip;

#[cfg(test)]
mod tests;

use std::time::{SystemTime, UNIX_EPOCH};
use std::{fmt, str};

pub use self::account::{AccountRef, AccountRefError};
pub use self::counters::RunCounters;
pub use self::reconcile::{ReconciliationResult, RichWalk, Sighting, reconcile};
pub use self::record::{FollowerRecord, RemoteAccount, RichRecord, UnfollowerRecord};
pub use self::ring::RecentRing;
pub use self::skip::{SkipReason, Skipped};

/// Stable numeric id of an account in the remote directory
///
/// The only thing the engine ever does with it is compare and hash it, so
/// it stays a plain newtype.
#[cfg_attr(feature = "bincode", derive(::bincode::Encode, ::bincode::Decode))]
#[cfg_attr(
    feature = "serde",
    derive(::serde::Serialize, ::serde::Deserialize),
    serde(transparent)
)]
#[derive(Copy, Clone, Hash, PartialEq, Eq, PartialOrd, Ord, Debug)]
pub struct FollowerId(u64);

impl FollowerId {
    pub fn to_u64(self) -> u64 {
        self.0
    }
}

impl From<u64> for FollowerId {
    fn from(value: u64) -> Self {
        Self(value)
    }
}

impl From<FollowerId> for u64 {
    fn from(value: FollowerId) -> Self {
        value.0
    }
}

impl fmt::Display for FollowerId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        self.0.fmt(f)
    }
}

impl str::FromStr for FollowerId {
    type Err = std::num::ParseIntError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Ok(Self(s.parse()?))
    }
}

/// Seconds since the UNIX epoch
#[cfg_attr(feature = "bincode", derive(::bincode::Encode, ::bincode::Decode))]
#[derive(Copy, Clone, Hash, PartialEq, Eq, PartialOrd, Ord, Debug, Default)]
pub struct Timestamp(u64);

impl Timestamp {
    pub fn now() -> Self {
        Self(
            SystemTime::now()
                .duration_since(UNIX_EPOCH)
                .map(|d| d.as_secs())
                .unwrap_or_default(),
        )
    }
}

impl From<u64> for Timestamp {
    fn from(value: u64) -> Self {
        Self(value)
    }
}

impl From<Timestamp> for u64 {
    fn from(value: Timestamp) -> Self {
        value.0
    }
}

impl fmt::Display for Timestamp {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let formatted = i64::try_from(self.0)
            .ok()
            .and_then(|secs| time::OffsetDateTime::from_unix_timestamp(secs).ok())
            .and_then(|dt| {
                dt.format(&time::format_description::well_known::Rfc3339)
                    .ok()
            });

        match formatted {
            Some(s) => f.write_str(&s),
            None => write!(f, "@{}", self.0),
        }
    }
}

#[cfg(feature = "serde")]
impl ::serde::Serialize for Timestamp {
    fn serialize<S>(&self, s: S) -> Result<S::Ok, S::Error>
    where
        S: ::serde::Serializer,
    {
        if s.is_human_readable() {
            s.collect_str(self)
        } else {
            s.serialize_u64(self.0)
        }
    }
}
