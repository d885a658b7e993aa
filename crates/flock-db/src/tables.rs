use bincode::{Decode, Encode};
use flock_core::{FollowerId, FollowerRecord, UnfollowerRecord};

#[macro_export]
macro_rules! def_table {
    ($(#[$outer:meta])*
        $name:ident : $k:ty => $v:ty) => {
        #[allow(unused)]
        $(#[$outer])*
        pub mod $name {
            use super::*;
            pub type Key = $k;
            pub type Value = $v;
            pub type Definition<'a> = redb_bincode::TableDefinition<'a, Key, Value>;
            pub trait ReadableTable: redb_bincode::ReadableTable<Key, Value> {}
            impl<RT> ReadableTable for RT where RT: redb_bincode::ReadableTable<Key, Value> {}
            pub type Table<'a> = redb_bincode::Table<'a, Key, Value>;
            pub const TABLE: Definition = redb_bincode::TableDefinition::new(stringify!($name));
        }
    };
}

def_table! {
    /// Tracks database/schema version
    db_version: () => u64
}

def_table! {
    /// The account whose followers this database tracks
    ///
    /// One database per account; opening it for a different one is an error.
    account_self: () => AccountSelfRecord
}

def_table! {
    /// Live followers
    followers: FollowerId => FollowerRecord
}

def_table! {
    /// Append-only unfollower history, keyed by sequence number
    unfollowers: u64 => UnfollowerRecord
}

def_table! {
    /// Next sequence number to use in [`unfollowers`]
    unfollowers_seq: () => u64
}

#[derive(Debug, Encode, Decode, Clone, Copy, PartialEq, Eq)]
pub struct AccountSelfRecord {
    pub account_id: FollowerId,
}
