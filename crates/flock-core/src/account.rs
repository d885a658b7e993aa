use std::{fmt, str};

use snafu::Snafu;

use crate::FollowerId;

/// Longest accepted handle, including the leading `@`
pub const MAX_HANDLE_LEN: usize = 16;
/// Shortest accepted handle, including the leading `@`
pub const MIN_HANDLE_LEN: usize = 2;

/// The tracked account, as given on the command line
///
/// Either the numeric id, or an `@handle` that still needs to be resolved
/// against the remote directory.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum AccountRef {
    Id(FollowerId),
    Handle(String),
}

#[derive(Debug, Snafu, PartialEq, Eq)]
pub enum AccountRefError {
    #[snafu(display("account must not be empty"))]
    Empty,
    #[snafu(display("account name must start with @"))]
    MissingAt,
    #[snafu(display(
        "account name must be between {MIN_HANDLE_LEN} and {MAX_HANDLE_LEN} characters long, got {len}"
    ))]
    Length { len: usize },
    #[snafu(display("account name characters are alphanumeric or _, got {ch:?}"))]
    InvalidChar { ch: char },
    #[snafu(display("account id {id} is out of range"))]
    InvalidId { id: String },
}

impl str::FromStr for AccountRef {
    type Err = AccountRefError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        if s.is_empty() {
            return EmptySnafu.fail();
        }

        if s.bytes().all(|b| b.is_ascii_digit()) {
            return s
                .parse::<FollowerId>()
                .map(AccountRef::Id)
                .map_err(|_| AccountRefError::InvalidId { id: s.to_owned() });
        }

        let Some(name) = s.strip_prefix('@') else {
            return MissingAtSnafu.fail();
        };

        let len = s.chars().count();
        if !(MIN_HANDLE_LEN..=MAX_HANDLE_LEN).contains(&len) {
            return LengthSnafu { len }.fail();
        }

        if let Some(ch) = name.chars().find(|ch| !(ch.is_alphanumeric() || *ch == '_')) {
            return InvalidCharSnafu { ch }.fail();
        }

        Ok(AccountRef::Handle(name.to_owned()))
    }
}

impl fmt::Display for AccountRef {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            AccountRef::Id(id) => id.fmt(f),
            AccountRef::Handle(handle) => write!(f, "@{handle}"),
        }
    }
}
