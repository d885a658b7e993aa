use flock_core::{AccountRef, FollowerId, RemoteAccount, RichRecord};
use snafu::Snafu;

/// Pagination cursor of the remote listings
pub type Cursor = i64;

/// Cursor of the first request of every listing
pub const FIRST_CURSOR: Cursor = -1;

/// `next_cursor` value that marks the last page
pub const END_CURSOR: Cursor = 0;

/// One page of a cursor-driven listing
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Page<T> {
    pub items: Vec<T>,
    pub next_cursor: Cursor,
}

impl<T> Page<T> {
    pub fn last(items: Vec<T>) -> Self {
        Self {
            items,
            next_cursor: END_CURSOR,
        }
    }

    pub fn is_last(&self) -> bool {
        self.next_cursor == END_CURSOR
    }
}

#[derive(Debug, Snafu)]
#[snafu(visibility(pub(crate)))]
pub enum RemoteError {
    #[snafu(display("Invalid directory configuration: {reason}"))]
    Config { reason: String },
    #[snafu(display("Invalid request url"))]
    Url { source: url::ParseError },
    #[snafu(display("Could not build http client"))]
    Client { source: reqwest::Error },
    #[snafu(display("Remote directory rejected credentials (status {status})"))]
    Auth { status: u16 },
    #[snafu(display("Not found: {what}"))]
    NotFound { what: String },
    #[snafu(display("Rate limited"))]
    RateLimited,
    #[snafu(display("Remote directory unavailable (status {status})"))]
    Unavailable { status: u16 },
    #[snafu(display("Unexpected response status {status}"))]
    UnexpectedStatus { status: u16 },
    #[snafu(display("Request failed"))]
    Request { source: reqwest::Error },
    #[snafu(display("Could not decode response body"))]
    Decode { source: serde_json::Error },
}

pub type RemoteResult<T> = std::result::Result<T, RemoteError>;

impl RemoteError {
    /// Worth repeating the exact same request later
    pub fn is_transient(&self) -> bool {
        matches!(
            self,
            RemoteError::RateLimited
                | RemoteError::Unavailable { .. }
                | RemoteError::Request { .. }
                | RemoteError::Decode { .. }
        )
    }

    pub fn is_not_found(&self) -> bool {
        matches!(self, RemoteError::NotFound { .. })
    }

    /// The run can not make progress; abort
    pub fn is_fatal(&self) -> bool {
        !self.is_transient() && !self.is_not_found()
    }
}

/// The social graph service holding the authoritative follower listing
#[async_trait::async_trait]
pub trait RemoteDirectory {
    async fn resolve_account(&self, account: &AccountRef) -> RemoteResult<RemoteAccount>;

    /// Id-only follower listing; cheap, large pages
    async fn list_identifiers_page(
        &self,
        account: FollowerId,
        cursor: Cursor,
    ) -> RemoteResult<Page<FollowerId>>;

    /// Full follower records; expensive, small pages
    async fn list_rich_records_page(
        &self,
        account: FollowerId,
        cursor: Cursor,
    ) -> RemoteResult<Page<RichRecord>>;

    async fn lookup_rich_record(&self, id: FollowerId) -> RemoteResult<RichRecord>;
}
