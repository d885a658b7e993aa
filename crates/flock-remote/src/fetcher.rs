use std::collections::HashSet;
use std::future::Future;
use std::sync::Arc;
use std::time::Duration;

use backon::{FibonacciBuilder, Retryable as _};
use flock_core::{AccountRef, FollowerId, RemoteAccount, RichRecord};
use flock_util_error::FmtCompact as _;
use futures::StreamExt as _;
use futures::stream::BoxStream;
use snafu::{ResultExt as _, Snafu};
use tracing::{debug, info, warn};

use crate::directory::{Cursor, FIRST_CURSOR, RemoteDirectory, RemoteError, RemoteResult};
use crate::LOG_TARGET;

/// How persistently transient remote failures are retried
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RetryPolicy {
    /// `None` retries forever
    pub max_retries: Option<usize>,
    pub min_delay: Duration,
    pub max_delay: Duration,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            max_retries: None,
            min_delay: Duration::from_secs(1),
            max_delay: Duration::from_secs(15 * 60),
        }
    }
}

impl RetryPolicy {
    pub fn bounded(max_retries: usize) -> Self {
        Self {
            max_retries: Some(max_retries),
            ..Self::default()
        }
    }

    pub fn with_delays(self, min_delay: Duration, max_delay: Duration) -> Self {
        Self {
            min_delay,
            max_delay,
            ..self
        }
    }

    fn backoff(&self) -> FibonacciBuilder {
        let builder = FibonacciBuilder::default()
            .with_jitter()
            .with_min_delay(self.min_delay)
            .with_max_delay(self.max_delay);
        match self.max_retries {
            Some(max) => builder.with_max_times(max),
            None => builder.without_max_times(),
        }
    }
}

#[derive(Debug, Snafu)]
pub enum FetchError {
    #[snafu(display("Failed to resolve account {account}"))]
    Resolve {
        account: AccountRef,
        source: RemoteError,
    },
    #[snafu(display("Failed to list follower ids of {account} at cursor {cursor}"))]
    Identifiers {
        account: FollowerId,
        cursor: Cursor,
        source: RemoteError,
    },
    #[snafu(display("Failed to list followers of {account} at cursor {cursor}"))]
    RichPage {
        account: FollowerId,
        cursor: Cursor,
        source: RemoteError,
    },
    #[snafu(display("Failed to look up follower {id}"))]
    Lookup { id: FollowerId, source: RemoteError },
}

pub type FetchResult<T> = std::result::Result<T, FetchError>;

impl FetchError {
    pub fn remote(&self) -> &RemoteError {
        match self {
            FetchError::Resolve { source, .. }
            | FetchError::Identifiers { source, .. }
            | FetchError::RichPage { source, .. }
            | FetchError::Lookup { source, .. } => source,
        }
    }
}

/// Remote snapshot fetcher
///
/// Drains the paginated listings of a [`RemoteDirectory`], repeating the
/// request for the same cursor on transient failures so that nothing is
/// skipped and nothing is yielded twice.
#[derive(Clone)]
pub struct Fetcher {
    directory: Arc<dyn RemoteDirectory + Send + Sync>,
    retry: RetryPolicy,
}

impl Fetcher {
    pub fn new(directory: Arc<dyn RemoteDirectory + Send + Sync>, retry: RetryPolicy) -> Self {
        Self { directory, retry }
    }

    pub fn retry_policy(&self) -> RetryPolicy {
        self.retry
    }

    async fn with_retry<T, F, Fut>(&self, op: &'static str, f: F) -> RemoteResult<T>
    where
        F: FnMut() -> Fut,
        Fut: Future<Output = RemoteResult<T>>,
    {
        f.retry(self.retry.backoff())
            .when(RemoteError::is_transient)
            .notify(|e, delay| {
                debug!(
                    target: LOG_TARGET,
                    op,
                    err = %e.fmt_compact(),
                    delay_ms = delay.as_millis(),
                    "Transient remote failure, retrying"
                )
            })
            .await
    }

    pub async fn resolve_account(&self, account: &AccountRef) -> FetchResult<RemoteAccount> {
        self.with_retry("resolve_account", || {
            self.directory.resolve_account(account)
        })
        .await
        .context(ResolveSnafu {
            account: account.clone(),
        })
    }

    /// Complete id-only follower set of `account`
    pub async fn fetch_identifier_set(&self, account: FollowerId) -> FetchResult<HashSet<FollowerId>> {
        let mut ids = HashSet::new();
        let mut cursor = FIRST_CURSOR;
        let mut pages = 0usize;

        loop {
            let page = self
                .with_retry("list_identifiers", || {
                    self.directory.list_identifiers_page(account, cursor)
                })
                .await
                .context(IdentifiersSnafu { account, cursor })?;
            pages += 1;

            ids.extend(page.items.iter().copied());

            if page.is_last() {
                break;
            }
            cursor = page.next_cursor;
        }

        info!(target: LOG_TARGET, %account, pages, count = ids.len(), "Fetched follower ids");
        Ok(ids)
    }

    /// Pages of full follower records, lazily, one request per page
    ///
    /// Not seekable; to start over, call again.
    pub fn fetch_rich_pages(
        &self,
        account: FollowerId,
    ) -> BoxStream<'_, FetchResult<Vec<RichRecord>>> {
        async_stream::try_stream! {
            let mut cursor = FIRST_CURSOR;
            loop {
                let page = self
                    .with_retry("list_rich_records", || {
                        self.directory.list_rich_records_page(account, cursor)
                    })
                    .await
                    .context(RichPageSnafu { account, cursor })?;

                debug!(target: LOG_TARGET, %account, cursor, count = page.items.len(), "Fetched followers page");
                let last = page.is_last();
                let next_cursor = page.next_cursor;

                yield page.items;

                if last {
                    break;
                }
                cursor = next_cursor;
            }
        }
        .boxed()
    }

    /// Single-item lookup
    ///
    /// A follower the remote source does not know (anymore) is `None`,
    /// which is not retried.
    pub async fn lookup(&self, id: FollowerId) -> FetchResult<Option<RichRecord>> {
        match self
            .with_retry("lookup", || self.directory.lookup_rich_record(id))
            .await
        {
            Ok(record) => Ok(Some(record)),
            Err(err) if err.is_not_found() => {
                warn!(target: LOG_TARGET, follower_id = %id, err = %err.fmt_compact(), "Follower not found, skipping");
                Ok(None)
            }
            Err(err) => Err(err).context(LookupSnafu { id }),
        }
    }
}
