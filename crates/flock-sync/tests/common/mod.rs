#![allow(dead_code)]

use std::collections::{BTreeSet, HashSet};
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use flock_core::{AccountRef, FollowerId, RemoteAccount, RichRecord, Timestamp};
use flock_db::Database;
use flock_remote::{
    Cursor, FIRST_CURSOR, Fetcher, Page, RemoteDirectory, RemoteError, RemoteResult, RetryPolicy,
};
use flock_sync::Syncer;
use flock_util_error::BoxedErrorResult;
use tempfile::{TempDir, tempdir};
use tokio::sync::Mutex;

pub const ACCOUNT: u64 = 1_000;

pub fn rich(id: u64) -> RichRecord {
    rich_named(id, &format!("user{id}"))
}

pub fn rich_named(id: u64, handle: &str) -> RichRecord {
    RichRecord {
        id: id.into(),
        display_name: format!("User {id}"),
        handle: handle.to_owned(),
        raw_payload: format!(r#"{{"id":{id},"screen_name":"{handle}"}}"#),
    }
}

pub fn ids(ids: &[u64]) -> HashSet<FollowerId> {
    ids.iter().copied().map(FollowerId::from).collect()
}

/// Mutable state of the mock directory
#[derive(Default)]
pub struct MockState {
    /// Current followers, as listed by the id-only listing
    pub followers: BTreeSet<u64>,
    /// Followers the rich listing leaves out (eventual consistency)
    pub hidden_from_rich: BTreeSet<u64>,
    /// Ids listed twice in the rich listing
    pub repeated_in_rich: BTreeSet<u64>,
    /// Ids a lookup reports as not found
    pub unknown: BTreeSet<u64>,
    /// Handle overrides, to observe updates
    pub renamed: Vec<(u64, String)>,
    /// Transient failures still to inject into listing requests
    pub transient_failures: usize,
    /// Listing requests fail with an auth error
    pub revoked: bool,
    /// Items per listing page
    pub page_size: usize,
    pub listing_calls: usize,
    pub lookup_calls: usize,
}

/// In-memory [`RemoteDirectory`] with scriptable misbehavior
pub struct MockDirectory {
    pub state: Mutex<MockState>,
}

impl MockDirectory {
    pub fn new(followers: &[u64]) -> Arc<Self> {
        Arc::new(Self {
            state: Mutex::new(MockState {
                followers: followers.iter().copied().collect(),
                page_size: 2,
                ..Default::default()
            }),
        })
    }

    pub async fn set_followers(&self, followers: &[u64]) {
        self.state.lock().await.followers = followers.iter().copied().collect();
    }

    async fn begin_listing(&self) -> RemoteResult<MockSnapshot> {
        let mut state = self.state.lock().await;
        state.listing_calls += 1;
        if state.revoked {
            return Err(RemoteError::Auth { status: 401 });
        }
        if 0 < state.transient_failures {
            state.transient_failures -= 1;
            return Err(RemoteError::Unavailable { status: 503 });
        }
        Ok(MockSnapshot {
            page_size: state.page_size,
            followers: state.followers.iter().copied().collect(),
            hidden_from_rich: state.hidden_from_rich.clone(),
            repeated_in_rich: state.repeated_in_rich.clone(),
            renamed: state.renamed.clone(),
        })
    }
}

struct MockSnapshot {
    page_size: usize,
    followers: Vec<u64>,
    hidden_from_rich: BTreeSet<u64>,
    repeated_in_rich: BTreeSet<u64>,
    renamed: Vec<(u64, String)>,
}

impl MockSnapshot {
    /// Cursors are offsets into the listing
    fn paginate<T: Clone>(&self, items: &[T], cursor: Cursor) -> Page<T> {
        let start = if cursor == FIRST_CURSOR {
            0
        } else {
            cursor as usize
        };
        let end = (start + self.page_size).min(items.len());
        let next_cursor = if end < items.len() { end as Cursor } else { 0 };
        Page {
            items: items.get(start..end).unwrap_or_default().to_vec(),
            next_cursor,
        }
    }

    fn record(&self, id: u64) -> RichRecord {
        match self.renamed.iter().find(|(renamed, _)| *renamed == id) {
            Some((_, handle)) => rich_named(id, handle),
            None => rich(id),
        }
    }
}

#[async_trait]
impl RemoteDirectory for MockDirectory {
    async fn resolve_account(&self, account: &AccountRef) -> RemoteResult<RemoteAccount> {
        let state = self.state.lock().await;
        if state.revoked {
            return Err(RemoteError::Auth { status: 401 });
        }
        Ok(RemoteAccount {
            id: ACCOUNT.into(),
            handle: match account {
                AccountRef::Handle(handle) => handle.clone(),
                AccountRef::Id(_) => "tracked".into(),
            },
            display_name: "Tracked".into(),
            followers_count: state.followers.len() as u64,
            friends_count: 1,
        })
    }

    async fn list_identifiers_page(
        &self,
        _account: FollowerId,
        cursor: Cursor,
    ) -> RemoteResult<Page<FollowerId>> {
        let snapshot = self.begin_listing().await?;
        let ids: Vec<FollowerId> = snapshot
            .followers
            .iter()
            .copied()
            .map(FollowerId::from)
            .collect();
        Ok(snapshot.paginate(&ids, cursor))
    }

    async fn list_rich_records_page(
        &self,
        _account: FollowerId,
        cursor: Cursor,
    ) -> RemoteResult<Page<RichRecord>> {
        let snapshot = self.begin_listing().await?;
        let mut records = vec![];
        for &id in &snapshot.followers {
            if snapshot.hidden_from_rich.contains(&id) {
                continue;
            }
            records.push(snapshot.record(id));
            if snapshot.repeated_in_rich.contains(&id) {
                records.push(snapshot.record(id));
            }
        }
        Ok(snapshot.paginate(&records, cursor))
    }

    async fn lookup_rich_record(&self, id: FollowerId) -> RemoteResult<RichRecord> {
        let mut state = self.state.lock().await;
        state.lookup_calls += 1;
        if state.unknown.contains(&id.to_u64()) {
            return Err(RemoteError::NotFound {
                what: id.to_string(),
            });
        }
        let snapshot = MockSnapshot {
            page_size: state.page_size,
            followers: vec![],
            hidden_from_rich: BTreeSet::new(),
            repeated_in_rich: BTreeSet::new(),
            renamed: state.renamed.clone(),
        };
        Ok(snapshot.record(id.to_u64()))
    }
}

pub fn fast_retry(max_retries: Option<usize>) -> RetryPolicy {
    RetryPolicy {
        max_retries,
        min_delay: Duration::from_millis(1),
        max_delay: Duration::from_millis(5),
    }
}

pub struct Harness {
    _dir: TempDir,
    pub db: Arc<Database>,
    pub directory: Arc<MockDirectory>,
    pub fetcher: Fetcher,
}

impl Harness {
    pub async fn new(remote_followers: &[u64]) -> BoxedErrorResult<Self> {
        Self::with_retry(remote_followers, fast_retry(None)).await
    }

    pub async fn with_retry(
        remote_followers: &[u64],
        retry: RetryPolicy,
    ) -> BoxedErrorResult<Self> {
        let dir = tempdir()?;
        let path = Database::mk_db_path(dir.path(), ACCOUNT.into()).await?;
        let db = Arc::new(Database::open(path, ACCOUNT.into()).await?);
        let directory = MockDirectory::new(remote_followers);
        let fetcher = Fetcher::new(directory.clone(), retry);

        Ok(Self {
            _dir: dir,
            db,
            directory,
            fetcher,
        })
    }

    /// Store pre-populated with `local` followers, first seen at `t=1`
    pub async fn with_local(self, local: &[u64]) -> BoxedErrorResult<Self> {
        let records: Vec<_> = local.iter().copied().map(rich).collect();
        self.db.insert_followers(&records, Timestamp::from(1)).await?;
        Ok(self)
    }

    pub async fn syncer(&self) -> BoxedErrorResult<Syncer> {
        let account = self
            .fetcher
            .resolve_account(&AccountRef::Id(ACCOUNT.into()))
            .await?;
        Ok(Syncer::builder()
            .db(self.db.clone())
            .fetcher(self.fetcher.clone())
            .account(account)
            .batch_size(2)
            .build()?)
    }
}
