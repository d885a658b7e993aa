use std::time::Duration;

use flock_core::{AccountRef, FollowerId, RemoteAccount, RichRecord};
use reqwest::{Client, StatusCode};
use serde::Deserialize;
use serde::de::DeserializeOwned;
use snafu::ResultExt as _;
use tracing::{debug, trace};
use url::Url;

use crate::directory::{
    AuthSnafu, ClientSnafu, ConfigSnafu, Cursor, DecodeSnafu, NotFoundSnafu, Page,
    RateLimitedSnafu, RemoteDirectory, RemoteResult, RequestSnafu, UnavailableSnafu,
    UnexpectedStatusSnafu, UrlSnafu,
};
use crate::LOG_TARGET;


pub const DEFAULT_API_URL: &str = "https://api.twitter.com/1.1/";

/// Ids returned per `followers/ids` page
const IDS_PAGE_SIZE: u32 = 5000;

/// Records returned per `followers/list` page
pub const RICH_PAGE_SIZE: u32 = 200;

const REQUEST_TIMEOUT: Duration = Duration::from_secs(60);

/// What a request is about, which decides how a `403` is read
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Scope {
    /// The tracked account or its listings: `403` means no access
    Account,
    /// A single follower: `403` means suspended or otherwise hidden
    Follower,
}

#[derive(Deserialize)]
struct IdsResponse {
    ids: Vec<u64>,
    next_cursor: Cursor,
}

#[derive(Deserialize)]
struct ListResponse {
    users: Vec<serde_json::Value>,
    next_cursor: Cursor,
}

#[derive(Deserialize)]
struct UserJson {
    id: u64,
    name: String,
    screen_name: String,
    #[serde(default)]
    followers_count: u64,
    #[serde(default)]
    friends_count: u64,
}

impl UserJson {
    fn parse(value: serde_json::Value) -> RemoteResult<(Self, String)> {
        let raw_payload = value.to_string();
        let user = serde_json::from_value(value).context(DecodeSnafu)?;
        Ok((user, raw_payload))
    }

    fn into_rich(self, raw_payload: String) -> RichRecord {
        RichRecord {
            id: self.id.into(),
            display_name: self.name,
            handle: self.screen_name,
            raw_payload,
        }
    }
}

/// [`RemoteDirectory`] over the REST API of the social network
pub struct HttpDirectory {
    client: Client,
    base: Url,
    bearer_token: String,
}

#[bon::bon]
impl HttpDirectory {
    #[builder]
    pub fn new(
        base: Option<Url>,
        bearer_token: String,
        #[builder(default = concat!("flock/", env!("CARGO_PKG_VERSION")).to_owned())]
        user_agent: String,
    ) -> RemoteResult<Self> {
        if bearer_token.trim().is_empty() {
            return ConfigSnafu {
                reason: "empty bearer token",
            }
            .fail();
        }
        let mut base = match base {
            Some(base) => base,
            None => Url::parse(DEFAULT_API_URL).context(UrlSnafu)?,
        };
        if base.cannot_be_a_base() {
            return ConfigSnafu {
                reason: format!("{base} can not be used as base url"),
            }
            .fail();
        }
        // Relative joins replace the last segment unless the path is a directory
        if !base.path().ends_with('/') {
            let path = format!("{}/", base.path());
            base.set_path(&path);
        }

        let client = Client::builder()
            .user_agent(user_agent)
            .timeout(REQUEST_TIMEOUT)
            .build()
            .context(ClientSnafu)?;

        Ok(Self {
            client,
            base,
            bearer_token,
        })
    }

    async fn get_json<T: DeserializeOwned>(
        &self,
        path: &str,
        query: &[(&str, String)],
        scope: Scope,
    ) -> RemoteResult<T> {
        let mut url = self.base.join(path).context(UrlSnafu)?;
        url.query_pairs_mut()
            .extend_pairs(query.iter().map(|(k, v)| (k, v.as_str())));

        trace!(target: LOG_TARGET, %url, "Request");
        let resp = self
            .client
            .get(url)
            .bearer_auth(&self.bearer_token)
            .send()
            .await
            .context(RequestSnafu)?;

        let status = resp.status();
        match status {
            StatusCode::FORBIDDEN | StatusCode::NOT_FOUND if scope == Scope::Follower => {
                let body = resp.text().await.unwrap_or_default();
                debug!(target: LOG_TARGET, %status, %body, "Follower not visible");
                return NotFoundSnafu {
                    what: format!("{path} {}", fmt_query(query)),
                }
                .fail();
            }
            StatusCode::UNAUTHORIZED | StatusCode::FORBIDDEN => {
                return AuthSnafu {
                    status: status.as_u16(),
                }
                .fail();
            }
            StatusCode::NOT_FOUND => {
                return NotFoundSnafu {
                    what: format!("{path} {}", fmt_query(query)),
                }
                .fail();
            }
            StatusCode::TOO_MANY_REQUESTS => return RateLimitedSnafu.fail(),
            s if s.is_server_error() => {
                return UnavailableSnafu { status: s.as_u16() }.fail();
            }
            s if !s.is_success() => {
                return UnexpectedStatusSnafu { status: s.as_u16() }.fail();
            }
            _ => {}
        }

        let body = resp.text().await.context(RequestSnafu)?;
        serde_json::from_str(&body).context(DecodeSnafu)
    }

    async fn show_user(
        &self,
        query: (&str, String),
        scope: Scope,
    ) -> RemoteResult<(UserJson, String)> {
        let value: serde_json::Value = self.get_json("users/show.json", &[query], scope).await?;
        UserJson::parse(value)
    }
}

fn fmt_query(query: &[(&str, String)]) -> String {
    query
        .iter()
        .map(|(k, v)| format!("{k}={v}"))
        .collect::<Vec<_>>()
        .join("&")
}

#[async_trait::async_trait]
impl RemoteDirectory for HttpDirectory {
    async fn resolve_account(&self, account: &AccountRef) -> RemoteResult<RemoteAccount> {
        let query = match account {
            AccountRef::Id(id) => ("user_id", id.to_string()),
            AccountRef::Handle(handle) => ("screen_name", handle.clone()),
        };
        let (user, _) = self.show_user(query, Scope::Account).await?;
        Ok(RemoteAccount {
            id: user.id.into(),
            handle: user.screen_name,
            display_name: user.name,
            followers_count: user.followers_count,
            friends_count: user.friends_count,
        })
    }

    async fn list_identifiers_page(
        &self,
        account: FollowerId,
        cursor: Cursor,
    ) -> RemoteResult<Page<FollowerId>> {
        let resp: IdsResponse = self
            .get_json(
                "followers/ids.json",
                &[
                    ("user_id", account.to_string()),
                    ("cursor", cursor.to_string()),
                    ("count", IDS_PAGE_SIZE.to_string()),
                ],
                Scope::Account,
            )
            .await?;

        Ok(Page {
            items: resp.ids.into_iter().map(FollowerId::from).collect(),
            next_cursor: resp.next_cursor,
        })
    }

    async fn list_rich_records_page(
        &self,
        account: FollowerId,
        cursor: Cursor,
    ) -> RemoteResult<Page<RichRecord>> {
        let resp: ListResponse = self
            .get_json(
                "followers/list.json",
                &[
                    ("user_id", account.to_string()),
                    ("cursor", cursor.to_string()),
                    ("count", RICH_PAGE_SIZE.to_string()),
                    ("skip_status", "true".to_owned()),
                    ("include_user_entities", "false".to_owned()),
                ],
                Scope::Account,
            )
            .await?;

        let items = resp
            .users
            .into_iter()
            .map(|value| UserJson::parse(value).map(|(user, raw)| user.into_rich(raw)))
            .collect::<RemoteResult<Vec<_>>>()?;

        Ok(Page {
            items,
            next_cursor: resp.next_cursor,
        })
    }

    async fn lookup_rich_record(&self, id: FollowerId) -> RemoteResult<RichRecord> {
        let (user, raw) = self
            .show_user(("user_id", id.to_string()), Scope::Follower)
            .await?;
        Ok(user.into_rich(raw))
    }
}
