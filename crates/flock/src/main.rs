mod cli;

use std::io::{self, BufRead as _, Write as _};
use std::path::PathBuf;
use std::sync::Arc;

use clap::Parser;
use cli::{GlobalOpts, Opts, OptsCmd, SyncOpts};
use flock_core::{AccountRef, FollowerId};
use flock_db::{Database, DbError};
use flock_remote::{FetchError, Fetcher, HttpDirectory, RemoteError, RequestEstimate};
use flock_sync::{Strategy, SyncError, Syncer};
use flock_util_error::WhateverResult;
use snafu::{FromString as _, OptionExt as _, ResultExt as _, Snafu, Whatever};
use tracing::level_filters::LevelFilter;
use tracing::{info, warn};
use tracing_subscriber::EnvFilter;

pub const LOG_TARGET: &str = "flock::cli";

#[derive(Debug, Snafu)]
pub enum CliError {
    #[snafu(display("Could not set up remote directory: {source}"))]
    Remote { source: RemoteError },
    #[snafu(display("Could not resolve account: {source}"))]
    Resolve { source: FetchError },
    #[snafu(display("No data dir given and no default one available"))]
    NoDataDir,
    #[snafu(display("Data dir error: {source:?}"))]
    DataDir { source: io::Error },
    #[snafu(display("Could not open database for account {account_id}: {source}"))]
    Database {
        account_id: FollowerId,
        source: DbError,
    },
    #[snafu(display("Sync of account {account_id} failed: {source}"))]
    Sync {
        account_id: FollowerId,
        source: SyncError,
    },
    #[snafu(display("Could not encode output: {source}"))]
    Json { source: serde_json::Error },
    #[snafu(display("Miscellaneous error: {source}"))]
    Whatever { source: Whatever },
}

pub type CliResult<T> = std::result::Result<T, CliError>;

#[snafu::report]
#[tokio::main]
async fn main() -> CliResult<()> {
    init_logging().context(WhateverSnafu)?;

    let opts = Opts::parse();
    let out = handle_cmd(opts).await?;
    println!(
        "{}",
        serde_json::to_string_pretty(&out).context(JsonSnafu)?
    );
    Ok(())
}

async fn handle_cmd(opts: Opts) -> CliResult<serde_json::Value> {
    Ok(match opts.cmd {
        OptsCmd::Sync(ref sync_opts) => {
            let report = sync(&opts.global, sync_opts).await?;
            serde_json::to_value(report).context(JsonSnafu)?
        }
        OptsCmd::History { ref user } => {
            let account_id = match user {
                AccountRef::Id(id) => *id,
                AccountRef::Handle(_) => make_fetcher(&opts.global)?
                    .resolve_account(user)
                    .await
                    .context(ResolveSnafu)?
                    .id,
            };
            let db = open_db(&opts.global, account_id).await?;
            let history = db.unfollowers().await.context(DatabaseSnafu { account_id })?;
            serde_json::to_value(history).context(JsonSnafu)?
        }
    })
}

async fn sync(global: &GlobalOpts, opts: &SyncOpts) -> CliResult<flock_sync::RunReport> {
    let fetcher = make_fetcher(global)?;
    let account = fetcher
        .resolve_account(&opts.user)
        .await
        .context(ResolveSnafu)?;
    let account_id = account.id;
    info!(
        target: LOG_TARGET,
        %account_id,
        handle = %account.handle,
        followers = account.followers_count,
        follow_ratio = account.follow_ratio(),
        "Tracking account"
    );

    let db = Arc::new(open_db(global, account_id).await?);

    let assume_yes = opts.assume_yes;
    let syncer = Syncer::builder()
        .db(db)
        .fetcher(fetcher)
        .account(account)
        .batch_size(opts.batch_size)
        .volume_guard(Box::new(move |estimate: &RequestEstimate| {
            assume_yes || tokio::task::block_in_place(|| confirm_volume(estimate))
        }))
        .build()
        .context(SyncSnafu { account_id })?;

    let strategy = if opts.update {
        Strategy::Full
    } else {
        Strategy::Cheap
    };

    syncer
        .run(strategy)
        .await
        .context(SyncSnafu { account_id })
}

fn make_fetcher(global: &GlobalOpts) -> CliResult<Fetcher> {
    let directory = HttpDirectory::builder()
        .maybe_base(global.api_url.clone())
        .bearer_token(global.bearer_token.clone().unwrap_or_default())
        .build()
        .context(RemoteSnafu)?;

    Ok(Fetcher::new(Arc::new(directory), global.retry_policy()))
}

async fn open_db(global: &GlobalOpts, account_id: FollowerId) -> CliResult<Database> {
    let data_dir: PathBuf = global.data_dir().context(NoDataDirSnafu)?;
    let db_path = Database::mk_db_path(&data_dir, account_id)
        .await
        .context(DataDirSnafu)?;

    Database::open(&db_path, account_id)
        .await
        .context(DatabaseSnafu { account_id })
}

/// Ask on the terminal whether to go ahead with a long running walk
fn confirm_volume(estimate: &RequestEstimate) -> bool {
    let mut stderr = io::stderr().lock();
    let _ = writeln!(
        stderr,
        "Walking {} followers needs {} requests over {} rate limit windows (about {} minutes of waiting).",
        estimate.identifier_count,
        estimate.rich_pages,
        estimate.windows,
        estimate.wait.as_secs() / 60,
    );
    let _ = write!(stderr, "Continue? [y/N] ");
    let _ = stderr.flush();

    let mut answer = String::new();
    if let Err(err) = io::stdin().lock().read_line(&mut answer) {
        warn!(target: LOG_TARGET, %err, "Could not read answer, not continuing");
        return false;
    }
    matches!(answer.trim().to_lowercase().as_str(), "y" | "yes")
}

pub fn init_logging() -> WhateverResult<()> {
    tracing_subscriber::fmt()
        .with_writer(io::stderr)
        .with_env_filter(
            EnvFilter::builder()
                .with_default_directive(LevelFilter::INFO.into())
                .from_env_lossy(),
        )
        .try_init()
        .map_err(|_| Whatever::without_source("Failed to initialize logging".to_string()))?;

    Ok(())
}
