use std::path::PathBuf;
use std::time::Duration;

use clap::{Args, Parser, Subcommand};
use flock_core::AccountRef;
use flock_remote::RetryPolicy;
use flock_sync::DEFAULT_BATCH_SIZE;
use url::Url;

/// Keeps a durable record of an account's followers and unfollowers
#[derive(Debug, Parser)]
#[command(version, about, long_about = None)]
pub struct Opts {
    #[command(flatten)]
    pub global: GlobalOpts,

    #[command(subcommand)]
    pub cmd: OptsCmd,
}

/// Options shared by all commands
#[derive(Debug, Args)]
pub struct GlobalOpts {
    /// Directory holding one database per tracked account
    #[arg(env = "FLOCK_DATA_DIR", long, global = true)]
    pub data_dir: Option<PathBuf>,

    /// Base url of the remote directory API
    #[arg(env = "FLOCK_API_URL", long, global = true)]
    pub api_url: Option<Url>,

    /// API bearer token
    #[arg(env = "FLOCK_BEARER_TOKEN", long, global = true, hide_env_values = true)]
    pub bearer_token: Option<String>,

    /// Give up on a remote request after this many transient failures
    /// (retry forever if unset)
    #[arg(env = "FLOCK_MAX_RETRIES", long, global = true)]
    pub max_retries: Option<usize>,

    /// Upper bound on the delay between retries, in seconds
    #[arg(env = "FLOCK_MAX_RETRY_DELAY", long, global = true, default_value_t = 15 * 60)]
    pub max_retry_delay_secs: u64,
}

impl GlobalOpts {
    /// `None` if no data dir was given and the platform has no default one
    pub fn data_dir(&self) -> Option<PathBuf> {
        if let Some(data_dir) = &self.data_dir {
            return Some(data_dir.clone());
        }
        let dirs = directories::ProjectDirs::from("org", "Flock", "flock")?;
        Some(
            dirs.state_dir()
                .unwrap_or_else(|| dirs.data_local_dir())
                .to_owned(),
        )
    }

    pub fn retry_policy(&self) -> RetryPolicy {
        let default = RetryPolicy::default();
        RetryPolicy {
            max_retries: self.max_retries,
            max_delay: Duration::from_secs(self.max_retry_delay_secs).max(default.min_delay),
            ..default
        }
    }
}

#[derive(Debug, Subcommand)]
pub enum OptsCmd {
    /// Reconcile the stored followers with the remote listing
    Sync(SyncOpts),

    /// Print the unfollower history
    History {
        /// Tracked account: numeric id or @handle
        #[arg(long)]
        user: AccountRef,
    },
}

#[derive(Debug, Args)]
pub struct SyncOpts {
    /// Tracked account: numeric id or @handle
    #[arg(long)]
    pub user: AccountRef,

    /// Walk all follower records and refresh the stored ones too
    #[arg(long)]
    pub update: bool,

    /// Do not ask before runs that will exceed the request quota
    #[arg(long, short = 'y')]
    pub assume_yes: bool,

    /// Records per store transaction
    #[arg(env = "FLOCK_BATCH_SIZE", long, default_value_t = DEFAULT_BATCH_SIZE)]
    pub batch_size: usize,
}
