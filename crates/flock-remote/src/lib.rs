//! Access to the remote social graph directory
//!
//! [`RemoteDirectory`] is the raw, one-request-per-call interface;
//! [`HttpDirectory`] implements it over the REST API. [`Fetcher`] adds
//! pagination draining and the retry policy on top of any directory.

mod directory;
mod estimate;
mod fetcher;
mod http;


pub use self::directory::{
    Cursor, END_CURSOR, FIRST_CURSOR, Page, RemoteDirectory, RemoteError, RemoteResult,
};
pub use self::estimate::{REQUESTS_PER_WINDOW, RequestEstimate, WINDOW};
pub use self::fetcher::{FetchError, FetchResult, Fetcher, RetryPolicy};
pub use self::http::{DEFAULT_API_URL, HttpDirectory, RICH_PAGE_SIZE};

const LOG_TARGET: &str = "flock::remote";
