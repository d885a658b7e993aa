use std::time::Duration;

use serde::{Serialize, Serializer};

use crate::http::RICH_PAGE_SIZE;

/// Requests the remote source allows per quota window
pub const REQUESTS_PER_WINDOW: u64 = 15;

pub const WINDOW: Duration = Duration::from_secs(15 * 60);

/// How much of the request quota a full walk of the rich listing needs
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct RequestEstimate {
    pub identifier_count: u64,
    pub rich_pages: u64,
    pub windows: u64,
    /// Time spent waiting for quota windows to reset
    #[serde(rename = "wait_secs", serialize_with = "serialize_secs")]
    pub wait: Duration,
}

impl RequestEstimate {
    pub fn for_identifiers(identifier_count: usize) -> Self {
        let identifier_count = identifier_count as u64;
        let rich_pages = identifier_count.div_ceil(u64::from(RICH_PAGE_SIZE));
        let windows = rich_pages.div_ceil(REQUESTS_PER_WINDOW);
        let wait = WINDOW
            .saturating_mul(u32::try_from(windows.saturating_sub(1)).unwrap_or(u32::MAX));

        Self {
            identifier_count,
            rich_pages,
            windows,
            wait,
        }
    }

    /// More than one quota window is needed, so the run will stall
    pub fn exceeds_window(&self) -> bool {
        1 < self.windows
    }
}

fn serialize_secs<S: Serializer>(d: &Duration, s: S) -> Result<S::Ok, S::Error> {
    s.serialize_u64(d.as_secs())
}
