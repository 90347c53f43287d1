//! Shared constants used across the application.

use std::time::Duration;

/// Identifier under which the sync cursor is stored.
pub const APP_ID: &str = "hn-mail-gateway";

/// User agent sent to the search API and written into every delivered message.
pub const USER_AGENT: &str = concat!("hn-mail-gateway/", env!("CARGO_PKG_VERSION"));

/// Default cap on the most-recent-activity feed query.
pub const DEFAULT_FEED_LIMIT: u32 = 100;

/// Upper bound on the wait between two search API attempts.
pub const MAX_RETRY_DELAY: Duration = Duration::from_secs(300);

/// Default limit on how long the delivery agent may take for one message.
pub const DEFAULT_MDA_TIMEOUT_SECS: u64 = 60;
