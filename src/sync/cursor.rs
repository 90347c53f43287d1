//! The cross-run delivery watermark.

use std::sync::Mutex;

use async_trait::async_trait;
use chrono::{DateTime, Utc};

use crate::error::SyncError;
use crate::item::Item;

/// Timestamp below which feed items are assumed to have been delivered.
///
/// The cursor is a plain value: it is loaded once before a cycle, threaded
/// through the cycle, and saved once at the end.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct SyncCursor {
    pub last_run_at: Option<DateTime<Utc>>,
}

impl SyncCursor {
    #[must_use]
    pub const fn new(last_run_at: Option<DateTime<Utc>>) -> Self {
        Self { last_run_at }
    }

    /// Whether `item` still has to be delivered.
    ///
    /// Items created exactly at the watermark are considered delivered.
    #[must_use]
    pub fn needs_delivery(&self, item: &Item) -> bool {
        self.last_run_at
            .map_or(true, |last_run_at| item.created_at > last_run_at)
    }

    /// Cursor for the next cycle: the newest creation time among this
    /// cycle's top-level feed items.
    ///
    /// Traversed comments must not be passed here. An empty feed leaves the
    /// cursor as it was.
    #[must_use]
    pub fn advance<'a, I>(&self, feed_items: I) -> Self
    where
        I: IntoIterator<Item = &'a Item>,
    {
        feed_items
            .into_iter()
            .map(|item| item.created_at)
            .max()
            .map_or(*self, |newest| Self::new(Some(newest)))
    }
}

/// Durable storage for the cursor.
#[async_trait]
pub trait CursorStore: Send + Sync {
    /// Load the last saved watermark, `None` on first run.
    async fn load(&self) -> Result<Option<DateTime<Utc>>, SyncError>;

    /// Replace the saved watermark.
    async fn save(&self, last_run_at: DateTime<Utc>) -> Result<(), SyncError>;
}

/// Cursor store that lives only as long as the process.
#[derive(Debug, Default)]
pub struct MemoryCursorStore {
    value: Mutex<Option<DateTime<Utc>>>,
}

impl MemoryCursorStore {
    #[must_use]
    pub fn new(initial: Option<DateTime<Utc>>) -> Self {
        Self {
            value: Mutex::new(initial),
        }
    }

    /// Current value, for inspection.
    #[must_use]
    pub fn get(&self) -> Option<DateTime<Utc>> {
        *self.value.lock().unwrap_or_else(std::sync::PoisonError::into_inner)
    }
}

#[async_trait]
impl CursorStore for MemoryCursorStore {
    async fn load(&self) -> Result<Option<DateTime<Utc>>, SyncError> {
        Ok(self.get())
    }

    async fn save(&self, last_run_at: DateTime<Utc>) -> Result<(), SyncError> {
        *self
            .value
            .lock()
            .map_err(|_| SyncError::Store("cursor lock poisoned".to_string()))? = Some(last_run_at);
        Ok(())
    }
}
