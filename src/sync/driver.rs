use std::collections::HashSet;
use std::time::Duration;

use futures_util::{pin_mut, StreamExt};
use tracing::{debug, error, info, warn};

use super::cursor::{CursorStore, SyncCursor};
use super::thread::traverse;
use crate::api::{SearchApi, SearchQuery};
use crate::config::Config;
use crate::error::SyncError;
use crate::item::{classify, DiscussionRef, Item};
use crate::mda::Mda;
use crate::message::Message;

/// Counters for one sync cycle.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct CycleReport {
    /// Records returned by the recent-activity feed.
    pub feed_items: usize,
    /// Distinct discussions traversed.
    pub discussions: usize,
    pub delivered: usize,
    /// Items at or below the watermark.
    pub already_sent: usize,
    /// Feed submissions met again as a traversal root.
    pub duplicates: usize,
    pub failed: usize,
    pub malformed: usize,
    /// Roots or children pages the API no longer has.
    pub missing: usize,
}

/// Result of [`run_cycle`]: what happened, and the cursor to persist.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CycleOutcome {
    pub report: CycleReport,
    pub cursor: SyncCursor,
}

/// Run one polling cycle against `cursor`.
///
/// Feed submissions are delivered straight away; feed comments only name the
/// discussions to walk. Each discussion is then traversed in feed order and
/// every item newer than the cursor is delivered, except feed submissions,
/// which were already handled.
///
/// # Errors
///
/// Returns a [`SyncError::Transport`] if the feed or a traversal query
/// fails. Nothing is delivered twice on the retry, except feed submissions
/// already delivered before the failure. A deleted discussion or subtree
/// ([`SyncError::Missing`]) is skipped and does not abort the cycle.
pub async fn run_cycle(
    api: &dyn SearchApi,
    mda: &dyn Mda,
    cursor: SyncCursor,
    config: &Config,
) -> Result<CycleOutcome, SyncError> {
    let mut report = CycleReport::default();

    let feed = api
        .search(&SearchQuery::Recent {
            limit: config.feed_limit,
        })
        .await?
        .into_items();
    report.feed_items = feed.len();

    let mut feed_items = Vec::with_capacity(feed.len());
    let mut feed_roots = HashSet::new();
    let mut discussions: Vec<DiscussionRef> = Vec::new();
    let mut seen_discussions = HashSet::new();

    for raw in &feed {
        let item = match classify(raw) {
            Ok(item) => item,
            Err(e) => {
                warn!(item_id = ?raw.id, "Skipping feed item: {e}");
                report.malformed += 1;
                continue;
            }
        };

        if item.is_submission() {
            feed_roots.insert(item.id);
            if cursor.needs_delivery(&item) {
                info!("{} - {}", item.id, item.title());
            }
            deliver_if_new(&item, &cursor, mda, config, &mut report).await;
        } else if let Some(discussion) = item.discussion() {
            if seen_discussions.insert(discussion.id) {
                discussions.push(discussion.clone());
            }
        }
        feed_items.push(item);
    }

    report.discussions = discussions.len();

    for discussion in &discussions {
        info!("{} - {}", discussion.id, discussion.title);

        let items = traverse(api, &discussion.signature);
        pin_mut!(items);

        while let Some(result) = items.next().await {
            match result {
                Ok(item) if item.is_submission() && feed_roots.contains(&item.id) => {
                    debug!(item_id = item.id, "Submission already handled from the feed");
                    report.duplicates += 1;
                }
                Ok(item) => deliver_if_new(&item, &cursor, mda, config, &mut report).await,
                Err(SyncError::Format(reason)) => {
                    warn!(discussion_id = discussion.id, "Skipping malformed item: {reason}");
                    report.malformed += 1;
                }
                Err(SyncError::Missing(reason)) => {
                    warn!(
                        discussion_id = discussion.id,
                        signature = %discussion.signature,
                        "Skipping part of discussion: {reason}"
                    );
                    report.missing += 1;
                }
                Err(e) => {
                    error!(
                        discussion_id = discussion.id,
                        signature = %discussion.signature,
                        "Traversal failed, aborting cycle: {e}"
                    );
                    return Err(e);
                }
            }
        }
    }

    Ok(CycleOutcome {
        report,
        cursor: cursor.advance(&feed_items),
    })
}

/// Deliver `item` unless the cursor says it was already sent. Delivery
/// failures are counted and logged, never propagated.
async fn deliver_if_new(
    item: &Item,
    cursor: &SyncCursor,
    mda: &dyn Mda,
    config: &Config,
    report: &mut CycleReport,
) {
    if !cursor.needs_delivery(item) {
        report.already_sent += 1;
        return;
    }

    let message = Message::from_item(item, &config.mail_domain);
    match mda.deliver(&message).await {
        Ok(()) => {
            debug!(item_id = item.id, message_id = %message.message_id, "Delivered");
            report.delivered += 1;
        }
        Err(e) => {
            warn!(item_id = item.id, "Delivery failed: {e}");
            report.failed += 1;
        }
    }
}

/// Load the cursor, run one cycle, and persist the advanced cursor.
///
/// # Errors
///
/// Returns an error if the cursor cannot be loaded or saved, or if the cycle
/// aborts. In every error case the stored cursor is left untouched.
pub async fn sync_once(
    api: &dyn SearchApi,
    mda: &dyn Mda,
    store: &dyn CursorStore,
    config: &Config,
) -> Result<CycleReport, SyncError> {
    let cursor = SyncCursor::new(store.load().await?);
    debug!(last_run_at = ?cursor.last_run_at, "Cursor loaded");

    let CycleOutcome { report, cursor } = run_cycle(api, mda, cursor, config).await?;

    if let Some(last_run_at) = cursor.last_run_at {
        if let Err(e) = store.save(last_run_at).await {
            error!("Failed to save cursor, cycle will be repeated: {e}");
            return Err(e);
        }
    }

    info!(
        feed_items = report.feed_items,
        discussions = report.discussions,
        delivered = report.delivered,
        already_sent = report.already_sent,
        duplicates = report.duplicates,
        failed = report.failed,
        malformed = report.malformed,
        missing = report.missing,
        "Sync cycle complete"
    );

    Ok(report)
}

/// Run sync cycles forever, `interval` apart.
pub async fn poll_loop(
    api: &dyn SearchApi,
    mda: &dyn Mda,
    store: &dyn CursorStore,
    config: &Config,
    interval: Duration,
) {
    loop {
        if let Err(e) = sync_once(api, mda, store, config).await {
            error!("Sync cycle failed: {e}");
        }
        tokio::time::sleep(interval).await;
    }
}
