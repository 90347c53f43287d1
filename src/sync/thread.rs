//! Breadth-first reconstruction of a discussion tree.
//!
//! The search API can only answer "children of X", so a discussion is
//! rebuilt level by level from a FIFO worklist of `(signature, expected
//! child count)` pairs. Each node's reported child count is used as the page
//! limit for its children query, so every node costs exactly one request.

use std::collections::{HashSet, VecDeque};

use async_stream::stream;
use futures_util::Stream;
use tracing::{debug, trace};

use crate::api::{SearchApi, SearchQuery};
use crate::error::SyncError;
use crate::item::{classify, Item, RawItem};

/// Walk the discussion rooted at `root_signature`.
///
/// Yields the root first, then every descendant once, level by level and
/// newest first within each page. Malformed records are yielded as
/// [`SyncError::Format`] and the walk continues. A children page the API no
/// longer knows is yielded as [`SyncError::Missing`] and only that subtree is
/// lost; a missing root ends the stream after the error. Any other error is
/// yielded once and ends the stream.
pub fn traverse<'a>(
    api: &'a dyn SearchApi,
    root_signature: &'a str,
) -> impl Stream<Item = Result<Item, SyncError>> + Send + 'a {
    stream! {
        let root = match api.get_item(root_signature).await {
            Ok(root) => root,
            Err(e) => {
                yield Err(e);
                return;
            }
        };

        let mut seen = HashSet::new();
        let mut worklist = VecDeque::new();

        if let Some(id) = root.id {
            seen.insert(id);
        }
        let root_children = root.reported_children();
        if root_children > 0 {
            worklist.push_back((root_signature.to_string(), root_children));
        }
        yield classify(&root);

        while let Some((signature, expected)) = worklist.pop_front() {
            trace!(%signature, expected, "Fetching children");
            let query = SearchQuery::ChildrenOf {
                signature,
                limit: expected,
            };
            let page = match api.search(&query).await {
                Ok(page) => page,
                Err(e @ SyncError::Missing(_)) => {
                    yield Err(e);
                    continue;
                }
                Err(e) => {
                    yield Err(e);
                    return;
                }
            };

            for raw in page.into_items() {
                if !first_sighting(&mut seen, &raw) {
                    debug!(item_id = ?raw.id, "Skipping item already seen in this discussion");
                    continue;
                }
                // Queue the subtree before classifying, so a malformed
                // record does not hide its replies.
                let children = raw.reported_children();
                if children > 0 {
                    if let Some(child_signature) = &raw.signature {
                        worklist.push_back((child_signature.clone(), children));
                    }
                }
                yield classify(&raw);
            }
        }
    }
}

/// Record `raw` as seen, returning whether it was new. Records without an
/// id cannot be tracked and always count as new.
fn first_sighting(seen: &mut HashSet<i64>, raw: &RawItem) -> bool {
    raw.id.map_or(true, |id| seen.insert(id))
}
