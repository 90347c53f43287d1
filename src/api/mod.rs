//! Access to the Hacker News search API.

mod client;

pub use client::HnSearchClient;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};

use crate::error::SyncError;
use crate::item::RawItem;

/// Sort order used for every query: newest first.
pub const SORT_NEWEST_FIRST: &str = "create_ts desc";

/// The two query shapes the sync engine needs.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SearchQuery {
    /// Most recent activity across the whole site.
    Recent { limit: u32 },
    /// Direct replies to the item with the given signature.
    ChildrenOf { signature: String, limit: u32 },
}

impl SearchQuery {
    #[must_use]
    pub const fn limit(&self) -> u32 {
        match self {
            Self::Recent { limit } | Self::ChildrenOf { limit, .. } => *limit,
        }
    }

    /// Query string parameters in the API's filter syntax.
    #[must_use]
    pub fn params(&self) -> Vec<(&'static str, String)> {
        let mut params = vec![
            ("limit", self.limit().to_string()),
            ("sortby", SORT_NEWEST_FIRST.to_string()),
        ];
        if let Self::ChildrenOf { signature, .. } = self {
            params.push(("filter[fields][parent_sigid]", signature.clone()));
        }
        params
    }
}

/// One page of search results.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct SearchResponse {
    #[serde(default)]
    pub results: Vec<SearchHit>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SearchHit {
    pub item: RawItem,
}

impl SearchResponse {
    /// Consume the page, keeping only the item records.
    #[must_use]
    pub fn into_items(self) -> Vec<RawItem> {
        self.results.into_iter().map(|hit| hit.item).collect()
    }
}

/// Search API as seen by the sync engine.
#[async_trait]
pub trait SearchApi: Send + Sync {
    /// Run a search query.
    async fn search(&self, query: &SearchQuery) -> Result<SearchResponse, SyncError>;

    /// Fetch a single item by signature.
    async fn get_item(&self, signature: &str) -> Result<RawItem, SyncError>;
}
