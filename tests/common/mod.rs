//! Shared fakes for integration tests: an in-memory forum tree that answers
//! search queries, and a delivery agent that records messages.

#![allow(dead_code)]

use std::collections::HashSet;
use std::sync::Mutex;

use async_trait::async_trait;
use chrono::{DateTime, Duration, TimeZone, Utc};

use hn_mail_gateway::api::{SearchApi, SearchHit, SearchQuery, SearchResponse};
use hn_mail_gateway::error::SyncError;
use hn_mail_gateway::item::{RawDiscussion, RawItem};
use hn_mail_gateway::mda::Mda;
use hn_mail_gateway::message::Message;

pub fn sign(id: i64) -> String {
    format!("{id}-xxxx")
}

fn unsign(signature: &str) -> Option<i64> {
    signature.strip_suffix("-xxxx")?.parse().ok()
}

#[derive(Debug, Clone)]
struct Node {
    id: i64,
    parent: Option<i64>,
    title: Option<String>,
    url: Option<String>,
    text: Option<String>,
    created_at: DateTime<Utc>,
}

/// A forum whose items form a tree, queried like the real search API.
pub struct TreeApi {
    nodes: Vec<Node>,
    clock: DateTime<Utc>,
    /// Records returned ahead of the real feed, e.g. malformed ones.
    pub extra_feed: Vec<RawItem>,
    pub fail_feed: bool,
    /// Signature whose children query fails as if the API were unreachable.
    pub fail_children_of: Option<String>,
    pub searches: Mutex<Vec<SearchQuery>>,
    pub lookups: Mutex<Vec<String>>,
}

impl Default for TreeApi {
    fn default() -> Self {
        Self {
            nodes: Vec::new(),
            clock: Utc.with_ymd_and_hms(2020, 1, 1, 0, 0, 0).unwrap(),
            extra_feed: Vec::new(),
            fail_feed: false,
            fail_children_of: None,
            searches: Mutex::new(Vec::new()),
            lookups: Mutex::new(Vec::new()),
        }
    }
}

impl TreeApi {
    fn next_node(&mut self, parent: Option<i64>) -> Node {
        self.clock += Duration::minutes(1);
        Node {
            id: self.nodes.len() as i64 + 1,
            parent,
            title: None,
            url: None,
            text: None,
            created_at: self.clock,
        }
    }

    /// Add a root submission; `url = None` makes it a text post.
    pub fn add_submission(&mut self, title: &str, url: Option<&str>) -> i64 {
        let mut node = self.next_node(None);
        node.title = Some(title.to_string());
        node.url = url.map(ToString::to_string);
        if url.is_none() {
            node.text = Some(format!("{title} (text)"));
        }
        let id = node.id;
        self.nodes.push(node);
        id
    }

    pub fn add_comment(&mut self, parent: i64, text: &str) -> i64 {
        let mut node = self.next_node(Some(parent));
        node.text = Some(text.to_string());
        let id = node.id;
        self.nodes.push(node);
        id
    }

    pub fn created_at(&self, id: i64) -> DateTime<Utc> {
        self.node(id).created_at
    }

    pub fn search_count(&self) -> usize {
        self.searches.lock().unwrap().len()
    }

    fn node(&self, id: i64) -> &Node {
        &self.nodes[(id - 1) as usize]
    }

    fn root_of(&self, id: i64) -> &Node {
        let mut node = self.node(id);
        while let Some(parent) = node.parent {
            node = self.node(parent);
        }
        node
    }

    fn children_of(&self, id: i64) -> impl Iterator<Item = &Node> {
        self.nodes.iter().filter(move |n| n.parent == Some(id))
    }

    pub fn raw(&self, id: i64) -> RawItem {
        let node = self.node(id);
        let discussion = node.parent.map(|_| {
            let root = self.root_of(id);
            RawDiscussion {
                id: Some(root.id),
                signature: Some(sign(root.id)),
                title: root.title.clone(),
            }
        });
        RawItem {
            kind: Some(if node.parent.is_none() { "submission" } else { "comment" }.to_string()),
            id: Some(node.id),
            signature: Some(sign(node.id)),
            parent_id: node.parent,
            discussion,
            created_at: Some(node.created_at.format("%Y-%m-%dT%H:%M:%SZ").to_string()),
            author: Some("michel".to_string()),
            title: node.title.clone(),
            url: node.url.clone(),
            text: node.text.clone(),
            child_count: Some(self.children_of(id).count() as i64),
        }
    }

    fn newest_first<'a>(&self, nodes: impl Iterator<Item = &'a Node>, limit: u32) -> Vec<SearchHit> {
        let mut nodes: Vec<&Node> = nodes.collect();
        nodes.sort_by(|a, b| b.created_at.cmp(&a.created_at));
        nodes
            .into_iter()
            .take(limit as usize)
            .map(|n| SearchHit { item: self.raw(n.id) })
            .collect()
    }
}

#[async_trait]
impl SearchApi for TreeApi {
    async fn search(&self, query: &SearchQuery) -> Result<SearchResponse, SyncError> {
        self.searches.lock().unwrap().push(query.clone());
        let results = match query {
            SearchQuery::Recent { limit } => {
                if self.fail_feed {
                    return Err(SyncError::Transport {
                        message: "connection refused".to_string(),
                        transient: true,
                    });
                }
                let mut hits: Vec<SearchHit> = self
                    .extra_feed
                    .iter()
                    .cloned()
                    .map(|item| SearchHit { item })
                    .collect();
                hits.extend(self.newest_first(self.nodes.iter(), *limit));
                hits
            }
            SearchQuery::ChildrenOf { signature, .. }
                if self.fail_children_of.as_deref() == Some(signature.as_str()) =>
            {
                return Err(SyncError::Transport {
                    message: format!("timed out fetching children of {signature}"),
                    transient: true,
                });
            }
            SearchQuery::ChildrenOf { signature, limit } => match unsign(signature) {
                Some(id) => self.newest_first(self.children_of(id), *limit),
                None => Vec::new(),
            },
        };
        Ok(SearchResponse { results })
    }

    async fn get_item(&self, signature: &str) -> Result<RawItem, SyncError> {
        self.lookups.lock().unwrap().push(signature.to_string());
        unsign(signature)
            .filter(|id| *id >= 1 && (*id as usize) <= self.nodes.len())
            .map(|id| self.raw(id))
            .ok_or_else(|| SyncError::Missing(format!("no item {signature}")))
    }
}

/// Delivery agent that keeps every message it accepts.
#[derive(Default)]
pub struct ListMda {
    pub messages: Mutex<Vec<Message>>,
    /// Message ids to reject.
    pub reject: HashSet<String>,
}

impl ListMda {
    pub fn take(&self) -> Vec<Message> {
        std::mem::take(&mut *self.messages.lock().unwrap())
    }

    pub fn count(&self) -> usize {
        self.messages.lock().unwrap().len()
    }
}

#[async_trait]
impl Mda for ListMda {
    async fn deliver(&self, message: &Message) -> Result<(), SyncError> {
        if self.reject.contains(&message.message_id) {
            return Err(SyncError::Delivery {
                message_id: message.message_id.clone(),
                reason: "rejected".to_string(),
            });
        }
        self.messages.lock().unwrap().push(message.clone());
        Ok(())
    }
}
