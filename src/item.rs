//! Forum items as returned by the search API, and their classification.
//!
//! The wire record ([`RawItem`]) is deliberately loose: every field is
//! optional so that one bad record never poisons a whole result page.
//! [`classify`] is the single place where required fields are checked and
//! the item's variant is decided.

use chrono::{DateTime, NaiveDateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::error::SyncError;

/// Timestamp layout used by the search API for `create_ts`.
const CREATE_TS_FORMAT: &str = "%Y-%m-%dT%H:%M:%SZ";

/// Type tag the API uses for root submissions. Anything else is a comment.
const SUBMISSION_TAG: &str = "submission";

/// An item record exactly as the search API returns it.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct RawItem {
    #[serde(rename = "type", default)]
    pub kind: Option<String>,
    #[serde(default)]
    pub id: Option<i64>,
    /// Signed id, used by the API's filter parameters.
    #[serde(rename = "_id", default)]
    pub signature: Option<String>,
    #[serde(default)]
    pub parent_id: Option<i64>,
    #[serde(default)]
    pub discussion: Option<RawDiscussion>,
    #[serde(rename = "create_ts", default)]
    pub created_at: Option<String>,
    #[serde(rename = "username", default)]
    pub author: Option<String>,
    #[serde(default)]
    pub title: Option<String>,
    #[serde(default)]
    pub url: Option<String>,
    #[serde(default)]
    pub text: Option<String>,
    #[serde(rename = "num_comments", default)]
    pub child_count: Option<i64>,
}

/// The `discussion` block attached to comments.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct RawDiscussion {
    #[serde(default)]
    pub id: Option<i64>,
    #[serde(rename = "sigid", default)]
    pub signature: Option<String>,
    #[serde(default)]
    pub title: Option<String>,
}

impl RawItem {
    /// Number of direct replies, clamped to zero when absent or negative.
    #[must_use]
    pub fn reported_children(&self) -> u32 {
        self.child_count
            .map_or(0, |n| u32::try_from(n.max(0)).unwrap_or(u32::MAX))
    }
}

/// Identity of the root submission a comment belongs to.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct DiscussionRef {
    pub id: i64,
    pub signature: String,
    pub title: String,
}

/// What a submission carries as its message body.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Content {
    /// External link.
    Link(String),
    /// Self post (no external URL).
    Text(String),
}

/// Variant-specific data, resolved once during classification.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ItemKind {
    Submission {
        title: String,
        content: Content,
    },
    Comment {
        parent_id: i64,
        discussion: DiscussionRef,
        text: String,
    },
}

/// A classified forum item.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Item {
    pub id: i64,
    pub signature: String,
    pub created_at: DateTime<Utc>,
    pub author: String,
    pub child_count: u32,
    pub kind: ItemKind,
}

impl Item {
    #[must_use]
    pub const fn is_submission(&self) -> bool {
        matches!(self.kind, ItemKind::Submission { .. })
    }

    #[must_use]
    pub const fn parent_id(&self) -> Option<i64> {
        match &self.kind {
            ItemKind::Submission { .. } => None,
            ItemKind::Comment { parent_id, .. } => Some(*parent_id),
        }
    }

    /// The discussion this item belongs to, if it is a comment.
    #[must_use]
    pub const fn discussion(&self) -> Option<&DiscussionRef> {
        match &self.kind {
            ItemKind::Submission { .. } => None,
            ItemKind::Comment { discussion, .. } => Some(discussion),
        }
    }

    /// Title of the discussion, which for a submission is its own title.
    #[must_use]
    pub fn title(&self) -> &str {
        match &self.kind {
            ItemKind::Submission { title, .. } => title,
            ItemKind::Comment { discussion, .. } => &discussion.title,
        }
    }

    /// Message subject: the title for submissions, `Re: <title>` for comments.
    #[must_use]
    pub fn subject(&self) -> String {
        match &self.kind {
            ItemKind::Submission { title, .. } => title.clone(),
            ItemKind::Comment { discussion, .. } => format!("Re: {}", discussion.title),
        }
    }

    /// Message body: the link for link submissions, the text otherwise.
    #[must_use]
    pub fn payload(&self) -> &str {
        match &self.kind {
            ItemKind::Submission {
                content: Content::Link(url) | Content::Text(url),
                ..
            } => url,
            ItemKind::Comment { text, .. } => text,
        }
    }
}

/// Classify a raw API record into an [`Item`].
///
/// # Errors
///
/// Returns [`SyncError::Format`] if a field required for the item's kind is
/// missing or the creation timestamp cannot be parsed.
pub fn classify(raw: &RawItem) -> Result<Item, SyncError> {
    let id = raw.id.ok_or_else(|| SyncError::missing("id", None))?;
    let tag = raw
        .kind
        .as_deref()
        .ok_or_else(|| SyncError::missing("type", Some(id)))?;
    let signature = raw
        .signature
        .clone()
        .ok_or_else(|| SyncError::missing("_id", Some(id)))?;
    let created_at = raw
        .created_at
        .as_deref()
        .ok_or_else(|| SyncError::missing("create_ts", Some(id)))
        .and_then(|ts| parse_timestamp(ts, id))?;
    let author = raw
        .author
        .clone()
        .ok_or_else(|| SyncError::missing("username", Some(id)))?;

    let kind = if tag == SUBMISSION_TAG {
        let title = raw
            .title
            .clone()
            .ok_or_else(|| SyncError::missing("title", Some(id)))?;
        let content = match &raw.url {
            Some(url) => Content::Link(url.clone()),
            None => Content::Text(raw.text.clone().unwrap_or_default()),
        };
        ItemKind::Submission { title, content }
    } else {
        let parent_id = raw
            .parent_id
            .ok_or_else(|| SyncError::missing("parent_id", Some(id)))?;
        let discussion = raw
            .discussion
            .as_ref()
            .ok_or_else(|| SyncError::missing("discussion", Some(id)))?;
        let discussion = DiscussionRef {
            id: discussion
                .id
                .ok_or_else(|| SyncError::missing("discussion.id", Some(id)))?,
            signature: discussion
                .signature
                .clone()
                .ok_or_else(|| SyncError::missing("discussion.sigid", Some(id)))?,
            title: discussion.title.clone().unwrap_or_default(),
        };
        ItemKind::Comment {
            parent_id,
            discussion,
            text: raw.text.clone().unwrap_or_default(),
        }
    };

    Ok(Item {
        id,
        signature,
        created_at,
        author,
        child_count: raw.reported_children(),
        kind,
    })
}

/// Parse an API timestamp. Accepts the API's own layout and, failing that,
/// any RFC 3339 timestamp.
fn parse_timestamp(value: &str, id: i64) -> Result<DateTime<Utc>, SyncError> {
    NaiveDateTime::parse_from_str(value, CREATE_TS_FORMAT)
        .map(|naive| naive.and_utc())
        .or_else(|_| DateTime::parse_from_rfc3339(value).map(|dt| dt.with_timezone(&Utc)))
        .map_err(|e| SyncError::Format(format!("item {id} has bad create_ts {value:?}: {e}")))
}
