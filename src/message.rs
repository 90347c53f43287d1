//! Email messages built from classified items.

use chrono::{DateTime, Utc};
use mail_builder::headers::date::Date;
use mail_builder::headers::text::Text;
use mail_builder::MessageBuilder;

use crate::constants::USER_AGENT;
use crate::error::SyncError;
use crate::item::Item;

/// Build the Message-ID for an item id.
///
/// Comments reference their parent through this same derivation, so threads
/// hold together in the mail client even when the parent was never delivered.
#[must_use]
pub fn message_id(item_id: i64, domain: &str) -> String {
    format!("<{item_id}-msg@{domain}>")
}

/// An email ready to be handed to the delivery agent.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Message {
    pub subject: String,
    pub from_name: String,
    pub from_address: String,
    pub message_id: String,
    pub in_reply_to: Option<String>,
    pub date: DateTime<Utc>,
    pub payload: String,
}

impl Message {
    /// Derive the message for an item.
    #[must_use]
    pub fn from_item(item: &Item, domain: &str) -> Self {
        Self {
            subject: item.subject(),
            from_name: item.author.clone(),
            from_address: format!("{}-hn@{domain}", item.author),
            message_id: message_id(item.id, domain),
            in_reply_to: item.parent_id().map(|pid| message_id(pid, domain)),
            date: item.created_at,
            payload: item.payload().to_string(),
        }
    }

    /// `From` header value in `name <address>` form.
    #[must_use]
    pub fn from_header(&self) -> String {
        format!("{} <{}>", self.from_name, self.from_address)
    }

    /// Render the message as RFC 5322 bytes with a UTF-8 text body.
    ///
    /// # Errors
    ///
    /// Returns [`SyncError::Delivery`] if the message cannot be serialized.
    pub fn to_rfc5322(&self) -> Result<Vec<u8>, SyncError> {
        let mut builder = MessageBuilder::new()
            .from((self.from_name.as_str(), self.from_address.as_str()))
            .subject(self.subject.as_str())
            .message_id(strip_angles(&self.message_id))
            .date(Date::new(self.date.timestamp()))
            .header("User-Agent", Text::new(USER_AGENT))
            .text_body(self.payload.as_str());

        if let Some(parent) = &self.in_reply_to {
            builder = builder.in_reply_to(strip_angles(parent));
        }

        builder.write_to_vec().map_err(|e| SyncError::Delivery {
            message_id: self.message_id.clone(),
            reason: format!("failed to render message: {e}"),
        })
    }
}

/// mail-builder adds its own angle brackets around message ids.
fn strip_angles(id: &str) -> &str {
    id.trim_start_matches('<').trim_end_matches('>')
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::item::{classify, RawDiscussion, RawItem};

    fn comment() -> Item {
        classify(&RawItem {
            kind: Some("comment".to_string()),
            id: Some(2),
            signature: Some("2-xxxx".to_string()),
            parent_id: Some(1),
            discussion: Some(RawDiscussion {
                id: Some(1),
                signature: Some("1-xxxx".to_string()),
                title: Some("T".to_string()),
            }),
            created_at: Some("2020-01-01T00:00:00Z".to_string()),
            author: Some("michel".to_string()),
            text: Some("A comment".to_string()),
            ..RawItem::default()
        })
        .unwrap()
    }

    #[test]
    fn test_message_id() {
        assert_eq!(message_id(42, "example.com"), "<42-msg@example.com>");
    }

    #[test]
    fn test_comment_message() {
        let msg = Message::from_item(&comment(), "example.com");
        assert_eq!(msg.subject, "Re: T");
        assert_eq!(msg.message_id, "<2-msg@example.com>");
        assert_eq!(msg.in_reply_to.as_deref(), Some("<1-msg@example.com>"));
        assert_eq!(msg.from_header(), "michel <michel-hn@example.com>");
        assert_eq!(msg.payload, "A comment");
    }

    #[test]
    fn test_render_contains_threading_headers() {
        let msg = Message::from_item(&comment(), "example.com");
        let rendered = String::from_utf8(msg.to_rfc5322().unwrap()).unwrap();
        assert!(rendered.contains("<2-msg@example.com>"));
        assert!(rendered.contains("<1-msg@example.com>"));
        assert!(rendered.contains(USER_AGENT));
    }

    #[test]
    fn test_strip_angles() {
        assert_eq!(strip_angles("<1-msg@example.com>"), "1-msg@example.com");
        assert_eq!(strip_angles("1-msg@example.com"), "1-msg@example.com");
    }
}
