use thiserror::Error;

/// Failures that can occur while running a sync cycle.
///
/// Each variant carries its own recovery policy: transport failures abort the
/// cycle, while format, missing and delivery failures only skip the item they
/// concern. Store failures discard the cycle's cursor advance.
#[derive(Debug, Error)]
pub enum SyncError {
    #[error("search API request failed: {message}")]
    Transport {
        message: String,
        /// Whether another attempt could plausibly succeed.
        transient: bool,
    },
    #[error("malformed item: {0}")]
    Format(String),
    /// The API no longer knows the requested item (HTTP 404 or 410).
    #[error("item not found: {0}")]
    Missing(String),
    #[error("delivery failed for message {message_id}: {reason}")]
    Delivery { message_id: String, reason: String },
    #[error("cursor store failed: {0}")]
    Store(String),
}

impl SyncError {
    /// Build a transport error from a `reqwest` failure.
    #[must_use]
    pub fn from_reqwest(err: &reqwest::Error) -> Self {
        let transient = err.is_timeout() || err.is_connect() || err.is_request();
        Self::Transport {
            message: format!("{err:#}"),
            transient,
        }
    }

    /// Build an error from an unsuccessful HTTP status.
    ///
    /// A deleted or unknown item is [`SyncError::Missing`]; every other
    /// status is a transport error.
    #[must_use]
    pub fn from_status(status: reqwest::StatusCode, url: &str) -> Self {
        if matches!(
            status,
            reqwest::StatusCode::NOT_FOUND | reqwest::StatusCode::GONE
        ) {
            return Self::Missing(format!("{url} returned {status}"));
        }
        Self::Transport {
            message: format!("{url} returned {status}"),
            transient: status.is_server_error() || status == reqwest::StatusCode::TOO_MANY_REQUESTS,
        }
    }

    pub(crate) fn missing(field: &str, id: Option<i64>) -> Self {
        match id {
            Some(id) => Self::Format(format!("item {id} is missing `{field}`")),
            None => Self::Format(format!("item is missing `{field}`")),
        }
    }

    /// Whether the API client may retry the request that produced this error.
    #[must_use]
    pub const fn is_transient(&self) -> bool {
        matches!(self, Self::Transport { transient: true, .. })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_status_transience() {
        let url = "http://api.example.com/items/_search";
        assert!(SyncError::from_status(reqwest::StatusCode::BAD_GATEWAY, url).is_transient());
        assert!(SyncError::from_status(reqwest::StatusCode::TOO_MANY_REQUESTS, url).is_transient());
        assert!(!SyncError::from_status(reqwest::StatusCode::FORBIDDEN, url).is_transient());
        assert!(!SyncError::Format("bad".to_string()).is_transient());
    }

    #[test]
    fn test_deleted_items_are_missing() {
        let url = "http://api.example.com/items/7-abcde";
        assert!(matches!(
            SyncError::from_status(reqwest::StatusCode::NOT_FOUND, url),
            SyncError::Missing(_)
        ));
        assert!(matches!(
            SyncError::from_status(reqwest::StatusCode::GONE, url),
            SyncError::Missing(_)
        ));
        assert!(matches!(
            SyncError::from_status(reqwest::StatusCode::BAD_REQUEST, url),
            SyncError::Transport {
                transient: false,
                ..
            }
        ));
    }

    #[test]
    fn test_missing_field_message() {
        let err = SyncError::missing("create_ts", Some(42));
        assert_eq!(err.to_string(), "malformed item: item 42 is missing `create_ts`");
    }
}
