//! # Messaging Error Types
//!
//! Structured errors for the messaging layer using thiserror instead of
//! `Box<dyn Error>` patterns.
//!
//! Only structural faults surface as `MessagingError` to callers of the
//! dispatch engine. Per-item faults (a payload that will not serialize, an
//! inbound record that will not decode, a group that never gets acknowledged)
//! are absorbed and reported through `DispatchReport` and the logs.

use thiserror::Error;

#[derive(Error, Debug)]
pub enum MessagingError {
    #[error("Queue not configured: {queue_name}")]
    QueueNotConfigured { queue_name: String },

    #[error("Transport error: {target}: {message}")]
    Transport { target: String, message: String },

    #[error("Queue not found: {queue_name}")]
    QueueNotFound { queue_name: String },

    #[error("Batch too large: {size} entries exceeds limit of {limit}")]
    BatchTooLarge { size: usize, limit: usize },

    #[error("Message serialization error: {message}")]
    MessageSerialization { message: String },

    #[error("Message deserialization error: {message}")]
    MessageDeserialization { message: String },
}

impl MessagingError {
    /// Create a queue not configured error
    pub fn queue_not_configured(queue_name: impl Into<String>) -> Self {
        Self::QueueNotConfigured {
            queue_name: queue_name.into(),
        }
    }

    /// Create a transport error
    pub fn transport(target: impl Into<String>, message: impl Into<String>) -> Self {
        Self::Transport {
            target: target.into(),
            message: message.into(),
        }
    }

    /// Create a queue not found error
    pub fn queue_not_found(queue_name: impl Into<String>) -> Self {
        Self::QueueNotFound {
            queue_name: queue_name.into(),
        }
    }

    /// Create a message serialization error
    pub fn message_serialization(message: impl Into<String>) -> Self {
        Self::MessageSerialization {
            message: message.into(),
        }
    }

    /// Create a message deserialization error
    pub fn message_deserialization(message: impl Into<String>) -> Self {
        Self::MessageDeserialization {
            message: message.into(),
        }
    }

    /// Whether a retry round could plausibly succeed
    ///
    /// A missing queue or an oversized batch fails the same way every time.
    pub fn is_transient(&self) -> bool {
        matches!(self, Self::Transport { .. })
    }
}

/// Conversion from serde_json::Error raised while encoding a payload
///
/// Decoding maps its errors explicitly, since a body with the wrong shape
/// reports the same error category as a payload that refuses to encode.
impl From<serde_json::Error> for MessagingError {
    fn from(err: serde_json::Error) -> Self {
        MessagingError::message_serialization(err.to_string())
    }
}

/// Result type alias for messaging operations
pub type MessagingResult<T> = Result<T, MessagingError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_messaging_error_creation() {
        let err = MessagingError::queue_not_configured("update_words");
        assert!(matches!(err, MessagingError::QueueNotConfigured { .. }));

        let err = MessagingError::transport("https://queue/a", "connection reset");
        assert!(matches!(err, MessagingError::Transport { .. }));
        assert!(err.is_transient());

        let err = MessagingError::message_serialization("bad float");
        assert!(!err.is_transient());

        assert!(!MessagingError::queue_not_found("https://queue/a").is_transient());
        assert!(!MessagingError::BatchTooLarge { size: 11, limit: 10 }.is_transient());
    }

    #[test]
    fn test_error_conversions() {
        let mut map = std::collections::HashMap::new();
        map.insert(vec![1u8], "non-string key");
        let json_err = serde_json::to_string(&map).unwrap_err();

        let messaging_err: MessagingError = json_err.into();
        assert!(matches!(
            messaging_err,
            MessagingError::MessageSerialization { .. }
        ));
    }

    #[test]
    fn test_error_display() {
        let err = MessagingError::transport("https://queue/words", "throttled");
        let display_str = format!("{err}");
        assert!(display_str.contains("Transport error"));
        assert!(display_str.contains("https://queue/words"));
        assert!(display_str.contains("throttled"));

        let err = MessagingError::BatchTooLarge { size: 11, limit: 10 };
        assert!(format!("{err}").contains("11 entries"));
    }
}
