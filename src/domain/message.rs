use std::{cmp::Ordering, fmt};

use chrono::{DateTime, TimeZone, Utc};
use serde_json::Value;
use thiserror::Error;

/// Document field holding the message body.
pub const TEXT_FIELD: &str = "text";
/// Document field holding the server-assigned creation timestamp.
pub const CREATED_AT_FIELD: &str = "createdAt";

/// Raw document payload as delivered by the document store.
pub type Document = serde_json::Map<String, Value>;

/// Opaque identifier assigned by the store.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct MessageId(String);

impl MessageId {
    pub fn new(value: impl Into<String>) -> Self {
        Self(value.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for MessageId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Message {
    pub id: MessageId,
    pub text: String,
    /// `None` until the server acknowledges the write.
    pub created_at: Option<DateTime<Utc>>,
}

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum DecodeError {
    #[error("document {id} has no text field")]
    MissingText { id: MessageId },
    #[error("document {id} text field is not a string")]
    InvalidText { id: MessageId },
    #[error("document {id} text is blank")]
    EmptyText { id: MessageId },
}

impl Message {
    pub fn is_pending(&self) -> bool {
        self.created_at.is_none()
    }

    /// Decodes a store document, rejecting unusable text and degrading a
    /// malformed timestamp to pending.
    pub fn from_document(id: MessageId, document: &Document) -> Result<Self, DecodeError> {
        let text = match document.get(TEXT_FIELD) {
            None | Some(Value::Null) => return Err(DecodeError::MissingText { id }),
            Some(Value::String(text)) => text,
            Some(_) => return Err(DecodeError::InvalidText { id }),
        };

        if text.trim().is_empty() {
            return Err(DecodeError::EmptyText { id });
        }

        let created_at = match document.get(CREATED_AT_FIELD) {
            None | Some(Value::Null) => None,
            Some(raw) => {
                let parsed = decode_timestamp(raw);
                if parsed.is_none() {
                    tracing::warn!(
                        message_id = %id,
                        "malformed createdAt treated as pending"
                    );
                }
                parsed
            }
        };

        Ok(Self {
            id,
            text: text.clone(),
            created_at,
        })
    }
}

/// Display order: ascending by server timestamp, pending messages last.
pub fn display_order(left: &Message, right: &Message) -> Ordering {
    match (left.created_at, right.created_at) {
        (Some(l), Some(r)) => l.cmp(&r),
        (Some(_), None) => Ordering::Less,
        (None, Some(_)) => Ordering::Greater,
        (None, None) => Ordering::Equal,
    }
}

/// Accepts epoch milliseconds or an RFC 3339 string.
fn decode_timestamp(raw: &Value) -> Option<DateTime<Utc>> {
    match raw {
        Value::Number(number) => number
            .as_i64()
            .and_then(|ms| Utc.timestamp_millis_opt(ms).single()),
        Value::String(text) => DateTime::parse_from_rfc3339(text)
            .ok()
            .map(|value| value.with_timezone(&Utc)),
        _ => None,
    }
}
