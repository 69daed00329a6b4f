//! Append-only ordered message log over a document backend.
//!
//! `MessageStore` validates input locally, writes a `{text, createdAt}`
//! document with a server-assigned timestamp, and hands out live feed
//! subscriptions over the same collection.

use std::sync::Arc;

use serde_json::Value;
use thiserror::Error;

use crate::{
    domain::{
        compose_buffer::ComposeBuffer,
        message::{Document, MessageId, CREATED_AT_FIELD, TEXT_FIELD},
    },
    usecases::{
        contracts::{BackendError, DocumentBackend, InsertRequest},
        feed_subscription::FeedSubscription,
    },
};

const STORE_APPEND_REJECTED_EMPTY: &str = "STORE_APPEND_REJECTED_EMPTY";
const STORE_APPEND_FAILED: &str = "STORE_APPEND_FAILED";

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum StoreError {
    /// Blank input; rejected before any backend call.
    #[error("message text is empty")]
    Empty,
    #[error("message store unavailable: {details}")]
    Unavailable { details: String },
    #[error("message store rejected the write: {details}")]
    Rejected { details: String },
}

#[derive(Debug)]
pub struct MessageStore<B: DocumentBackend> {
    backend: Arc<B>,
}

impl<B: DocumentBackend> Clone for MessageStore<B> {
    fn clone(&self) -> Self {
        Self {
            backend: Arc::clone(&self.backend),
        }
    }
}

impl<B: DocumentBackend> MessageStore<B> {
    pub fn new(backend: Arc<B>) -> Self {
        Self { backend }
    }

    /// Appends a message. Surrounding whitespace is trimmed before writing.
    pub async fn append(&self, text: &str) -> Result<MessageId, StoreError> {
        let text = text.trim();
        if text.is_empty() {
            tracing::debug!(code = STORE_APPEND_REJECTED_EMPTY, "blank message not sent");
            return Err(StoreError::Empty);
        }

        let mut fields = Document::new();
        fields.insert(TEXT_FIELD.to_owned(), Value::String(text.to_owned()));

        let request = InsertRequest {
            fields,
            server_timestamp_field: Some(CREATED_AT_FIELD.to_owned()),
        };

        match self.backend.insert(request).await {
            Ok(id) => {
                tracing::debug!(message_id = %id, "message appended");
                Ok(id)
            }
            Err(error) => {
                tracing::warn!(code = STORE_APPEND_FAILED, error = %error, "append failed");
                Err(map_backend_error(error))
            }
        }
    }

    /// Sends the buffer contents, clearing the buffer only on success.
    pub async fn send_from(&self, buffer: &mut ComposeBuffer) -> Result<MessageId, StoreError> {
        let id = self.append(buffer.text()).await?;
        buffer.clear();
        Ok(id)
    }

    /// Opens a live feed over the whole collection.
    pub fn subscribe(&self) -> FeedSubscription {
        FeedSubscription::open(self.backend.as_ref())
    }
}

fn map_backend_error(error: BackendError) -> StoreError {
    match error {
        BackendError::Unreachable { details } => StoreError::Unavailable { details },
        BackendError::PermissionDenied => StoreError::Rejected {
            details: "permission denied".to_owned(),
        },
        BackendError::InvalidArgument { details } => StoreError::Rejected { details },
    }
}
