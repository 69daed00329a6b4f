//! Seams between the workflows and the vendor platform.

use std::{fmt, future::Future};

use anyhow::Result;
use thiserror::Error;
use tokio::sync::mpsc;

use crate::domain::{
    events::UserAction,
    message::{Document, MessageId},
    push::{DeviceToken, PermissionStatus, PushKind},
};

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum BackendError {
    #[error("backend unreachable: {details}")]
    Unreachable { details: String },
    #[error("permission denied by platform")]
    PermissionDenied,
    #[error("invalid argument: {details}")]
    InvalidArgument { details: String },
}

/// Releases a backend listener exactly once, on `remove` or drop.
pub struct ListenerRegistration {
    release: Option<Box<dyn FnOnce() + Send>>,
}

impl ListenerRegistration {
    pub fn new<F>(release: F) -> Self
    where
        F: FnOnce() + Send + 'static,
    {
        Self {
            release: Some(Box::new(release)),
        }
    }

    #[cfg(test)]
    pub fn inert() -> Self {
        Self { release: None }
    }

    pub fn remove(mut self) {
        self.release_now();
    }

    fn release_now(&mut self) {
        if let Some(release) = self.release.take() {
            release();
        }
    }
}

impl Drop for ListenerRegistration {
    fn drop(&mut self) {
        self.release_now();
    }
}

impl fmt::Debug for ListenerRegistration {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ListenerRegistration")
            .field("active", &self.release.is_some())
            .finish()
    }
}

/// A stored document as the backend delivers it.
#[derive(Debug, Clone, PartialEq)]
pub struct RawDocument {
    pub id: MessageId,
    pub fields: Document,
}

/// Document insert; the named field is filled in with the server's clock.
#[derive(Debug, Clone, PartialEq)]
pub struct InsertRequest {
    pub fields: Document,
    pub server_timestamp_field: Option<String>,
}

pub type SnapshotResult = Result<Vec<RawDocument>, BackendError>;

/// Live query: every mutation yields a complete ordered result set.
#[derive(Debug)]
pub struct LiveQuery {
    pub updates: mpsc::UnboundedReceiver<SnapshotResult>,
    pub registration: ListenerRegistration,
}

pub trait DocumentBackend: Send + Sync + 'static {
    fn insert(
        &self,
        request: InsertRequest,
    ) -> impl Future<Output = Result<MessageId, BackendError>> + Send;

    /// All documents ordered ascending by `order_by`, live-updating.
    fn watch_ordered(&self, order_by: &str) -> Result<LiveQuery, BackendError>;
}

/// Push payload in vendor shape before it becomes a `PushEvent`.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct RawPush {
    pub title: Option<String>,
    pub body: Option<String>,
    pub data: Document,
}

#[derive(Debug)]
pub struct PushStream {
    pub events: mpsc::UnboundedReceiver<RawPush>,
    pub registration: ListenerRegistration,
}

pub trait PushBackend: Send + Sync + 'static {
    fn request_permission(
        &self,
    ) -> impl Future<Output = Result<PermissionStatus, BackendError>> + Send;

    fn subscribe_to_topic(&self, topic: &str)
        -> impl Future<Output = Result<(), BackendError>> + Send;

    /// `Ok(None)` when no token is available yet; not an error.
    fn token(&self) -> impl Future<Output = Result<Option<DeviceToken>, BackendError>> + Send;

    fn listen(&self, kind: PushKind) -> Result<PushStream, BackendError>;
}

/// Source of user actions for the chat screen.
pub trait UserActionSource {
    /// `Ok(None)` once the source is exhausted.
    fn next_action(&mut self) -> impl Future<Output = Result<Option<UserAction>>>;
}
