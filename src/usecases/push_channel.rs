//! Push notification channel: registration and the two event streams.
//!
//! Delivery is best-effort and at-least-once. Nothing here retries, and a
//! failed registration step only narrows what the session can deliver.

use std::{
    collections::VecDeque,
    sync::{
        atomic::{AtomicBool, Ordering},
        Arc,
    },
};

use serde_json::Value;
use thiserror::Error;

use crate::{
    domain::{
        message::MessageId,
        push::{DeviceToken, PermissionStatus, PushEvent, PushKind},
    },
    infra::config::PushConfig,
    usecases::contracts::{PushBackend, PushStream, RawPush},
};

/// Data key carrying the id of the message a push refers to.
pub const RELATED_MESSAGE_KEY: &str = "messageId";

const PUSH_PERMISSION_FAILED: &str = "PUSH_PERMISSION_FAILED";
const PUSH_TOPIC_SUBSCRIBE_FAILED: &str = "PUSH_TOPIC_SUBSCRIBE_FAILED";
const PUSH_TOKEN_FAILED: &str = "PUSH_TOKEN_FAILED";
const PUSH_LISTENER_FAILED: &str = "PUSH_LISTENER_FAILED";
const PUSH_LISTENER_CLOSED: &str = "PUSH_LISTENER_CLOSED";
const PUSH_DUPLICATE_DROPPED: &str = "PUSH_DUPLICATE_DROPPED";
const PUSH_SESSION_ACTIVATED: &str = "PUSH_SESSION_ACTIVATED";
const PUSH_SESSION_DEACTIVATED: &str = "PUSH_SESSION_DEACTIVATED";

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ChannelError {
    #[error("notification permission not granted")]
    PermissionDenied,
    #[error("subscribing to topic {topic} failed: {details}")]
    TopicSubscribe { topic: String, details: String },
    #[error("device token unavailable: {details}")]
    TokenUnavailable { details: String },
    #[error("{kind:?} listener registration failed: {details}")]
    ListenerRegistration { kind: PushKind, details: String },
    #[error("push channel already has an active session")]
    AlreadyActive,
}

/// Outcome of the once-per-activation registration steps.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ChannelRegistration {
    pub permission: PermissionStatus,
    pub topic_subscribed: bool,
    pub token: Option<DeviceToken>,
    /// Non-fatal failures, in the order they happened.
    pub degraded: Vec<ChannelError>,
}

#[derive(Debug)]
pub struct PushChannel<B: PushBackend> {
    backend: Arc<B>,
    config: PushConfig,
    active: Arc<AtomicBool>,
}

impl<B: PushBackend> PushChannel<B> {
    pub fn new(backend: Arc<B>, config: PushConfig) -> Self {
        Self {
            backend,
            config,
            active: Arc::new(AtomicBool::new(false)),
        }
    }

    /// Asks the user for permission. Failures degrade to `NotDetermined`.
    pub async fn request_permission(&self) -> PermissionStatus {
        match self.backend.request_permission().await {
            Ok(status) => status,
            Err(error) => {
                tracing::warn!(
                    code = PUSH_PERMISSION_FAILED,
                    error = %error,
                    "permission request failed; continuing feed-only"
                );
                PermissionStatus::NotDetermined
            }
        }
    }

    pub async fn subscribe_to_topic(&self, name: &str) -> Result<(), ChannelError> {
        self.backend
            .subscribe_to_topic(name)
            .await
            .map_err(|error| ChannelError::TopicSubscribe {
                topic: name.to_owned(),
                details: error.to_string(),
            })
    }

    /// Absence of a token is normal before permission or on emulators.
    pub async fn token(&self) -> Result<Option<DeviceToken>, ChannelError> {
        self.backend
            .token()
            .await
            .map_err(|error| ChannelError::TokenUnavailable {
                details: error.to_string(),
            })
    }

    /// Runs registration and attaches both listeners for one screen activation.
    ///
    /// Only a second concurrent activation is an error; every other failure
    /// is recorded in the returned session's registration.
    pub async fn activate(&self) -> Result<PushSession, ChannelError> {
        if self
            .active
            .compare_exchange(false, true, Ordering::SeqCst, Ordering::SeqCst)
            .is_err()
        {
            return Err(ChannelError::AlreadyActive);
        }
        let guard = ActiveGuard(Arc::clone(&self.active));

        let mut degraded = Vec::new();

        let permission = self.request_permission().await;
        if !permission.allows_delivery() {
            degraded.push(ChannelError::PermissionDenied);
        }

        let topic_subscribed = match self.subscribe_to_topic(&self.config.topic).await {
            Ok(()) => true,
            Err(error) => {
                tracing::warn!(
                    code = PUSH_TOPIC_SUBSCRIBE_FAILED,
                    error = %error,
                    "topic subscribe failed"
                );
                degraded.push(error);
                false
            }
        };

        let token = match self.token().await {
            Ok(token) => {
                if let Some(token) = &token {
                    tracing::debug!(token = %token, "device token retrieved");
                }
                token
            }
            Err(error) => {
                tracing::warn!(code = PUSH_TOKEN_FAILED, error = %error, "token fetch failed");
                degraded.push(error);
                None
            }
        };

        let (foreground, opened) = if permission.allows_delivery() {
            (
                self.listen(PushKind::Foreground, &mut degraded),
                self.listen(PushKind::Opened, &mut degraded),
            )
        } else {
            (None, None)
        };

        tracing::info!(
            code = PUSH_SESSION_ACTIVATED,
            permission = ?permission,
            topic = %self.config.topic,
            topic_subscribed,
            has_token = token.is_some(),
            degraded = degraded.len(),
            "push session activated"
        );

        Ok(PushSession {
            registration: ChannelRegistration {
                permission,
                topic_subscribed,
                token,
                degraded,
            },
            foreground,
            opened,
            recent: RecentEvents::new(self.config.dedupe_window),
            guard: Some(guard),
        })
    }

    fn listen(&self, kind: PushKind, degraded: &mut Vec<ChannelError>) -> Option<PushStream> {
        match self.backend.listen(kind) {
            Ok(stream) => Some(stream),
            Err(error) => {
                tracing::warn!(
                    code = PUSH_LISTENER_FAILED,
                    kind = kind.as_label(),
                    error = %error,
                    "push listener registration failed"
                );
                degraded.push(ChannelError::ListenerRegistration {
                    kind,
                    details: error.to_string(),
                });
                None
            }
        }
    }
}

#[derive(Debug)]
struct ActiveGuard(Arc<AtomicBool>);

impl Drop for ActiveGuard {
    fn drop(&mut self) {
        self.0.store(false, Ordering::SeqCst);
    }
}

/// Listeners for one screen activation. Dropping it deactivates.
#[derive(Debug)]
pub struct PushSession {
    registration: ChannelRegistration,
    foreground: Option<PushStream>,
    opened: Option<PushStream>,
    recent: RecentEvents,
    guard: Option<ActiveGuard>,
}

impl PushSession {
    pub fn registration(&self) -> &ChannelRegistration {
        &self.registration
    }

    /// True while at least one push stream can still deliver.
    pub fn is_delivering(&self) -> bool {
        self.foreground.is_some() || self.opened.is_some()
    }

    /// Next event from either stream, in arrival order per stream.
    ///
    /// Repeated deliveries keyed by the same message id are dropped. Returns
    /// `None` once no stream remains, including after `deactivate`.
    pub async fn next_event(&mut self) -> Option<PushEvent> {
        loop {
            if !self.is_delivering() {
                return None;
            }

            let (kind, raw) = tokio::select! {
                raw = recv_from(&mut self.foreground) => (PushKind::Foreground, raw),
                raw = recv_from(&mut self.opened) => (PushKind::Opened, raw),
            };

            let Some(raw) = raw else {
                tracing::debug!(
                    code = PUSH_LISTENER_CLOSED,
                    kind = kind.as_label(),
                    "push stream closed by backend"
                );
                match kind {
                    PushKind::Foreground => self.foreground = None,
                    PushKind::Opened => self.opened = None,
                }
                continue;
            };

            let event = to_push_event(kind, raw);
            if let Some(id) = &event.related_message_id {
                if self.recent.is_repeat(kind, id) {
                    tracing::debug!(
                        code = PUSH_DUPLICATE_DROPPED,
                        kind = kind.as_label(),
                        message_id = %id,
                        "duplicate push delivery dropped"
                    );
                    continue;
                }
            }

            tracing::debug!(
                kind = kind.as_label(),
                has_title = event.title.is_some(),
                has_body = event.body.is_some(),
                "push event received"
            );
            return Some(event);
        }
    }

    /// Releases both listeners; queued events are discarded. Idempotent.
    pub fn deactivate(&mut self) {
        self.foreground = None;
        self.opened = None;
        if self.guard.take().is_some() {
            tracing::info!(code = PUSH_SESSION_DEACTIVATED, "push session deactivated");
        }
    }
}

impl Drop for PushSession {
    fn drop(&mut self) {
        self.deactivate();
    }
}

async fn recv_from(stream: &mut Option<PushStream>) -> Option<RawPush> {
    match stream {
        Some(stream) => stream.events.recv().await,
        None => std::future::pending().await,
    }
}

fn to_push_event(kind: PushKind, raw: RawPush) -> PushEvent {
    let related_message_id = match raw.data.get(RELATED_MESSAGE_KEY) {
        Some(Value::String(id)) if !id.trim().is_empty() => Some(MessageId::new(id.as_str())),
        _ => None,
    };

    PushEvent {
        kind,
        title: raw.title,
        body: raw.body,
        related_message_id,
    }
}

/// Bounded window of recently delivered keyed events.
#[derive(Debug)]
struct RecentEvents {
    capacity: usize,
    seen: VecDeque<(PushKind, MessageId)>,
}

impl RecentEvents {
    fn new(capacity: usize) -> Self {
        Self {
            capacity,
            seen: VecDeque::with_capacity(capacity),
        }
    }

    fn is_repeat(&mut self, kind: PushKind, id: &MessageId) -> bool {
        if self.capacity == 0 {
            return false;
        }

        if self
            .seen
            .iter()
            .any(|(seen_kind, seen_id)| *seen_kind == kind && seen_id == id)
        {
            return true;
        }

        if self.seen.len() == self.capacity {
            self.seen.pop_front();
        }
        self.seen.push_back((kind, id.clone()));
        false
    }
}
