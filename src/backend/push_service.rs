use std::{
    collections::HashSet,
    fmt,
    sync::{
        atomic::{AtomicBool, Ordering},
        Arc, Mutex, MutexGuard, PoisonError, Weak,
    },
};

use tokio::sync::mpsc;

use crate::{
    domain::push::{DeviceToken, PermissionStatus, PushKind},
    usecases::{
        background,
        contracts::{BackendError, ListenerRegistration, PushBackend, PushStream, RawPush},
    },
};

const PUSH_LISTENER_ADDED: &str = "MEMORY_PUSH_LISTENER_ADDED";
const PUSH_LISTENER_REMOVED: &str = "MEMORY_PUSH_LISTENER_REMOVED";
const PUSH_NOT_SUBSCRIBED: &str = "MEMORY_PUSH_NOT_SUBSCRIBED";

/// Push delivery service for a single device, held in memory.
#[derive(Clone)]
pub struct InMemoryPushService {
    inner: Arc<Mutex<PushState>>,
    reachable: Arc<AtomicBool>,
}

struct PushState {
    /// What the user answers when prompted.
    answer: PermissionStatus,
    granted: PermissionStatus,
    topics: HashSet<String>,
    token: DeviceToken,
    next_listener_id: u64,
    listeners: Vec<PushListener>,
}

struct PushListener {
    id: u64,
    kind: PushKind,
    tx: mpsc::UnboundedSender<RawPush>,
}

/// Where a published push ended up.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Delivery {
    /// Sent to this many foreground listeners.
    Foreground(usize),
    /// No foreground listener; handed to the background entry point.
    Background(background::BackgroundDelivery),
    /// Device is not subscribed to the topic, or the service is offline.
    Dropped,
}

impl InMemoryPushService {
    pub fn new(answer: PermissionStatus, reachable: Arc<AtomicBool>) -> Self {
        Self {
            inner: Arc::new(Mutex::new(PushState {
                answer,
                granted: PermissionStatus::NotDetermined,
                topics: HashSet::new(),
                token: DeviceToken::new(format!("tok-{}", uuid::Uuid::new_v4().simple())),
                next_listener_id: 0,
                listeners: Vec::new(),
            })),
            reachable,
        }
    }

    pub fn listener_count(&self, kind: PushKind) -> usize {
        self.state()
            .listeners
            .iter()
            .filter(|listener| listener.kind == kind)
            .count()
    }

    /// Sends a topic message to this device.
    pub fn publish(&self, topic: &str, push: RawPush) -> Delivery {
        if !self.reachable.load(Ordering::SeqCst) {
            return Delivery::Dropped;
        }

        let delivered = {
            let mut state = self.state();
            if !state.topics.contains(topic) {
                tracing::debug!(
                    code = PUSH_NOT_SUBSCRIBED,
                    topic,
                    "push for unsubscribed topic dropped"
                );
                return Delivery::Dropped;
            }
            if !state.granted.allows_delivery() {
                return Delivery::Dropped;
            }
            state.send(PushKind::Foreground, &push)
        };

        if delivered > 0 {
            Delivery::Foreground(delivered)
        } else {
            Delivery::Background(background::deliver(push))
        }
    }

    /// Simulates the user tapping a notification for `push`.
    pub fn open_notification(&self, push: RawPush) -> usize {
        self.state().send(PushKind::Opened, &push)
    }

    fn ensure_reachable(&self) -> Result<(), BackendError> {
        if self.reachable.load(Ordering::SeqCst) {
            Ok(())
        } else {
            Err(BackendError::Unreachable {
                details: "push service offline".to_owned(),
            })
        }
    }

    fn state(&self) -> MutexGuard<'_, PushState> {
        self.inner.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

impl PushState {
    fn send(&mut self, kind: PushKind, push: &RawPush) -> usize {
        let mut delivered = 0;
        self.listeners.retain(|listener| {
            if listener.kind != kind {
                return true;
            }
            let alive = listener.tx.send(push.clone()).is_ok();
            if alive {
                delivered += 1;
            }
            alive
        });
        delivered
    }
}

impl fmt::Debug for InMemoryPushService {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let state = self.state();
        f.debug_struct("InMemoryPushService")
            .field("granted", &state.granted)
            .field("topics", &state.topics)
            .field("listeners", &state.listeners.len())
            .finish()
    }
}

impl PushBackend for InMemoryPushService {
    async fn request_permission(&self) -> Result<PermissionStatus, BackendError> {
        let mut state = self.state();
        state.granted = state.answer;
        Ok(state.granted)
    }

    async fn subscribe_to_topic(&self, topic: &str) -> Result<(), BackendError> {
        self.ensure_reachable()?;
        if topic.trim().is_empty() {
            return Err(BackendError::InvalidArgument {
                details: "topic name is empty".to_owned(),
            });
        }

        self.state().topics.insert(topic.to_owned());
        Ok(())
    }

    async fn token(&self) -> Result<Option<DeviceToken>, BackendError> {
        self.ensure_reachable()?;
        let state = self.state();
        Ok(state
            .granted
            .allows_delivery()
            .then(|| state.token.clone()))
    }

    fn listen(&self, kind: PushKind) -> Result<PushStream, BackendError> {
        let (tx, rx) = mpsc::unbounded_channel();
        let id = {
            let mut state = self.state();
            let id = state.next_listener_id;
            state.next_listener_id += 1;
            state.listeners.push(PushListener { id, kind, tx });
            id
        };
        tracing::debug!(
            code = PUSH_LISTENER_ADDED,
            listener_id = id,
            kind = kind.as_label(),
            "push listener added"
        );

        let inner: Weak<Mutex<PushState>> = Arc::downgrade(&self.inner);
        let registration = ListenerRegistration::new(move || {
            if let Some(inner) = inner.upgrade() {
                let mut state = inner.lock().unwrap_or_else(PoisonError::into_inner);
                state.listeners.retain(|listener| listener.id != id);
                tracing::debug!(
                    code = PUSH_LISTENER_REMOVED,
                    listener_id = id,
                    "push listener removed"
                );
            }
        });

        Ok(PushStream {
            events: rx,
            registration,
        })
    }
}
