use std::{
    cmp::Ordering as CmpOrdering,
    fmt,
    sync::{
        atomic::{AtomicBool, Ordering},
        Arc, Mutex, MutexGuard, PoisonError, Weak,
    },
};

use chrono::Utc;
use serde_json::Value;
use tokio::sync::mpsc;

use crate::{
    domain::message::{Document, MessageId},
    usecases::contracts::{
        BackendError, DocumentBackend, InsertRequest, ListenerRegistration, LiveQuery,
        RawDocument, SnapshotResult,
    },
};

const STORE_LISTENER_ADDED: &str = "MEMORY_STORE_LISTENER_ADDED";
const STORE_LISTENER_REMOVED: &str = "MEMORY_STORE_LISTENER_REMOVED";

pub type InsertHook = Arc<dyn Fn(&RawDocument) + Send + Sync>;

/// Ordered document collection with live queries, held in memory.
#[derive(Clone)]
pub struct InMemoryDocumentStore {
    inner: Arc<Mutex<StoreState>>,
    reachable: Arc<AtomicBool>,
}

#[derive(Default)]
struct StoreState {
    documents: Vec<RawDocument>,
    last_timestamp_ms: i64,
    next_listener_id: u64,
    listeners: Vec<StoreListener>,
    on_insert: Option<InsertHook>,
}

struct StoreListener {
    id: u64,
    order_by: String,
    tx: mpsc::UnboundedSender<SnapshotResult>,
}

impl InMemoryDocumentStore {
    pub fn new(reachable: Arc<AtomicBool>) -> Self {
        Self {
            inner: Arc::new(Mutex::new(StoreState::default())),
            reachable,
        }
    }

    /// Called after every successful insert, outside the store lock.
    pub fn set_insert_hook(&self, hook: InsertHook) {
        self.state().on_insert = Some(hook);
    }

    pub fn listener_count(&self) -> usize {
        self.state().listeners.len()
    }

    pub fn document_count(&self) -> usize {
        self.state().documents.len()
    }

    /// Stores a document verbatim, with no server timestamp, as another
    /// client's unacknowledged or malformed write would appear.
    #[cfg(test)]
    pub fn insert_raw(&self, id: &str, fields: Document) {
        let mut state = self.state();
        state.documents.push(RawDocument {
            id: MessageId::new(id),
            fields,
        });
        state.broadcast();
    }

    /// Terminates every live query with `error`.
    #[cfg(test)]
    pub fn fail_listeners(&self, error: BackendError) {
        let listeners = std::mem::take(&mut self.state().listeners);
        for listener in listeners {
            let _ = listener.tx.send(Err(error.clone()));
        }
    }

    fn ensure_reachable(&self) -> Result<(), BackendError> {
        if self.reachable.load(Ordering::SeqCst) {
            Ok(())
        } else {
            Err(BackendError::Unreachable {
                details: "document store offline".to_owned(),
            })
        }
    }

    fn state(&self) -> MutexGuard<'_, StoreState> {
        self.inner.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

impl StoreState {
    /// Strictly increasing server clock.
    fn next_timestamp_ms(&mut self) -> i64 {
        let now = Utc::now().timestamp_millis();
        self.last_timestamp_ms = now.max(self.last_timestamp_ms + 1);
        self.last_timestamp_ms
    }

    fn ordered_by(&self, field: &str) -> Vec<RawDocument> {
        let mut documents = self.documents.clone();
        documents.sort_by(|left, right| {
            compare_field(left.fields.get(field), right.fields.get(field))
        });
        documents
    }

    fn broadcast(&mut self) {
        let listeners = std::mem::take(&mut self.listeners);
        self.listeners = listeners
            .into_iter()
            .filter(|listener| listener.tx.send(Ok(self.ordered_by(&listener.order_by))).is_ok())
            .collect();
    }
}

/// Numbers ascending, then strings, then documents missing the field.
fn compare_field(left: Option<&Value>, right: Option<&Value>) -> CmpOrdering {
    fn rank(value: Option<&Value>) -> u8 {
        match value {
            Some(Value::Number(_)) => 0,
            Some(Value::String(_)) => 1,
            _ => 2,
        }
    }

    match (left, right) {
        (Some(Value::Number(l)), Some(Value::Number(r))) => l
            .as_f64()
            .partial_cmp(&r.as_f64())
            .unwrap_or(CmpOrdering::Equal),
        (Some(Value::String(l)), Some(Value::String(r))) => l.cmp(r),
        _ => rank(left).cmp(&rank(right)),
    }
}

impl fmt::Debug for InMemoryDocumentStore {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let state = self.state();
        f.debug_struct("InMemoryDocumentStore")
            .field("documents", &state.documents.len())
            .field("listeners", &state.listeners.len())
            .finish()
    }
}

impl DocumentBackend for InMemoryDocumentStore {
    async fn insert(&self, request: InsertRequest) -> Result<MessageId, BackendError> {
        self.ensure_reachable()?;

        let (document, hook) = {
            let mut state = self.state();
            let mut fields = request.fields;
            if let Some(field) = request.server_timestamp_field {
                let timestamp = state.next_timestamp_ms();
                fields.insert(field, Value::from(timestamp));
            }

            let document = RawDocument {
                id: MessageId::new(uuid::Uuid::new_v4().simple().to_string()),
                fields,
            };
            state.documents.push(document.clone());
            state.broadcast();
            (document, state.on_insert.clone())
        };

        if let Some(hook) = hook {
            hook(&document);
        }

        Ok(document.id)
    }

    fn watch_ordered(&self, order_by: &str) -> Result<LiveQuery, BackendError> {
        self.ensure_reachable()?;

        let (tx, rx) = mpsc::unbounded_channel();
        let id = {
            let mut state = self.state();
            let id = state.next_listener_id;
            state.next_listener_id += 1;

            let _ = tx.send(Ok(state.ordered_by(order_by)));
            state.listeners.push(StoreListener {
                id,
                order_by: order_by.to_owned(),
                tx,
            });
            id
        };
        tracing::debug!(code = STORE_LISTENER_ADDED, listener_id = id, "live query added");

        let inner: Weak<Mutex<StoreState>> = Arc::downgrade(&self.inner);
        let registration = ListenerRegistration::new(move || {
            if let Some(inner) = inner.upgrade() {
                let mut state = inner.lock().unwrap_or_else(PoisonError::into_inner);
                state.listeners.retain(|listener| listener.id != id);
                tracing::debug!(
                    code = STORE_LISTENER_REMOVED,
                    listener_id = id,
                    "live query removed"
                );
            }
        });

        Ok(LiveQuery {
            updates: rx,
            registration,
        })
    }
}
