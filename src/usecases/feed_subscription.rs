//! Live, ordered projection of the message collection.

use tokio::sync::mpsc;

use crate::{
    domain::{
        feed::{FeedError, FeedSnapshot, FeedState},
        message::{Message, CREATED_AT_FIELD},
    },
    usecases::contracts::{
        BackendError, DocumentBackend, ListenerRegistration, RawDocument, SnapshotResult,
    },
};

const FEED_LISTENER_REGISTERED: &str = "FEED_LISTENER_REGISTERED";
const FEED_LISTENER_RELEASED: &str = "FEED_LISTENER_RELEASED";
const FEED_LISTENER_FAILED: &str = "FEED_LISTENER_FAILED";
const FEED_DOCUMENT_REJECTED: &str = "FEED_DOCUMENT_REJECTED";
const FEED_MESSAGES_RETAINED: &str = "FEED_MESSAGES_RETAINED";

/// Consumer-owned feed handle.
///
/// Starts in `Loading`, becomes `Active` on the first snapshot, and ends in
/// `Error` or `Closed`. Dropping the handle cancels it.
#[derive(Debug)]
pub struct FeedSubscription {
    state: FeedState,
    updates: Option<mpsc::UnboundedReceiver<SnapshotResult>>,
    registration: Option<ListenerRegistration>,
}

impl FeedSubscription {
    pub(crate) fn open<B: DocumentBackend>(backend: &B) -> Self {
        match backend.watch_ordered(CREATED_AT_FIELD) {
            Ok(query) => {
                tracing::debug!(code = FEED_LISTENER_REGISTERED, "feed listener registered");
                Self {
                    state: FeedState::Loading,
                    updates: Some(query.updates),
                    registration: Some(query.registration),
                }
            }
            Err(error) => {
                tracing::warn!(
                    code = FEED_LISTENER_FAILED,
                    error = %error,
                    "feed listener could not be registered"
                );
                Self {
                    state: FeedState::Error(to_feed_error(error)),
                    updates: None,
                    registration: None,
                }
            }
        }
    }

    pub fn state(&self) -> &FeedState {
        &self.state
    }

    /// Waits for the next state transition.
    ///
    /// Returns `None` without waiting once the subscription is in a terminal
    /// state, so nothing is ever delivered after `cancel`.
    pub async fn changed(&mut self) -> Option<&FeedState> {
        let updates = self.updates.as_mut()?;
        let next = updates.recv().await;

        match next {
            Some(Ok(documents)) => self.apply(documents),
            Some(Err(error)) => self.fail(error),
            None => self.fail(BackendError::Unreachable {
                details: "live query ended".to_owned(),
            }),
        }

        Some(&self.state)
    }

    /// Stops delivery and releases the backend listener. Idempotent.
    pub fn cancel(&mut self) {
        let had_listener = self.release();
        self.state = FeedState::Closed;

        if had_listener {
            tracing::debug!(code = FEED_LISTENER_RELEASED, "feed subscription cancelled");
        }
    }

    fn apply(&mut self, documents: Vec<RawDocument>) {
        let messages: Vec<Message> = documents
            .into_iter()
            .filter_map(|document| {
                Message::from_document(document.id, &document.fields)
                    .map_err(|error| {
                        tracing::warn!(
                            code = FEED_DOCUMENT_REJECTED,
                            error = %error,
                            "skipping malformed message document"
                        );
                    })
                    .ok()
            })
            .collect();

        let previous = match &self.state {
            FeedState::Active(snapshot) => snapshot.clone(),
            _ => FeedSnapshot::default(),
        };
        let (snapshot, report) = previous.merge(messages);

        if report.retained > 0 {
            tracing::warn!(
                code = FEED_MESSAGES_RETAINED,
                retained = report.retained,
                "backend snapshot omitted visible messages; keeping them"
            );
        }
        if report.duplicates > 0 {
            tracing::debug!(duplicates = report.duplicates, "duplicate documents merged");
        }

        tracing::trace!(messages = snapshot.len(), "feed snapshot applied");
        self.state = FeedState::Active(snapshot);
    }

    fn fail(&mut self, error: BackendError) {
        tracing::warn!(code = FEED_LISTENER_FAILED, error = %error, "feed subscription failed");
        self.release();
        self.state = FeedState::Error(to_feed_error(error));
    }

    fn release(&mut self) -> bool {
        self.updates = None;
        match self.registration.take() {
            Some(registration) => {
                registration.remove();
                true
            }
            None => false,
        }
    }
}

impl Drop for FeedSubscription {
    fn drop(&mut self) {
        self.release();
    }
}

fn to_feed_error(error: BackendError) -> FeedError {
    FeedError::Unavailable {
        details: error.to_string(),
    }
}
