use std::sync::{
    atomic::{AtomicBool, Ordering},
    Arc,
};

use serde_json::Value;

use crate::{
    backend::{document_store::InMemoryDocumentStore, push_service::InMemoryPushService},
    domain::{
        message::{Document, MessageId, TEXT_FIELD},
        push::PermissionStatus,
    },
    infra::config::BackendConfig,
    usecases::{
        contracts::{BackendError, RawDocument, RawPush},
        push_channel::RELATED_MESSAGE_KEY,
    },
};

const PLATFORM_UNKNOWN_PERMISSION: &str = "PLATFORM_UNKNOWN_PERMISSION";

/// Title used for pushes generated from stored messages.
pub const NEW_MESSAGE_TITLE: &str = "New message";

/// Document store and push service sharing one reachability switch.
#[derive(Debug, Clone)]
pub struct InMemoryPlatform {
    documents: Arc<InMemoryDocumentStore>,
    push: Arc<InMemoryPushService>,
    reachable: Arc<AtomicBool>,
}

impl InMemoryPlatform {
    /// When `push_on_insert` is set, every stored message is also published
    /// to `topic`, independently of the feed.
    pub fn new(config: &BackendConfig, topic: &str) -> Self {
        let reachable = Arc::new(AtomicBool::new(!config.offline));
        let documents = Arc::new(InMemoryDocumentStore::new(Arc::clone(&reachable)));
        let push = Arc::new(InMemoryPushService::new(
            parse_permission(&config.permission),
            Arc::clone(&reachable),
        ));

        if config.push_on_insert {
            let push = Arc::clone(&push);
            let topic = topic.to_owned();
            let copies = usize::from(config.duplicate_push_deliveries) + 1;
            documents.set_insert_hook(Arc::new(move |document: &RawDocument| {
                let Some(message_push) = push_for(document) else {
                    return;
                };
                for _ in 0..copies {
                    push.publish(&topic, message_push.clone());
                }
            }));
        }

        Self {
            documents,
            push,
            reachable,
        }
    }

    pub fn documents(&self) -> Arc<InMemoryDocumentStore> {
        Arc::clone(&self.documents)
    }

    pub fn push(&self) -> Arc<InMemoryPushService> {
        Arc::clone(&self.push)
    }

    /// A fresh handle onto the same platform, failing while offline.
    pub fn connect(&self) -> Result<Self, BackendError> {
        if !self.is_reachable() {
            return Err(BackendError::Unreachable {
                details: "platform offline".to_owned(),
            });
        }
        Ok(self.clone())
    }

    pub fn is_reachable(&self) -> bool {
        self.reachable.load(Ordering::SeqCst)
    }

    pub fn set_reachable(&self, reachable: bool) {
        self.reachable.store(reachable, Ordering::SeqCst);
    }

    /// Simulates the user tapping a notification, keyed to `id` when given.
    pub fn open_notification(&self, id: Option<&MessageId>) -> usize {
        let mut data = Document::new();
        if let Some(id) = id {
            data.insert(
                RELATED_MESSAGE_KEY.to_owned(),
                Value::String(id.as_str().to_owned()),
            );
        }

        self.push.open_notification(RawPush {
            title: Some(NEW_MESSAGE_TITLE.to_owned()),
            body: None,
            data,
        })
    }
}

/// Notification for a stored message, keyed by its id.
fn push_for(document: &RawDocument) -> Option<RawPush> {
    let text = document.fields.get(TEXT_FIELD)?.as_str()?;

    let mut data = Document::new();
    data.insert(
        RELATED_MESSAGE_KEY.to_owned(),
        Value::String(document.id.as_str().to_owned()),
    );

    Some(RawPush {
        title: Some(NEW_MESSAGE_TITLE.to_owned()),
        body: Some(text.to_owned()),
        data,
    })
}

fn parse_permission(value: &str) -> PermissionStatus {
    match value.trim().to_ascii_lowercase().as_str() {
        "authorized" => PermissionStatus::Authorized,
        "provisional" => PermissionStatus::Provisional,
        "denied" => PermissionStatus::Denied,
        "not_determined" => PermissionStatus::NotDetermined,
        other => {
            tracing::warn!(
                code = PLATFORM_UNKNOWN_PERMISSION,
                value = other,
                "unknown permission answer; treating as not determined"
            );
            PermissionStatus::NotDetermined
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{
        domain::{message::CREATED_AT_FIELD, push::PushKind},
        usecases::contracts::{DocumentBackend, InsertRequest, PushBackend},
    };

    fn insert_request(text: &str) -> InsertRequest {
        let mut fields = Document::new();
        fields.insert(TEXT_FIELD.to_owned(), Value::String(text.to_owned()));
        InsertRequest {
            fields,
            server_timestamp_field: Some(CREATED_AT_FIELD.to_owned()),
        }
    }

    #[test]
    fn parses_permission_answers() {
        assert_eq!(parse_permission("Authorized"), PermissionStatus::Authorized);
        assert_eq!(parse_permission("denied"), PermissionStatus::Denied);
        assert_eq!(parse_permission("maybe"), PermissionStatus::NotDetermined);
    }

    #[test]
    fn offline_platform_refuses_connections() {
        let platform = InMemoryPlatform::new(
            &BackendConfig {
                offline: true,
                ..BackendConfig::default()
            },
            "chat",
        );

        assert!(platform.connect().is_err());
        platform.set_reachable(true);
        assert!(platform.connect().is_ok());
    }

    #[tokio::test]
    async fn insert_publishes_keyed_push_with_configured_duplicates() {
        let platform = InMemoryPlatform::new(
            &BackendConfig {
                duplicate_push_deliveries: 1,
                ..BackendConfig::default()
            },
            "chat",
        );
        let push = platform.push();
        push.request_permission().await.expect("prompt");
        push.subscribe_to_topic("chat").await.expect("subscribe");
        let mut stream = push.listen(PushKind::Foreground).expect("listen");

        let id = platform
            .documents()
            .insert(insert_request("hi"))
            .await
            .expect("insert");

        for _ in 0..2 {
            let delivered = stream.events.recv().await.expect("push copy");
            assert_eq!(delivered.body.as_deref(), Some("hi"));
            assert_eq!(
                delivered.data.get(RELATED_MESSAGE_KEY).and_then(Value::as_str),
                Some(id.as_str())
            );
        }
    }

    #[tokio::test]
    async fn opening_a_notification_reaches_opened_listeners_only() {
        let platform = InMemoryPlatform::new(&BackendConfig::default(), "chat");
        let push = platform.push();
        let mut opened = push.listen(PushKind::Opened).expect("listen");
        let _foreground = push.listen(PushKind::Foreground).expect("listen");

        assert_eq!(platform.open_notification(Some(&MessageId::new("m1"))), 1);
        let delivered = opened.events.recv().await.expect("opened push");
        assert_eq!(
            delivered.data.get(RELATED_MESSAGE_KEY).and_then(Value::as_str),
            Some("m1")
        );

        platform.open_notification(None);
        let unkeyed = opened.events.recv().await.expect("opened push");
        assert!(unkeyed.data.is_empty());
    }
}
