use crate::{
    backend::{
        document_store::InMemoryDocumentStore, push_service::InMemoryPushService, InMemoryPlatform,
    },
    infra::config::AppConfig,
    usecases::{message_store::MessageStore, push_channel::PushChannel},
};

#[derive(Debug)]
pub struct AppContext {
    pub config: AppConfig,
    pub platform: InMemoryPlatform,
}

impl AppContext {
    pub fn new(config: AppConfig, platform: InMemoryPlatform) -> Self {
        Self { config, platform }
    }

    pub fn message_store(&self) -> MessageStore<InMemoryDocumentStore> {
        MessageStore::new(self.platform.documents())
    }

    pub fn push_channel(&self) -> PushChannel<InMemoryPushService> {
        PushChannel::new(self.platform.push(), self.config.push.clone())
    }
}
