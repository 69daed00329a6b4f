use std::path::PathBuf;

use serde::Deserialize;

use crate::infra::config::{AppConfig, BackendConfig, LogConfig, PushConfig};

#[derive(Debug, Deserialize, Default)]
pub struct FileConfig {
    pub logging: Option<FileLogConfig>,
    pub push: Option<FilePushConfig>,
    pub backend: Option<FileBackendConfig>,
}

impl FileConfig {
    pub fn merge_into(self, config: &mut AppConfig) {
        if let Some(logging) = self.logging {
            logging.merge_into(&mut config.logging);
        }

        if let Some(push) = self.push {
            push.merge_into(&mut config.push);
        }

        if let Some(backend) = self.backend {
            backend.merge_into(&mut config.backend);
        }
    }
}

#[derive(Debug, Deserialize, Default)]
pub struct FileLogConfig {
    pub level: Option<String>,
    pub file: Option<PathBuf>,
}

impl FileLogConfig {
    fn merge_into(self, config: &mut LogConfig) {
        if let Some(level) = self.level {
            config.level = level;
        }

        if let Some(file) = self.file {
            config.file = Some(file);
        }
    }
}

#[derive(Debug, Deserialize, Default)]
pub struct FilePushConfig {
    pub topic: Option<String>,
    pub dedupe_window: Option<usize>,
}

impl FilePushConfig {
    fn merge_into(self, config: &mut PushConfig) {
        if let Some(topic) = self.topic {
            config.topic = topic;
        }

        if let Some(window) = self.dedupe_window {
            config.dedupe_window = window;
        }
    }
}

#[derive(Debug, Deserialize, Default)]
pub struct FileBackendConfig {
    pub push_on_insert: Option<bool>,
    pub duplicate_push_deliveries: Option<u8>,
    pub offline: Option<bool>,
    pub permission: Option<String>,
}

impl FileBackendConfig {
    fn merge_into(self, config: &mut BackendConfig) {
        if let Some(push_on_insert) = self.push_on_insert {
            config.push_on_insert = push_on_insert;
        }

        if let Some(duplicates) = self.duplicate_push_deliveries {
            config.duplicate_push_deliveries = duplicates;
        }

        if let Some(offline) = self.offline {
            config.offline = offline;
        }

        if let Some(permission) = self.permission {
            config.permission = permission;
        }
    }
}
