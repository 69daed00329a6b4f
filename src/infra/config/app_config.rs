use std::path::PathBuf;

use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq, Default)]
pub struct AppConfig {
    pub logging: LogConfig,
    pub push: PushConfig,
    pub backend: BackendConfig,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct LogConfig {
    pub level: String,
    /// Log to this file instead of stderr.
    pub file: Option<PathBuf>,
}

impl Default for LogConfig {
    fn default() -> Self {
        Self {
            level: "info".to_owned(),
            file: None,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct PushConfig {
    pub topic: String,
    /// Recently seen keyed pushes remembered for dedupe; 0 disables it.
    pub dedupe_window: usize,
}

impl Default for PushConfig {
    fn default() -> Self {
        Self {
            topic: "chat".to_owned(),
            dedupe_window: 64,
        }
    }
}

/// Behaviour of the in-memory platform.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct BackendConfig {
    /// Publish a topic push for every stored message.
    pub push_on_insert: bool,
    /// Extra copies of each push, to exercise at-least-once delivery.
    pub duplicate_push_deliveries: u8,
    pub offline: bool,
    /// Answer given to the notification permission prompt.
    pub permission: String,
}

impl Default for BackendConfig {
    fn default() -> Self {
        Self {
            push_on_insert: true,
            duplicate_push_deliveries: 0,
            offline: false,
            permission: "authorized".to_owned(),
        }
    }
}
