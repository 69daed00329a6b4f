//! Use case layer: application workflows and orchestration.

pub mod background;
pub mod bootstrap;
pub mod chat_screen;
pub mod context;
pub mod contracts;
pub mod feed_subscription;
pub mod message_store;
pub mod push_channel;
pub mod route_notification;

/// Returns the usecases module name for smoke checks.
pub fn module_name() -> &'static str {
    "usecases"
}
