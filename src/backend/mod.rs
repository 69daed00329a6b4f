//! In-memory platform: ordered document store and push delivery service.

pub mod document_store;
pub mod platform;
pub mod push_service;

pub use platform::InMemoryPlatform;

/// Returns the backend module name for smoke checks.
pub fn module_name() -> &'static str {
    "backend"
}
