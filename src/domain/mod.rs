//! Domain layer: core entities and business rules.

pub mod compose_buffer;
pub mod events;
pub mod feed;
pub mod message;
pub mod push;
pub mod screen_state;

/// Returns the domain module name for smoke checks.
pub fn module_name() -> &'static str {
    "domain"
}
