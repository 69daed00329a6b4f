//! UI layer: console rendering and line input for the chat screen.

pub mod console;
pub mod event_source;

pub(crate) use event_source::StdinActionSource;

/// Returns the UI module name for smoke checks.
pub fn module_name() -> &'static str {
    "ui"
}
