//! Infrastructure layer: config, logging, errors, and secret handling.

pub mod config;
pub mod error;
pub mod logging;
pub mod secrets;

/// Returns the infra module name for smoke checks.
pub fn module_name() -> &'static str {
    "infra"
}
