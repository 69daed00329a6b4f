use std::path::Path;

use crate::{
    backend::InMemoryPlatform,
    infra::{self, error::AppError, logging::LogGuard},
    usecases::context::AppContext,
};

/// Loads config, starts logging and wires the platform. The returned guard
/// must outlive the context for file logs to flush.
pub fn bootstrap(config_path: Option<&Path>) -> Result<(AppContext, LogGuard), AppError> {
    let context = build_context(config_path)?;
    let guard = infra::logging::init(&context.config.logging)?;

    Ok((context, guard))
}

fn build_context(config_path: Option<&Path>) -> Result<AppContext, AppError> {
    let config = infra::config::load(config_path)?;
    let platform = InMemoryPlatform::new(&config.backend, &config.push.topic);

    Ok(AppContext::new(config, platform))
}
