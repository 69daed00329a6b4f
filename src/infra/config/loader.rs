use std::{
    fs,
    path::{Path, PathBuf},
};

use crate::infra::{
    config::{file_config::FileConfig, AppConfig},
    error::AppError,
};

const DEFAULT_CONFIG_PATH: &str = "config.toml";

/// Loads `path` (or `./config.toml`) over the defaults. A missing file is
/// not an error.
pub fn load(path: Option<&Path>) -> Result<AppConfig, AppError> {
    let config_path = path
        .map(Path::to_path_buf)
        .unwrap_or_else(|| PathBuf::from(DEFAULT_CONFIG_PATH));

    let mut config = AppConfig::default();

    if !config_path.exists() {
        return Ok(config);
    }

    let raw = fs::read_to_string(&config_path).map_err(|source| AppError::ConfigRead {
        path: config_path.clone(),
        source,
    })?;

    let file_config: FileConfig = toml::from_str(&raw).map_err(|source| AppError::ConfigParse {
        path: config_path.clone(),
        source,
    })?;

    file_config.merge_into(&mut config);
    validate(&config).map_err(|details| AppError::ConfigInvalid {
        path: config_path,
        details,
    })?;

    Ok(config)
}

fn validate(config: &AppConfig) -> Result<(), String> {
    if config.push.topic.trim().is_empty() {
        return Err("push.topic must not be empty".to_owned());
    }

    if config.logging.level.trim().is_empty() {
        return Err("logging.level must not be empty".to_owned());
    }

    Ok(())
}
