//! Configuration loading and management
//!
//! This module handles loading configuration from files and environment
//! variables.

use std::path::Path;

use tracing::{debug, info};

use super::types::Config;
use crate::error::ConfigError;

/// Load configuration from a JSON file
///
/// # Errors
///
/// Returns `ConfigError` if the file cannot be read or parsed.
pub fn load_config(path: impl AsRef<Path>) -> Result<Config, ConfigError> {
    let path = path.as_ref();

    debug!("Loading configuration from {:?}", path);

    if !path.exists() {
        return Err(ConfigError::FileNotFound {
            path: path.display().to_string(),
        });
    }

    let contents = std::fs::read_to_string(path)?;

    let config: Config = serde_json::from_str(&contents)
        .map_err(|e| ConfigError::ParseError(format!("Failed to parse JSON: {e} at {path:?}")))?;

    config.validate()?;

    info!(
        "Configuration loaded: port {}, peer endpoint {:?}",
        config.listen.port, config.tunnel.peer.endpoint
    );

    Ok(config)
}

/// Load configuration from a JSON string
///
/// # Errors
///
/// Returns `ConfigError` if parsing or validation fails.
pub fn load_config_str(json: &str) -> Result<Config, ConfigError> {
    let config: Config =
        serde_json::from_str(json).map_err(|e| ConfigError::ParseError(e.to_string()))?;

    config.validate()?;

    Ok(config)
}

/// Load configuration with environment variable overrides
///
/// Environment variables:
/// - `WG_BRIDGE_PORT`: Override the UDP listen port
/// - `WG_BRIDGE_LOG_LEVEL`: Override log level
/// - `WG_BRIDGE_IPC_SOCKET`: Override IPC socket path
///
/// # Errors
///
/// Returns `ConfigError` if loading or parsing fails.
pub fn load_config_with_env(path: impl AsRef<Path>) -> Result<Config, ConfigError> {
    let mut config = load_config(path)?;

    if let Ok(port) = std::env::var("WG_BRIDGE_PORT") {
        config.listen.port = port.parse().map_err(|_| ConfigError::EnvError {
            name: "WG_BRIDGE_PORT".into(),
            reason: format!("Invalid port: {port}"),
        })?;
        debug!("Listen port overridden to {}", config.listen.port);
    }

    if let Ok(level) = std::env::var("WG_BRIDGE_LOG_LEVEL") {
        config.log.level = level;
        debug!("Log level overridden to {}", config.log.level);
    }

    if let Ok(socket) = std::env::var("WG_BRIDGE_IPC_SOCKET") {
        config.ipc.socket_path = socket.into();
        debug!("IPC socket path overridden to {:?}", config.ipc.socket_path);
    }

    config.validate()?;

    Ok(config)
}

/// Create a default configuration file at the given path
///
/// # Errors
///
/// Returns `ConfigError` if the file cannot be written.
pub fn create_default_config(path: impl AsRef<Path>) -> Result<(), ConfigError> {
    let config = Config::default_config();
    let json = serde_json::to_string_pretty(&config)
        .map_err(|e| ConfigError::ParseError(format!("Failed to serialize config: {e}")))?;

    std::fs::write(path, json)?;
    Ok(())
}
