// src/error.rs

use nfcsec_lib::error::{GateError, PersistError};
use thiserror::Error;

/// Failure to load or validate the gateway configuration.
#[derive(Error, Debug)]
pub enum ConfigError {
    #[error("Failed to read config file: {0}")]
    Io(#[from] std::io::Error),

    #[error("Invalid config file: {0}")]
    Toml(#[from] toml::de::Error),

    #[error("API_KEYS must be a JSON object of device id to secret: {0}")]
    ApiKeys(#[from] serde_json::Error),

    #[error("Invalid secret_key: {0}")]
    Key(#[from] GateError),
}

/// Errors that stop the server or drop a connection.
#[derive(Error, Debug)]
pub enum ServerError {
    #[error("Configuration error: {0}")]
    Config(#[from] ConfigError),

    #[error("Audit store error: {0}")]
    Store(#[from] PersistError),

    #[error("Network error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Protocol error: {0}")]
    Protocol(String),
}
