//! Startup configuration
//!
//! Loaded once from a TOML file, optionally overlaid with the `API_KEYS`
//! environment variable, then frozen into a [`SecretKey`] and a
//! [`Registry`] that the pipeline shares read-only.
//!
//! ```toml
//! secret_key = "0123456789abcdef0123456789abcdef"
//! allow_list = ["9DBBDC21"]
//! hashed_tags = ["$argon2id$v=19$m=19456,t=2,p=1$..."]
//!
//! [devices]
//! "AA:BB:CC:DD:EE:FF" = "api-key-1"
//! ```

use crate::error::ConfigError;
use nfcsec_lib::{Registry, SecretKey};
use serde::Deserialize;
use std::collections::BTreeMap;
use std::fmt;
use std::path::Path;
use tracing::{debug, info};

/// Environment variable holding a JSON object of device id to secret
pub const API_KEYS_VAR: &str = "API_KEYS";

#[derive(Deserialize, Default)]
#[serde(deny_unknown_fields)]
pub struct GateConfig {
    pub secret_key: String,
    #[serde(default)]
    pub devices: BTreeMap<String, String>,
    #[serde(default)]
    pub allow_list: Vec<String>,
    #[serde(default)]
    pub hashed_tags: Vec<String>,
}

impl GateConfig {
    pub fn from_toml_str(contents: &str) -> Result<Self, ConfigError> {
        let mut config: GateConfig = toml::from_str(contents)?;
        config.devices = normalize_ids(std::mem::take(&mut config.devices));
        Ok(config)
    }

    pub fn load(path: &Path) -> Result<Self, ConfigError> {
        let contents = std::fs::read_to_string(path)?;
        let config = Self::from_toml_str(&contents)?;
        info!("Loaded config from {:?}", path);
        Ok(config)
    }

    /// Overlay device secrets from a JSON object; entries here win
    pub fn merge_api_keys(&mut self, json: &str) -> Result<usize, ConfigError> {
        let keys: BTreeMap<String, String> = serde_json::from_str(json)?;
        let merged = keys.len();
        self.devices.extend(normalize_ids(keys));
        Ok(merged)
    }

    /// Apply `API_KEYS` if it is set
    pub fn merge_api_keys_from_env(&mut self) -> Result<(), ConfigError> {
        if let Ok(json) = std::env::var(API_KEYS_VAR) {
            let merged = self.merge_api_keys(&json)?;
            debug!(merged, "Merged device secrets from {}", API_KEYS_VAR);
        }
        Ok(())
    }

    /// Validate the key and build the immutable runtime state
    pub fn into_parts(self) -> Result<(SecretKey, Registry), ConfigError> {
        let key = SecretKey::from_hex(&self.secret_key)?;
        let registry = Registry::new(self.devices, self.allow_list, self.hashed_tags);
        info!(
            devices = registry.device_count(),
            tags = registry.tag_count(),
            "Credential registry ready"
        );
        Ok((key, registry))
    }
}

impl fmt::Debug for GateConfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("GateConfig")
            .field("secret_key", &"<redacted>")
            .field("devices", &self.devices.keys().collect::<Vec<_>>())
            .field("allow_list", &self.allow_list.len())
            .field("hashed_tags", &self.hashed_tags.len())
            .finish()
    }
}

fn normalize_ids(map: BTreeMap<String, String>) -> BTreeMap<String, String> {
    map.into_iter().map(|(id, secret)| (id.trim().to_uppercase(), secret)).collect()
}
