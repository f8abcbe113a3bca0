use crate::constants;
use crate::error::{ArenaError, Result};
use serde::Deserialize;
use std::fs;

#[derive(Debug, Deserialize)]
pub struct Config {
    pub cache: CacheConfig,
    pub storage: StorageConfig,
    #[serde(default)]
    pub poomsae_table: Option<String>,
}

#[derive(Debug, Deserialize)]
pub struct CacheConfig {
    pub admin_ttl_secs: u64,
    pub public_ttl_secs: u64,
}

#[derive(Debug, Deserialize)]
pub struct StorageConfig {
    /// Base URL of the object-storage service; when absent the CLI runs
    /// against the in-memory object store.
    #[serde(default)]
    pub endpoint: Option<String>,
    #[serde(default)]
    pub bucket: Option<String>,
    pub upload_timeout_secs: u64,
    pub inline_ceiling_bytes: usize,
}

impl Config {
    pub fn load() -> Result<Self> {
        let config_path = "config.toml";
        let config_content = fs::read_to_string(config_path).map_err(|e| {
            ArenaError::Config(format!("Failed to read config file '{}': {}", config_path, e))
        })?;

        let config: Config = toml::from_str(&config_content)?;
        Ok(config)
    }
}

impl Default for Config {
    fn default() -> Self {
        Self {
            cache: CacheConfig {
                admin_ttl_secs: constants::ADMIN_CACHE_TTL_SECS,
                public_ttl_secs: constants::PUBLIC_CACHE_TTL_SECS,
            },
            storage: StorageConfig {
                endpoint: None,
                bucket: None,
                upload_timeout_secs: constants::UPLOAD_TIMEOUT_SECS,
                inline_ceiling_bytes: constants::INLINE_CEILING_BYTES,
            },
            poomsae_table: None,
        }
    }
}
