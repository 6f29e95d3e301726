//! Config - Row Source Configuration

use crate::constants::{
    DEFAULT_BLOCK_SIZE, DEFAULT_CACHE_BLOCK_COUNT, DEFAULT_CACHE_TIMEOUT_MS,
    DEFAULT_MAX_CONCURRENT_REQUESTS,
};
use crate::error::{Error, Result};
use serde::{Deserialize, Serialize};
use std::path::Path;
use std::time::Duration;

/// Block cache and request configuration, fixed at construction time
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(default)]
pub struct SourceConfig {
    /// Rows per block
    pub block_size: usize,
    /// Provider calls allowed in flight at once
    pub max_concurrent_requests: usize,
    /// Resident block cap
    pub cache_block_count: usize,
    /// Staleness window in milliseconds (None = never stale)
    pub cache_timeout_ms: Option<u64>,
}

impl Default for SourceConfig {
    fn default() -> Self {
        Self {
            block_size: DEFAULT_BLOCK_SIZE,
            max_concurrent_requests: DEFAULT_MAX_CONCURRENT_REQUESTS,
            cache_block_count: DEFAULT_CACHE_BLOCK_COUNT,
            cache_timeout_ms: Some(DEFAULT_CACHE_TIMEOUT_MS),
        }
    }
}

impl SourceConfig {
    /// Staleness window as a duration
    pub fn cache_timeout(&self) -> Option<Duration> {
        self.cache_timeout_ms.map(Duration::from_millis)
    }

    /// Reject values the cache cannot operate with
    pub fn validate(&self) -> Result<()> {
        if self.block_size == 0 {
            return Err(Error::InvalidConfig {
                message: "block_size must be greater than zero".to_string(),
            });
        }
        if self.max_concurrent_requests == 0 {
            return Err(Error::InvalidConfig {
                message: "max_concurrent_requests must be greater than zero".to_string(),
            });
        }
        if self.cache_block_count == 0 {
            return Err(Error::InvalidConfig {
                message: "cache_block_count must be greater than zero".to_string(),
            });
        }
        Ok(())
    }

    /// Parse a TOML document; missing keys fall back to defaults
    pub fn from_toml_str(value: &str) -> Result<Self> {
        if value.trim().is_empty() {
            return Ok(Self::default());
        }
        let config: SourceConfig = toml::from_str(value)?;
        config.validate()?;
        Ok(config)
    }

    /// Load configuration from a TOML file
    pub fn load(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        tracing::debug!("Loading row source config from {}", path.display());
        let value = std::fs::read_to_string(path)?;
        Self::from_toml_str(&value)
    }
}
