//! Runtime configuration
//!
//! Non-visual settings for the effect and its texture pool. Effect parameters
//! are deliberately not part of this file; they live in `DatamoshParams`.

use std::path::Path;

use serde::{Deserialize, Serialize};

use crate::buffer::PixelFormat;
use crate::error::ConfigError;

/// Texture pool settings
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct PoolConfig {
    /// Released textures kept per descriptor after a trim
    pub max_idle_per_desc: usize,
    /// Upper bound on bytes held by the pool, live and idle (None = unbounded)
    pub budget_bytes: Option<u64>,
}

impl Default for PoolConfig {
    fn default() -> Self {
        Self {
            max_idle_per_desc: 2,
            budget_bytes: None,
        }
    }
}

/// Effect configuration
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct EffectConfig {
    /// Format of the full-resolution work buffer
    pub work_format: PixelFormat,
    pub pool: PoolConfig,
}

impl EffectConfig {
    /// Parse a JSON config; missing fields take their defaults
    pub fn from_json(json: &str) -> Result<Self, ConfigError> {
        Ok(serde_json::from_str(json)?)
    }

    /// Load a JSON config from disk
    pub fn load(path: impl AsRef<Path>) -> Result<Self, ConfigError> {
        let contents = std::fs::read_to_string(path)?;
        Self::from_json(&contents)
    }

    pub fn to_json(&self) -> Result<String, ConfigError> {
        Ok(serde_json::to_string_pretty(self)?)
    }
}
