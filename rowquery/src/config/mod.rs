// Copyright (c) 2024-2025 DeepGraph Inc.
// SPDX-License-Identifier: Apache-2.0
//
//! Engine configuration
//!
//! Configuration can be built in code, loaded from JSON, or read from a
//! `key=value` text file through the key registry in [`registry`].

pub mod registry;

pub use registry::{ConfigKey, CONFIG_KEYS};

use serde::{Deserialize, Serialize};
use std::path::Path;
use std::time::Duration;
use thiserror::Error;

#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum ConfigError {
    #[error("I/O error: {0}")]
    Io(String),

    #[error("Parse error: {0}")]
    Parse(String),

    #[error("Unknown configuration key: {0}")]
    UnknownKey(String),

    #[error("Invalid value for {key}: {value}")]
    InvalidValue { key: String, value: String },

    #[error("Invalid configuration: {0}")]
    Invalid(String),
}

pub type ConfigResult<T> = Result<T, ConfigError>;

/// Tunables of the storage engine and the lock manager
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct EngineConfig {
    /// Leaf page size in bytes
    pub page_size: usize,

    /// How long a lock request may wait before failing
    pub lock_wait_timeout_ms: u64,

    /// Check for deadlocks before a transaction starts waiting
    pub deadlock_detection: bool,

    /// Fields shorter than this always stay on the leaf page
    pub extern_field_threshold: usize,
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            page_size: 16 * 1024,
            lock_wait_timeout_ms: 50_000,
            deadlock_detection: true,
            extern_field_threshold: 40,
        }
    }
}

impl EngineConfig {
    pub const MIN_PAGE_SIZE: usize = 512;
    pub const MAX_PAGE_SIZE: usize = 64 * 1024;

    /// Small pages and short waits, for tests that exercise splits and timeouts
    pub fn for_testing() -> Self {
        Self {
            page_size: 1024,
            lock_wait_timeout_ms: 2_000,
            ..Self::default()
        }
    }

    pub fn lock_wait_timeout(&self) -> Duration {
        Duration::from_millis(self.lock_wait_timeout_ms)
    }

    pub fn validate(&self) -> ConfigResult<()> {
        if !(Self::MIN_PAGE_SIZE..=Self::MAX_PAGE_SIZE).contains(&self.page_size) {
            return Err(ConfigError::Invalid(format!(
                "page_size must be between {} and {} bytes, got {}",
                Self::MIN_PAGE_SIZE,
                Self::MAX_PAGE_SIZE,
                self.page_size
            )));
        }
        if self.extern_field_threshold < crate::rem::EXTERN_REF_SIZE {
            return Err(ConfigError::Invalid(format!(
                "extern_field_threshold must be at least {} bytes",
                crate::rem::EXTERN_REF_SIZE
            )));
        }
        Ok(())
    }

    /// Parses and validates a JSON document. Missing fields keep defaults.
    pub fn from_json(json: &str) -> ConfigResult<Self> {
        let config: Self =
            serde_json::from_str(json).map_err(|e| ConfigError::Parse(e.to_string()))?;
        config.validate()?;
        Ok(config)
    }

    pub fn to_json(&self) -> ConfigResult<String> {
        serde_json::to_string_pretty(self).map_err(|e| ConfigError::Parse(e.to_string()))
    }

    /// Loads a configuration file: JSON for `.json` files, `key=value`
    /// lines otherwise.
    pub fn load_file<P: AsRef<Path>>(path: P) -> ConfigResult<Self> {
        let path = path.as_ref();
        let text = std::fs::read_to_string(path)
            .map_err(|e| ConfigError::Io(format!("{}: {}", path.display(), e)))?;
        if path.extension().is_some_and(|ext| ext == "json") {
            Self::from_json(&text)
        } else {
            Self::from_kv_str(&text)
        }
    }

    /// Writes the configuration as `key=value` lines.
    pub fn save_file<P: AsRef<Path>>(&self, path: P) -> ConfigResult<()> {
        let path = path.as_ref();
        std::fs::write(path, self.to_kv_string())
            .map_err(|e| ConfigError::Io(format!("{}: {}", path.display(), e)))
    }
}
