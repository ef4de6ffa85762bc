// Copyright (c) 2024-2025 DeepGraph Inc.
// SPDX-License-Identifier: Apache-2.0
//
//! Key registry for the `key=value` configuration format
//!
//! Every configurable field is reachable through a stable key bound to a
//! getter and a setter. The value `DEFAULT` restores the built-in default.

use super::{ConfigError, ConfigResult, EngineConfig};
use std::str::FromStr;

const DEFAULT_VALUE: &str = "DEFAULT";

/// One configurable field
pub struct ConfigKey {
    pub name: &'static str,
    pub description: &'static str,
    getter: fn(&EngineConfig) -> String,
    setter: fn(&mut EngineConfig, &str) -> ConfigResult<()>,
}

impl ConfigKey {
    pub fn get(&self, config: &EngineConfig) -> String {
        (self.getter)(config)
    }

    pub fn set(&self, config: &mut EngineConfig, value: &str) -> ConfigResult<()> {
        let value = value.trim();
        if value.eq_ignore_ascii_case(DEFAULT_VALUE) {
            let default = (self.getter)(&EngineConfig::default());
            return (self.setter)(config, &default);
        }
        (self.setter)(config, value)
    }
}

impl std::fmt::Debug for ConfigKey {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ConfigKey").field("name", &self.name).finish()
    }
}

fn parse<T: FromStr>(key: &str, value: &str) -> ConfigResult<T> {
    value.parse().map_err(|_| ConfigError::InvalidValue {
        key: key.to_string(),
        value: value.to_string(),
    })
}

fn parse_bool(key: &str, value: &str) -> ConfigResult<bool> {
    match value.to_ascii_lowercase().as_str() {
        "1" | "true" | "on" | "yes" => Ok(true),
        "0" | "false" | "off" | "no" => Ok(false),
        _ => Err(ConfigError::InvalidValue {
            key: key.to_string(),
            value: value.to_string(),
        }),
    }
}

/// All keys, in output order
pub static CONFIG_KEYS: &[ConfigKey] = &[
    ConfigKey {
        name: "page_size",
        description: "Leaf page size in bytes",
        getter: |c| c.page_size.to_string(),
        setter: |c, v| {
            c.page_size = parse("page_size", v)?;
            Ok(())
        },
    },
    ConfigKey {
        name: "lock_wait_timeout_ms",
        description: "Milliseconds a lock request may wait",
        getter: |c| c.lock_wait_timeout_ms.to_string(),
        setter: |c, v| {
            c.lock_wait_timeout_ms = parse("lock_wait_timeout_ms", v)?;
            Ok(())
        },
    },
    ConfigKey {
        name: "deadlock_detection",
        description: "Detect deadlocks before waiting",
        getter: |c| c.deadlock_detection.to_string(),
        setter: |c, v| {
            c.deadlock_detection = parse_bool("deadlock_detection", v)?;
            Ok(())
        },
    },
    ConfigKey {
        name: "extern_field_threshold",
        description: "Minimum field length eligible for off-page storage",
        getter: |c| c.extern_field_threshold.to_string(),
        setter: |c, v| {
            c.extern_field_threshold = parse("extern_field_threshold", v)?;
            Ok(())
        },
    },
];

pub fn lookup(name: &str) -> ConfigResult<&'static ConfigKey> {
    CONFIG_KEYS
        .iter()
        .find(|key| key.name == name)
        .ok_or_else(|| ConfigError::UnknownKey(name.to_string()))
}

impl EngineConfig {
    pub fn get_value(&self, key: &str) -> ConfigResult<String> {
        Ok(lookup(key)?.get(self))
    }

    pub fn set_value(&mut self, key: &str, value: &str) -> ConfigResult<()> {
        lookup(key)?.set(self, value)
    }

    /// Parses `key=value` lines over the defaults.
    ///
    /// Blank lines and lines starting with `#` are ignored.
    pub fn from_kv_str(text: &str) -> ConfigResult<Self> {
        let mut config = Self::default();
        for (lineno, line) in text.lines().enumerate() {
            let line = line.trim();
            if line.is_empty() || line.starts_with('#') {
                continue;
            }
            let (key, value) = line.split_once('=').ok_or_else(|| {
                ConfigError::Parse(format!("line {}: expected key=value", lineno + 1))
            })?;
            config.set_value(key.trim(), value)?;
        }
        config.validate()?;
        Ok(config)
    }

    pub fn to_kv_string(&self) -> String {
        CONFIG_KEYS
            .iter()
            .map(|key| format!("{}={}\n", key.name, key.get(self)))
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_get_and_set_by_key() {
        let mut config = EngineConfig::default();
        config.set_value("page_size", "4096").unwrap();
        config.set_value("deadlock_detection", "off").unwrap();
        assert_eq!(config.page_size, 4096);
        assert!(!config.deadlock_detection);
        assert_eq!(config.get_value("page_size").unwrap(), "4096");
    }

    #[test]
    fn test_default_keyword() {
        let mut config = EngineConfig::for_testing();
        config.set_value("page_size", "default").unwrap();
        assert_eq!(config.page_size, EngineConfig::default().page_size);
    }

    #[test]
    fn test_errors() {
        let mut config = EngineConfig::default();
        assert_eq!(
            config.set_value("buffer_pool", "1"),
            Err(ConfigError::UnknownKey("buffer_pool".to_string()))
        );
        assert!(matches!(
            config.set_value("lock_wait_timeout_ms", "soon"),
            Err(ConfigError::InvalidValue { .. })
        ));
        assert!(matches!(
            EngineConfig::from_kv_str("page_size 4096"),
            Err(ConfigError::Parse(_))
        ));
    }

    #[test]
    fn test_text_round_trip_is_deterministic() {
        let mut config = EngineConfig::default();
        config.lock_wait_timeout_ms = 250;
        let text = config.to_kv_string();
        assert!(text.starts_with("page_size="));
        assert!(text.ends_with('\n'));
        assert_eq!(text.lines().count(), CONFIG_KEYS.len());
        assert_eq!(EngineConfig::from_kv_str(&text).unwrap(), config);
        assert_eq!(text, EngineConfig::from_kv_str(&text).unwrap().to_kv_string());
    }
}
