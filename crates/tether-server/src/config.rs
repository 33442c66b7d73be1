//! Server configuration.
//!
//! Loading flow:
//! 1. Start with compiled [`ServerConfig::default()`]
//! 2. If a JSON config file is given and exists, deep-merge it over defaults
//! 3. Apply `TETHER_*` environment variable overrides (highest priority)

use std::path::Path;

use serde::{Deserialize, Serialize};
use serde_json::Value;
use tracing::debug;

use crate::error::ServerError;

/// Configuration for the channel server.
#[derive(Clone, Debug, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ServerConfig {
    /// Host to bind (default `"127.0.0.1"`).
    pub host: String,
    /// Port to bind (default `0` for auto-assign).
    pub port: u16,
    /// Maximum concurrent WebSocket connections.
    pub max_connections: usize,
    /// Liveness sweep interval in seconds.
    pub sweep_interval_secs: u64,
    /// Max WebSocket message size in bytes.
    pub max_message_size: usize,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            host: "127.0.0.1".into(),
            port: 0,
            max_connections: 50,
            sweep_interval_secs: 30,
            max_message_size: 1024 * 1024, // 1 MB
        }
    }
}

impl ServerConfig {
    /// Load configuration from an optional JSON file plus env overrides.
    ///
    /// A missing file yields defaults; an unreadable or invalid file is an
    /// error.
    pub fn load(path: Option<&Path>) -> Result<Self, ServerError> {
        let defaults = serde_json::to_value(Self::default())
            .map_err(|e| ServerError::Config(e.to_string()))?;

        let merged = match path {
            Some(path) if path.exists() => {
                debug!(?path, "loading server config from file");
                let content = std::fs::read_to_string(path)?;
                let user: Value = serde_json::from_str(&content)
                    .map_err(|e| ServerError::Config(format!("{}: {e}", path.display())))?;
                deep_merge(defaults, user)
            }
            _ => {
                debug!("no config file, using defaults");
                defaults
            }
        };

        let mut config: Self = serde_json::from_value(merged)
            .map_err(|e| ServerError::Config(e.to_string()))?;
        config.apply_env_overrides();
        Ok(config)
    }

    /// Apply environment variable overrides.
    ///
    /// Invalid or out-of-range values are silently ignored (fall back to
    /// file/default).
    pub fn apply_env_overrides(&mut self) {
        if let Some(v) = read_env("TETHER_HOST") {
            self.host = v;
        }
        if let Some(v) = read_env("TETHER_PORT").and_then(|v| parse_u16(&v, 0, 65535)) {
            self.port = v;
        }
        if let Some(v) =
            read_env("TETHER_MAX_CONNECTIONS").and_then(|v| parse_usize(&v, 1, 100_000))
        {
            self.max_connections = v;
        }
        if let Some(v) =
            read_env("TETHER_SWEEP_INTERVAL_SECS").and_then(|v| parse_u64(&v, 1, 3600))
        {
            self.sweep_interval_secs = v;
        }
        if let Some(v) =
            read_env("TETHER_MAX_MESSAGE_SIZE").and_then(|v| parse_usize(&v, 1, 64 * 1024 * 1024))
        {
            self.max_message_size = v;
        }
    }
}

/// Recursive deep merge of two JSON values.
///
/// - Objects are merged recursively (source overrides target per-key)
/// - Arrays and primitives are replaced entirely by source
/// - Null values in source are skipped (preserving target)
pub fn deep_merge(target: Value, source: Value) -> Value {
    match (target, source) {
        (Value::Object(mut target_map), Value::Object(source_map)) => {
            for (key, source_val) in source_map {
                if source_val.is_null() {
                    continue;
                }
                let merged = if let Some(target_val) = target_map.remove(&key) {
                    deep_merge(target_val, source_val)
                } else {
                    source_val
                };
                let _ = target_map.insert(key, merged);
            }
            Value::Object(target_map)
        }
        (_, source) => source,
    }
}

fn read_env(name: &str) -> Option<String> {
    std::env::var(name).ok().filter(|v| !v.is_empty())
}

fn parse_u16(value: &str, min: u16, max: u16) -> Option<u16> {
    value.parse::<u16>().ok().filter(|v| *v >= min && *v <= max)
}

fn parse_u64(value: &str, min: u64, max: u64) -> Option<u64> {
    value.parse::<u64>().ok().filter(|v| *v >= min && *v <= max)
}

fn parse_usize(value: &str, min: usize, max: usize) -> Option<usize> {
    value
        .parse::<usize>()
        .ok()
        .filter(|v| *v >= min && *v <= max)
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    #[test]
    fn defaults() {
        let config = ServerConfig::default();
        assert_eq!(config.host, "127.0.0.1");
        assert_eq!(config.port, 0);
        assert_eq!(config.max_connections, 50);
        assert_eq!(config.sweep_interval_secs, 30);
        assert_eq!(config.max_message_size, 1024 * 1024);
    }

    #[test]
    fn serde_roundtrip() {
        let config = ServerConfig::default();
        let json = serde_json::to_string(&config).unwrap();
        let back: ServerConfig = serde_json::from_str(&json).unwrap();
        assert_eq!(back.host, config.host);
        assert_eq!(back.sweep_interval_secs, config.sweep_interval_secs);
    }

    #[test]
    fn load_without_file_uses_defaults() {
        let config = ServerConfig::load(None).unwrap();
        assert_eq!(config.max_connections, 50);
    }

    #[test]
    fn load_missing_file_uses_defaults() {
        let config = ServerConfig::load(Some(Path::new("/no/such/tether.json"))).unwrap();
        assert_eq!(config.host, "127.0.0.1");
    }

    #[test]
    fn load_merges_partial_file_over_defaults() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        write!(file, r#"{{"port": 9100, "maxConnections": 8}}"#).unwrap();

        let config = ServerConfig::load(Some(file.path())).unwrap();
        assert_eq!(config.port, 9100);
        assert_eq!(config.max_connections, 8);
        // Untouched keys keep their defaults.
        assert_eq!(config.host, "127.0.0.1");
        assert_eq!(config.sweep_interval_secs, 30);
    }

    #[test]
    fn load_rejects_invalid_json() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        write!(file, "{{nope").unwrap();
        assert!(ServerConfig::load(Some(file.path())).is_err());
    }

    #[test]
    fn deep_merge_nested_objects() {
        let target = serde_json::json!({"a": {"x": 1, "y": 2}, "b": 3});
        let source = serde_json::json!({"a": {"y": 9}});
        let merged = deep_merge(target, source);
        assert_eq!(merged, serde_json::json!({"a": {"x": 1, "y": 9}, "b": 3}));
    }

    #[test]
    fn deep_merge_skips_nulls() {
        let target = serde_json::json!({"a": 1});
        let source = serde_json::json!({"a": null, "b": 2});
        let merged = deep_merge(target, source);
        assert_eq!(merged, serde_json::json!({"a": 1, "b": 2}));
    }

    #[test]
    fn deep_merge_replaces_arrays() {
        let target = serde_json::json!({"a": [1, 2, 3]});
        let source = serde_json::json!({"a": [9]});
        let merged = deep_merge(target, source);
        assert_eq!(merged, serde_json::json!({"a": [9]}));
    }

    #[test]
    fn strict_parsing_rejects_out_of_range() {
        assert_eq!(parse_u64("0", 1, 3600), None);
        assert_eq!(parse_u64("3601", 1, 3600), None);
        assert_eq!(parse_u64("30", 1, 3600), Some(30));
        assert_eq!(parse_u16("not-a-port", 0, 65535), None);
        assert_eq!(parse_usize("-1", 1, 10), None);
    }
}
