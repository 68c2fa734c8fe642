//! Configuration loading
//!
//! Reads a JSON5 file and layers environment overrides on top:
//!
//! | Variable                     | Path             |
//! |------------------------------|------------------|
//! | `COURTSIDE_GEMINI_API_KEY`   | `gemini.apiKey`  |
//! | `GEMINI_API_KEY` (fallback)  | `gemini.apiKey`  |
//! | `COURTSIDE_GEMINI_BASE_URL`  | `gemini.baseUrl` |
//! | `COURTSIDE_GEMINI_MODEL`     | `gemini.model`   |
//! | `COURTSIDE_BIND`             | `server.bind`    |
//! | `COURTSIDE_PORT`             | `server.port`    |
//!
//! The file location is `$COURTSIDE_CONFIG_PATH`, else
//! `<config dir>/courtside/courtside.json5`. A missing file is not an error.

pub mod types;

use std::path::{Path, PathBuf};

use serde_json::Value;
use thiserror::Error;

pub use types::{Config, ConfigIssue, GeminiConfig, ServerConfig, DEFAULT_PORT};

/// Environment variable that overrides the config file location.
pub const CONFIG_PATH_ENV: &str = "COURTSIDE_CONFIG_PATH";

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("failed to read config file {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("failed to parse config file {path}: {message}")]
    Parse { path: PathBuf, message: String },

    #[error("invalid configuration: {0}")]
    Invalid(String),
}

/// Resolved config file path.
pub fn get_config_path() -> PathBuf {
    if let Some(path) = std::env::var_os(CONFIG_PATH_ENV) {
        return PathBuf::from(path);
    }
    dirs::config_dir()
        .unwrap_or_else(|| PathBuf::from("."))
        .join("courtside")
        .join("courtside.json5")
}

/// Load the raw config (file plus environment) from the default location.
pub fn load_config() -> Result<Value, ConfigError> {
    let mut value = load_config_file(&get_config_path())?;
    apply_env_overrides(&mut value, |key| std::env::var(key).ok());
    Ok(value)
}

/// Load and validate the typed config from the default location.
pub fn load() -> Result<Config, ConfigError> {
    from_value(load_config()?)
}

/// Convert a raw config value into a validated [`Config`].
pub fn from_value(value: Value) -> Result<Config, ConfigError> {
    let config: Config =
        serde_json::from_value(value).map_err(|e| ConfigError::Invalid(e.to_string()))?;
    config.validate().map_err(|issues| {
        ConfigError::Invalid(
            issues
                .iter()
                .map(ToString::to_string)
                .collect::<Vec<_>>()
                .join("; "),
        )
    })?;
    Ok(config)
}

/// Read a JSON5 file. Missing file yields an empty object.
pub fn load_config_file(path: &Path) -> Result<Value, ConfigError> {
    let content = match std::fs::read_to_string(path) {
        Ok(content) => content,
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
            tracing::debug!(path = %path.display(), "No config file, using defaults");
            return Ok(Value::Object(serde_json::Map::new()));
        }
        Err(source) => {
            return Err(ConfigError::Io {
                path: path.to_path_buf(),
                source,
            })
        }
    };

    let value: Value = json5::from_str(&content).map_err(|e| ConfigError::Parse {
        path: path.to_path_buf(),
        message: e.to_string(),
    })?;
    if !value.is_object() {
        return Err(ConfigError::Parse {
            path: path.to_path_buf(),
            message: "top-level value must be an object".to_string(),
        });
    }
    Ok(value)
}

/// Layer environment variables over `value`. `env` is a lookup so tests do
/// not have to touch the process environment.
pub fn apply_env_overrides(value: &mut Value, env: impl Fn(&str) -> Option<String>) {
    let non_empty = |key: &str| env(key).filter(|v| !v.trim().is_empty());

    if let Some(key) = non_empty("COURTSIDE_GEMINI_API_KEY").or_else(|| non_empty("GEMINI_API_KEY"))
    {
        set_value_at_path(value, "gemini.apiKey", Value::String(key));
    }
    if let Some(url) = non_empty("COURTSIDE_GEMINI_BASE_URL") {
        set_value_at_path(value, "gemini.baseUrl", Value::String(url));
    }
    if let Some(model) = non_empty("COURTSIDE_GEMINI_MODEL") {
        set_value_at_path(value, "gemini.model", Value::String(model));
    }
    if let Some(bind) = non_empty("COURTSIDE_BIND") {
        set_value_at_path(value, "server.bind", Value::String(bind));
    }
    if let Some(port) = non_empty("COURTSIDE_PORT") {
        match port.trim().parse::<u16>() {
            Ok(port) => set_value_at_path(value, "server.port", Value::from(port)),
            Err(_) => tracing::warn!(value = %port, "Ignoring invalid COURTSIDE_PORT"),
        }
    }
}

/// Navigate a JSON value by dot-notation path and return the leaf value.
pub fn get_value_at_path(root: &Value, path: &str) -> Option<Value> {
    let mut current = root;
    for part in path.split('.') {
        current = current.as_object()?.get(part)?;
    }
    Some(current.clone())
}

/// Set a value at a dot-notation path, creating intermediate objects as needed.
/// Scalars found along the path are replaced by objects.
pub fn set_value_at_path(root: &mut Value, path: &str, value: Value) {
    if !root.is_object() {
        *root = Value::Object(serde_json::Map::new());
    }
    if let Value::Object(map) = root {
        set_in_map(map, path, value);
    }
}

fn set_in_map(map: &mut serde_json::Map<String, Value>, path: &str, value: Value) {
    match path.split_once('.') {
        None => {
            map.insert(path.to_string(), value);
        }
        Some((head, rest)) => {
            let child = map
                .entry(head.to_string())
                .or_insert_with(|| Value::Object(serde_json::Map::new()));
            set_value_at_path(child, rest, value);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    fn env_from(pairs: &[(&str, &str)]) -> impl Fn(&str) -> Option<String> {
        let map: HashMap<String, String> = pairs
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect();
        move |key| map.get(key).cloned()
    }

    #[test]
    fn test_missing_file_is_empty_object() {
        let dir = tempfile::tempdir().unwrap();
        let value = load_config_file(&dir.path().join("absent.json5")).unwrap();
        assert_eq!(value, serde_json::json!({}));
    }

    #[test]
    fn test_json5_file_parses() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("courtside.json5");
        std::fs::write(
            &path,
            "{\n  // local dev\n  server: { port: 9100 },\n  gemini: { model: 'gemini-1.5-pro', },\n}\n",
        )
        .unwrap();

        let config = from_value(load_config_file(&path).unwrap()).unwrap();
        assert_eq!(config.server.port, 9100);
        assert_eq!(config.gemini.model, "gemini-1.5-pro");
    }

    #[test]
    fn test_malformed_file_is_parse_error() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("bad.json5");
        std::fs::write(&path, "{ server: ").unwrap();
        assert!(matches!(
            load_config_file(&path),
            Err(ConfigError::Parse { .. })
        ));
    }

    #[test]
    fn test_non_object_file_is_rejected() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("list.json5");
        std::fs::write(&path, "[1, 2]").unwrap();
        assert!(matches!(
            load_config_file(&path),
            Err(ConfigError::Parse { .. })
        ));
    }

    #[test]
    fn test_env_overrides_file_values() {
        let mut value = serde_json::json!({"gemini": {"apiKey": "from-file"}, "server": {"port": 1}});
        apply_env_overrides(
            &mut value,
            env_from(&[
                ("COURTSIDE_GEMINI_API_KEY", "from-env"),
                ("COURTSIDE_PORT", "9200"),
                ("COURTSIDE_GEMINI_MODEL", "gemini-test"),
            ]),
        );
        assert_eq!(value["gemini"]["apiKey"], "from-env");
        assert_eq!(value["gemini"]["model"], "gemini-test");
        assert_eq!(value["server"]["port"], 9200);
    }

    #[test]
    fn test_generic_gemini_key_is_fallback() {
        let mut value = serde_json::json!({});
        apply_env_overrides(&mut value, env_from(&[("GEMINI_API_KEY", "generic")]));
        assert_eq!(value["gemini"]["apiKey"], "generic");

        let mut value = serde_json::json!({});
        apply_env_overrides(
            &mut value,
            env_from(&[("GEMINI_API_KEY", "generic"), ("COURTSIDE_GEMINI_API_KEY", "specific")]),
        );
        assert_eq!(value["gemini"]["apiKey"], "specific");
    }

    #[test]
    fn test_blank_and_invalid_env_values_ignored() {
        let mut value = serde_json::json!({"server": {"port": 1}});
        apply_env_overrides(
            &mut value,
            env_from(&[("COURTSIDE_GEMINI_API_KEY", "  "), ("COURTSIDE_PORT", "http")]),
        );
        assert_eq!(value, serde_json::json!({"server": {"port": 1}}));
    }

    #[test]
    fn test_invalid_config_is_reported() {
        let err = from_value(serde_json::json!({"server": {"bind": "???"}})).unwrap_err();
        assert!(err.to_string().contains("server"), "{err}");
    }

    #[test]
    fn test_get_value_at_path() {
        let val = serde_json::json!({"server": {"port": 9000}});
        assert_eq!(get_value_at_path(&val, "server.port"), Some(serde_json::json!(9000)));
        assert_eq!(get_value_at_path(&val, "server.bind"), None);
        assert_eq!(get_value_at_path(&val, "server.port.x"), None);
    }

    #[test]
    fn test_set_value_at_path_creates_intermediate() {
        let mut val = serde_json::json!({});
        set_value_at_path(&mut val, "a.b.c", serde_json::json!(42));
        assert_eq!(val["a"]["b"]["c"], 42);
    }

    #[test]
    fn test_set_value_at_path_on_non_object_root() {
        let mut val = serde_json::json!([1, 2]);
        set_value_at_path(&mut val, "server.port", serde_json::json!(9000));
        assert_eq!(val, serde_json::json!({"server": {"port": 9000}}));
    }

    #[test]
    fn test_set_value_at_path_replaces_scalar_parent() {
        let mut val = serde_json::json!({"gemini": "oops"});
        set_value_at_path(&mut val, "gemini.model", serde_json::json!("m"));
        assert_eq!(val["gemini"]["model"], "m");
    }
}
