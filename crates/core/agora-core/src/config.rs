//! Layered configuration for Agora components.
//!
//! Sources are merged in the order they are added, later sources overriding
//! earlier ones key by key. The merged tree can be navigated by dotted path or
//! extracted into any `serde::Deserialize` settings type.

use crate::{traits::Validatable, AgoraError, AgoraResult};
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::path::Path;
use tracing::debug;

/// Separator between nesting levels in environment variable names
pub const ENV_NESTING_SEPARATOR: &str = "__";

/// Trait for configuration sources
pub trait ConfigSource {
    /// Load configuration from this source
    fn load(&self) -> AgoraResult<ConfigValue>;

    /// Get the source name
    fn source_name(&self) -> &str;
}

/// Configuration value that can hold different types
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub enum ConfigValue {
    /// String value
    String(String),
    /// Integer value
    Integer(i64),
    /// Float value
    Float(f64),
    /// Boolean value
    Boolean(bool),
    /// Array of values
    Array(Vec<ConfigValue>),
    /// Object/map of values
    Object(HashMap<String, ConfigValue>),
    /// Null value
    Null,
}

impl ConfigValue {
    /// Try to convert to string
    pub fn as_string(&self) -> AgoraResult<&str> {
        match self {
            ConfigValue::String(s) => Ok(s),
            _ => Err(AgoraError::config("Value is not a string")),
        }
    }

    /// Try to convert to integer
    pub fn as_integer(&self) -> AgoraResult<i64> {
        match self {
            ConfigValue::Integer(i) => Ok(*i),
            _ => Err(AgoraError::config("Value is not an integer")),
        }
    }

    /// Try to convert to float
    pub fn as_float(&self) -> AgoraResult<f64> {
        match self {
            ConfigValue::Float(f) => Ok(*f),
            #[allow(clippy::cast_precision_loss)]
            ConfigValue::Integer(i) => Ok(*i as f64),
            _ => Err(AgoraError::config("Value is not a number")),
        }
    }

    /// Try to convert to boolean
    pub fn as_boolean(&self) -> AgoraResult<bool> {
        match self {
            ConfigValue::Boolean(b) => Ok(*b),
            _ => Err(AgoraError::config("Value is not a boolean")),
        }
    }

    /// Try to convert to object
    pub fn as_object(&self) -> AgoraResult<&HashMap<String, ConfigValue>> {
        match self {
            ConfigValue::Object(obj) => Ok(obj),
            _ => Err(AgoraError::config("Value is not an object")),
        }
    }

    /// Check if value is null
    #[must_use]
    pub fn is_null(&self) -> bool {
        matches!(self, ConfigValue::Null)
    }

    /// Convert into a JSON value so it can feed `serde` deserialization
    #[must_use]
    pub fn to_json(&self) -> serde_json::Value {
        match self {
            ConfigValue::String(s) => serde_json::Value::String(s.clone()),
            ConfigValue::Integer(i) => serde_json::Value::from(*i),
            ConfigValue::Float(f) => serde_json::Number::from_f64(*f)
                .map_or(serde_json::Value::Null, serde_json::Value::Number),
            ConfigValue::Boolean(b) => serde_json::Value::Bool(*b),
            ConfigValue::Array(items) => {
                serde_json::Value::Array(items.iter().map(ConfigValue::to_json).collect())
            }
            ConfigValue::Object(map) => serde_json::Value::Object(
                map.iter().map(|(k, v)| (k.clone(), v.to_json())).collect(),
            ),
            ConfigValue::Null => serde_json::Value::Null,
        }
    }
}

/// File-based configuration source
pub struct FileConfigSource {
    path: std::path::PathBuf,
    format: ConfigFormat,
}

/// Supported configuration formats
#[derive(Debug, Clone, Copy)]
pub enum ConfigFormat {
    /// TOML format
    Toml,
    /// JSON format
    Json,
}

impl FileConfigSource {
    /// Create a new file config source
    pub fn new<P: AsRef<Path>>(path: P, format: ConfigFormat) -> Self {
        Self {
            path: path.as_ref().to_path_buf(),
            format,
        }
    }

    /// Auto-detect format from file extension
    pub fn auto_detect<P: AsRef<Path>>(path: P) -> AgoraResult<Self> {
        let path = path.as_ref();
        let format = match path.extension().and_then(|ext| ext.to_str()) {
            Some("toml") => ConfigFormat::Toml,
            Some("json") => ConfigFormat::Json,
            _ => {
                return Err(AgoraError::config(
                    "Cannot detect config format from file extension",
                ))
            }
        };

        Ok(Self::new(path, format))
    }
}

impl ConfigSource for FileConfigSource {
    fn load(&self) -> AgoraResult<ConfigValue> {
        let content = std::fs::read_to_string(&self.path)
            .map_err(|e| AgoraError::config(format!("Failed to read config file: {e}")))?;

        match self.format {
            ConfigFormat::Toml => {
                let value: toml::Value = content
                    .parse()
                    .map_err(|e| AgoraError::config(format!("Failed to parse TOML: {e}")))?;
                Ok(toml_value_to_config_value(value))
            }
            ConfigFormat::Json => {
                let value: serde_json::Value = serde_json::from_str(&content)
                    .map_err(|e| AgoraError::config(format!("Failed to parse JSON: {e}")))?;
                Ok(json_value_to_config_value(value))
            }
        }
    }

    fn source_name(&self) -> &str {
        self.path.to_str().unwrap_or("unknown")
    }
}

/// Environment variable configuration source
///
/// `AGORA__CONSENSUS__THRESHOLD=0.8` with prefix `AGORA` becomes
/// `consensus.threshold = 0.8`. Scalar values are parsed as bool, integer or
/// float before falling back to a string.
pub struct EnvConfigSource {
    prefix: String,
}

impl EnvConfigSource {
    /// Create a new environment config source with prefix
    pub fn new<S: Into<String>>(prefix: S) -> Self {
        Self {
            prefix: prefix.into(),
        }
    }

    /// Build a config tree from an explicit set of variables
    pub fn from_vars<I, K, V>(&self, vars: I) -> ConfigValue
    where
        I: IntoIterator<Item = (K, V)>,
        K: AsRef<str>,
        V: AsRef<str>,
    {
        let mut root = ConfigValue::Object(HashMap::new());

        for (key, value) in vars {
            let Some(rest) = key.as_ref().strip_prefix(&self.prefix) else {
                continue;
            };
            let rest = rest.trim_start_matches('_');
            if rest.is_empty() {
                continue;
            }

            let path: Vec<String> = rest
                .split(ENV_NESTING_SEPARATOR)
                .filter(|part| !part.is_empty())
                .map(str::to_lowercase)
                .collect();
            insert_path(&mut root, &path, parse_scalar(value.as_ref()));
        }

        root
    }
}

impl ConfigSource for EnvConfigSource {
    fn load(&self) -> AgoraResult<ConfigValue> {
        Ok(self.from_vars(std::env::vars()))
    }

    fn source_name(&self) -> &'static str {
        "environment"
    }
}

/// Configuration manager that combines multiple sources
pub struct ConfigManager {
    sources: Vec<Box<dyn ConfigSource>>,
    cache: Option<ConfigValue>,
}

impl ConfigManager {
    /// Create a new config manager
    #[must_use]
    pub fn new() -> Self {
        Self {
            sources: Vec::new(),
            cache: None,
        }
    }

    /// Add a configuration source
    #[must_use]
    pub fn add_source<S: ConfigSource + 'static>(mut self, source: S) -> Self {
        self.sources.push(Box::new(source));
        self
    }

    /// Load configuration from all sources
    pub fn load(&mut self) -> AgoraResult<&ConfigValue> {
        let mut merged = ConfigValue::Object(HashMap::new());

        for source in &self.sources {
            let config = source.load().map_err(|e| {
                AgoraError::config(format!("Failed to load from {}: {}", source.source_name(), e))
            })?;

            debug!(source = source.source_name(), "configuration source loaded");
            merged = merge_config_values(merged, config);
        }

        let cached = self.cache.insert(merged);
        Ok(&*cached)
    }

    /// Get a configuration value by path (e.g., "consensus.threshold")
    pub fn get(&self, path: &str) -> AgoraResult<&ConfigValue> {
        let config = self
            .cache
            .as_ref()
            .ok_or_else(|| AgoraError::config("Configuration not loaded"))?;

        get_config_value_by_path(config, path)
    }

    /// Deserialize the subtree at `path` (or the whole tree for `""`) into `T`
    pub fn extract<T: DeserializeOwned>(&self, path: &str) -> AgoraResult<T> {
        let value = if path.is_empty() {
            self.cache
                .as_ref()
                .ok_or_else(|| AgoraError::config("Configuration not loaded"))?
        } else {
            self.get(path)?
        };

        serde_json::from_value(value.to_json())
            .map_err(|e| AgoraError::config(format!("Invalid configuration at '{path}': {e}")))
    }

    /// Check if configuration is loaded
    #[must_use]
    pub fn is_loaded(&self) -> bool {
        self.cache.is_some()
    }
}

impl Default for ConfigManager {
    fn default() -> Self {
        Self::new()
    }
}

impl Validatable for ConfigManager {
    fn validate(&self) -> AgoraResult<()> {
        if self.cache.is_none() {
            return Err(AgoraError::config("Configuration not loaded"));
        }
        Ok(())
    }
}

fn parse_scalar(raw: &str) -> ConfigValue {
    if let Ok(b) = raw.parse::<bool>() {
        return ConfigValue::Boolean(b);
    }
    if let Ok(i) = raw.parse::<i64>() {
        return ConfigValue::Integer(i);
    }
    if let Ok(f) = raw.parse::<f64>() {
        if f.is_finite() {
            return ConfigValue::Float(f);
        }
    }
    ConfigValue::String(raw.to_string())
}

fn insert_path(root: &mut ConfigValue, path: &[String], value: ConfigValue) {
    let Some((head, tail)) = path.split_first() else {
        return;
    };

    if !matches!(root, ConfigValue::Object(_)) {
        *root = ConfigValue::Object(HashMap::new());
    }
    let ConfigValue::Object(map) = root else {
        return;
    };

    if tail.is_empty() {
        map.insert(head.clone(), value);
    } else {
        let child = map
            .entry(head.clone())
            .or_insert_with(|| ConfigValue::Object(HashMap::new()));
        insert_path(child, tail, value);
    }
}

fn toml_value_to_config_value(value: toml::Value) -> ConfigValue {
    match value {
        toml::Value::String(s) => ConfigValue::String(s),
        toml::Value::Integer(i) => ConfigValue::Integer(i),
        toml::Value::Float(f) => ConfigValue::Float(f),
        toml::Value::Boolean(b) => ConfigValue::Boolean(b),
        toml::Value::Array(arr) => {
            ConfigValue::Array(arr.into_iter().map(toml_value_to_config_value).collect())
        }
        toml::Value::Table(table) => ConfigValue::Object(
            table
                .into_iter()
                .map(|(k, v)| (k, toml_value_to_config_value(v)))
                .collect(),
        ),
        toml::Value::Datetime(dt) => ConfigValue::String(dt.to_string()),
    }
}

fn json_value_to_config_value(value: serde_json::Value) -> ConfigValue {
    match value {
        serde_json::Value::String(s) => ConfigValue::String(s),
        serde_json::Value::Number(n) => {
            if let Some(i) = n.as_i64() {
                ConfigValue::Integer(i)
            } else if let Some(f) = n.as_f64() {
                ConfigValue::Float(f)
            } else {
                ConfigValue::String(n.to_string())
            }
        }
        serde_json::Value::Bool(b) => ConfigValue::Boolean(b),
        serde_json::Value::Array(arr) => {
            ConfigValue::Array(arr.into_iter().map(json_value_to_config_value).collect())
        }
        serde_json::Value::Object(obj) => ConfigValue::Object(
            obj.into_iter()
                .map(|(k, v)| (k, json_value_to_config_value(v)))
                .collect(),
        ),
        serde_json::Value::Null => ConfigValue::Null,
    }
}

fn merge_config_values(base: ConfigValue, overlay: ConfigValue) -> ConfigValue {
    match (base, overlay) {
        (ConfigValue::Object(mut base_map), ConfigValue::Object(overlay_map)) => {
            for (key, value) in overlay_map {
                let merged = match base_map.remove(&key) {
                    Some(existing) => merge_config_values(existing, value),
                    None => value,
                };
                base_map.insert(key, merged);
            }
            ConfigValue::Object(base_map)
        }
        (_, overlay) => overlay,
    }
}

fn get_config_value_by_path<'a>(config: &'a ConfigValue, path: &str) -> AgoraResult<&'a ConfigValue> {
    let mut current = config;

    for part in path.split('.') {
        match current {
            ConfigValue::Object(map) => {
                current = map
                    .get(part)
                    .ok_or_else(|| AgoraError::config(format!("Path '{path}' not found")))?;
            }
            _ => {
                return Err(AgoraError::config(format!(
                    "Cannot navigate path '{path}' on non-object value"
                )))
            }
        }
    }

    Ok(current)
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    #[derive(Debug, Deserialize, PartialEq)]
    struct Consensus {
        threshold: f64,
        verifier_timeout_ms: u64,
    }

    #[test]
    fn test_config_value_conversions() {
        let string_val = ConfigValue::String("test".to_string());
        assert_eq!(string_val.as_string().unwrap(), "test");
        assert!(string_val.as_integer().is_err());

        let int_val = ConfigValue::Integer(42);
        assert_eq!(int_val.as_integer().unwrap(), 42);
        assert_eq!(int_val.as_float().unwrap(), 42.0);

        assert!(ConfigValue::Boolean(true).as_boolean().unwrap());
        assert!(ConfigValue::Null.is_null());
    }

    #[test]
    fn test_config_path_navigation() {
        let mut inner_map = HashMap::new();
        inner_map.insert("threshold".to_string(), ConfigValue::Float(0.7));

        let mut outer_map = HashMap::new();
        outer_map.insert("consensus".to_string(), ConfigValue::Object(inner_map));

        let config = ConfigValue::Object(outer_map);

        let threshold = get_config_value_by_path(&config, "consensus.threshold").unwrap();
        assert_eq!(threshold.as_float().unwrap(), 0.7);

        assert!(get_config_value_by_path(&config, "consensus.quorum").is_err());
        assert!(get_config_value_by_path(&config, "nonexistent").is_err());
    }

    #[test]
    fn test_env_vars_nest_and_parse() {
        let source = EnvConfigSource::new("AGORA_TEST");
        let tree = source.from_vars([
            ("AGORA_TEST__CONSENSUS__THRESHOLD", "0.8"),
            ("AGORA_TEST__CONSENSUS__VERIFIER_TIMEOUT_MS", "250"),
            ("AGORA_TEST__ROUTER__TRACE", "true"),
            ("UNRELATED", "ignored"),
        ]);

        let root = tree.as_object().unwrap();
        assert!(!root.contains_key("unrelated"));

        let consensus = root["consensus"].as_object().unwrap();
        assert_eq!(consensus["threshold"], ConfigValue::Float(0.8));
        assert_eq!(consensus["verifier_timeout_ms"], ConfigValue::Integer(250));

        let router = root["router"].as_object().unwrap();
        assert_eq!(router["trace"], ConfigValue::Boolean(true));
    }

    #[test]
    fn test_file_then_env_overlay_extracts_typed_settings() {
        let mut file = tempfile::Builder::new().suffix(".toml").tempfile().unwrap();
        writeln!(file, "[consensus]\nthreshold = 0.7\nverifier_timeout_ms = 1000").unwrap();

        struct FixedSource(ConfigValue);
        impl ConfigSource for FixedSource {
            fn load(&self) -> AgoraResult<ConfigValue> {
                Ok(self.0.clone())
            }
            fn source_name(&self) -> &str {
                "fixed"
            }
        }

        let overlay = EnvConfigSource::new("AGORA").from_vars([("AGORA__CONSENSUS__THRESHOLD", "0.9")]);

        let mut manager = ConfigManager::new()
            .add_source(FileConfigSource::auto_detect(file.path()).unwrap())
            .add_source(FixedSource(overlay));
        assert!(manager.validate().is_err());

        manager.load().unwrap();
        assert!(manager.is_loaded());

        let consensus: Consensus = manager.extract("consensus").unwrap();
        assert_eq!(
            consensus,
            Consensus {
                threshold: 0.9,
                verifier_timeout_ms: 1000
            }
        );
    }

    #[test]
    fn test_unknown_extension_is_rejected() {
        assert!(FileConfigSource::auto_detect("settings.ini").is_err());
    }

    #[test]
    fn test_missing_file_reports_source() {
        let mut manager = ConfigManager::new()
            .add_source(FileConfigSource::new("/nonexistent/agora.toml", ConfigFormat::Toml));
        let err = manager.load().unwrap_err();
        assert!(err.to_string().contains("/nonexistent/agora.toml"));
    }
}
