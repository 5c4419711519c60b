//! Untyped backend configuration and typed decoding

use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use thiserror::Error;

/// Untyped backend configuration, keyed by attribute name
pub type ConfigMap = serde_json::Map<String, Value>;

/// A configuration value could not be decoded into its declared type
#[derive(Debug, Clone, Error, PartialEq)]
#[error("Failed to decode {target} configuration: {message}")]
pub struct DecodeError {
    /// Name of the configuration shape being decoded
    pub target: &'static str,
    /// Underlying decoder message
    pub message: String,
}

/// Remote state requested by the caller
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct RemoteState {
    /// Backend kind (e.g., "azurerm")
    pub backend: String,
    /// Backend attributes, including tool-only keys
    #[serde(default)]
    pub config: ConfigMap,
}

impl RemoteState {
    pub fn new(backend: impl Into<String>, config: ConfigMap) -> Self {
        Self {
            backend: backend.into(),
            config,
        }
    }
}

/// Decode recognised keys of `config` into `T`
///
/// Keys that `T` does not declare are ignored. A `null` value leaves the field
/// at its default. A declared key holding a value of the wrong type fails the
/// whole decode.
pub fn decode<T: DeserializeOwned>(
    target: &'static str,
    config: &ConfigMap,
) -> Result<T, DecodeError> {
    serde_json::from_value(Value::Object(strip_nulls(config))).map_err(|e| DecodeError {
        target,
        message: e.to_string(),
    })
}

/// Copy `config` without the given keys
pub fn strip_keys(config: &ConfigMap, keys: &[&str]) -> ConfigMap {
    config
        .iter()
        .filter(|(key, _)| !keys.contains(&key.as_str()))
        .map(|(key, value)| (key.clone(), value.clone()))
        .collect()
}

/// Copy `config` without attributes that are explicitly `null`
pub fn strip_nulls(config: &ConfigMap) -> ConfigMap {
    config
        .iter()
        .filter(|(_, value)| !value.is_null())
        .map(|(key, value)| (key.clone(), value.clone()))
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[derive(Debug, Default, Deserialize)]
    #[serde(default)]
    struct Sample {
        name: String,
        enabled: bool,
    }

    fn map(value: Value) -> ConfigMap {
        match value {
            Value::Object(map) => map,
            _ => panic!("expected an object"),
        }
    }

    #[test]
    fn test_decode_ignores_unknown_keys() {
        let config = map(json!({"name": "state", "unknown": 42}));
        let sample: Sample = decode("sample", &config).unwrap();
        assert_eq!(sample.name, "state");
        assert!(!sample.enabled);
    }

    #[test]
    fn test_decode_rejects_wrong_type() {
        let config = map(json!({"name": true}));
        let err = decode::<Sample>("sample", &config).unwrap_err();
        assert_eq!(err.target, "sample");
        assert!(err.to_string().starts_with("Failed to decode sample configuration"));
    }

    #[test]
    fn test_decode_null_keeps_default() {
        let config = map(json!({"name": null, "enabled": null}));
        let sample: Sample = decode("sample", &config).unwrap();
        assert_eq!(sample.name, "");
        assert!(!sample.enabled);
    }

    #[test]
    fn test_strip_nulls() {
        let config = map(json!({"a": null, "b": false, "c": ""}));
        assert_eq!(strip_nulls(&config), map(json!({"b": false, "c": ""})));
    }

    #[test]
    fn test_strip_keys() {
        let config = map(json!({"a": 1, "b": 2, "c": 3}));
        let stripped = strip_keys(&config, &["b", "missing"]);
        assert_eq!(stripped, map(json!({"a": 1, "c": 3})));
        // input untouched
        assert_eq!(config.len(), 3);
    }

    #[test]
    fn test_remote_state_deserialization() {
        let state: RemoteState = serde_json::from_value(json!({
            "backend": "azurerm",
            "config": {"key": "prod.tfstate"}
        }))
        .unwrap();
        assert_eq!(state.backend, "azurerm");
        assert_eq!(state.config.get("key"), Some(&json!("prod.tfstate")));
    }
}
