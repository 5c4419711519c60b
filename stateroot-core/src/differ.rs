//! Differ - Compare a requested backend configuration with the recorded one
//!
//! Decides whether remote state targeting has changed since the backend was
//! last initialised. The recorded snapshot is never modified; comparisons run
//! against normalised copies.

use serde_json::Value;

use crate::config::{ConfigMap, strip_keys, strip_nulls};
use crate::snapshot::BackendSnapshot;

/// Result of comparing a fresh configuration with a snapshot
#[derive(Debug, Clone, PartialEq)]
pub enum ConfigDiff {
    /// Nothing changed
    NoChange,
    /// No backend was recorded, but one is now configured
    NoPreviousBackend,
    /// The backend kind itself changed
    BackendTypeChanged { from: String, to: String },
    /// Same kind, different attributes
    Changed { changed_keys: Vec<String> },
}

impl ConfigDiff {
    /// Returns whether this diff requires reinitialisation
    pub fn is_change(&self) -> bool {
        !matches!(self, ConfigDiff::NoChange)
    }
}

/// Compare `fresh` against `snapshot` for a backend of kind `backend_type`
///
/// `tool_only_keys` are removed from `fresh` before comparison since they are
/// never recorded by the infrastructure tool. Attributes set to `null` on
/// either side count as unset.
pub fn diff_config(
    fresh: &ConfigMap,
    snapshot: Option<&BackendSnapshot>,
    backend_type: &str,
    tool_only_keys: &[&str],
) -> ConfigDiff {
    let fresh = &strip_nulls(fresh);
    let Some(snapshot) = snapshot else {
        return if fresh.is_empty() {
            ConfigDiff::NoChange
        } else {
            ConfigDiff::NoPreviousBackend
        };
    };

    if snapshot.backend_type != backend_type {
        return ConfigDiff::BackendTypeChanged {
            from: snapshot.backend_type.clone(),
            to: backend_type.to_string(),
        };
    }

    let recorded = strip_nulls(&snapshot.config);
    if fresh.is_empty() && recorded.is_empty() {
        return ConfigDiff::NoChange;
    }

    let comparison = strip_keys(fresh, tool_only_keys);
    let recorded = normalized_snapshot_config(&recorded, fresh);

    let changed_keys = find_changed_keys(&comparison, &recorded);
    if changed_keys.is_empty() {
        ConfigDiff::NoChange
    } else {
        ConfigDiff::Changed { changed_keys }
    }
}

/// Returns true when `fresh` matches `snapshot`, logging the reason otherwise
pub fn configs_equal(
    fresh: &ConfigMap,
    snapshot: Option<&BackendSnapshot>,
    backend_type: &str,
    tool_only_keys: &[&str],
) -> bool {
    match diff_config(fresh, snapshot, backend_type, tool_only_keys) {
        ConfigDiff::NoChange => true,
        ConfigDiff::NoPreviousBackend => {
            log::debug!("No {} backend recorded yet", backend_type);
            false
        }
        ConfigDiff::BackendTypeChanged { from, to } => {
            log::debug!("Backend type has changed from {} to {}", from, to);
            false
        }
        ConfigDiff::Changed { changed_keys } => {
            log::debug!(
                "Backend config changed ({}): recorded {:?}, requested {:?}",
                changed_keys.join(", "),
                snapshot.map(|s| &s.config),
                fresh
            );
            false
        }
    }
}

/// Copy of the recorded config with string booleans coerced
///
/// Persisted backend configuration may have round-tripped through a
/// string-typed format. A recorded string is parsed as a boolean when the
/// fresh value under the same key is a boolean; unparsable strings are kept.
pub fn normalized_snapshot_config(recorded: &ConfigMap, fresh: &ConfigMap) -> ConfigMap {
    recorded
        .iter()
        .map(|(key, value)| {
            let normalized = match (value, fresh.get(key)) {
                (Value::String(s), Some(Value::Bool(_))) => {
                    parse_bool_str(s).map(Value::Bool).unwrap_or_else(|| value.clone())
                }
                _ => value.clone(),
            };
            (key.clone(), normalized)
        })
        .collect()
}

/// Parse the boolean spellings accepted by the infrastructure tool
pub fn parse_bool_str(s: &str) -> Option<bool> {
    match s {
        "1" | "t" | "T" | "TRUE" | "true" | "True" => Some(true),
        "0" | "f" | "F" | "FALSE" | "false" | "False" => Some(false),
        _ => None,
    }
}

/// Keys whose values differ, or which only one side has, in sorted order
fn find_changed_keys(fresh: &ConfigMap, recorded: &ConfigMap) -> Vec<String> {
    let mut changed: Vec<String> = fresh
        .iter()
        .filter(|(key, value)| recorded.get(key.as_str()) != Some(*value))
        .map(|(key, _)| key.clone())
        .chain(
            recorded
                .keys()
                .filter(|key| !fresh.contains_key(key.as_str()))
                .cloned(),
        )
        .collect();

    changed.sort();
    changed
}
