//! Federation configuration with sensible defaults.
//!
//! [`FederationConfig`] is deserialized from the portal configuration
//! document. Backend definitions keep their type-specific options as raw
//! JSON — each adapter factory deserializes its own option struct, so an
//! invalid option set disables one backend instead of the whole search.

use crate::error::SearchError;
use serde::Deserialize;
use std::collections::BTreeMap;

fn default_min_characters() -> usize {
    3
}

fn default_zoom_level() -> u32 {
    9
}

fn default_timeout_seconds() -> u64 {
    8
}

/// Configuration surface of the search federation.
#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct FederationConfig {
    /// Minimum query length before any backend is dispatched.
    #[serde(default = "default_min_characters")]
    pub min_characters: usize,
    /// Zoom level applied when recentering on a result.
    #[serde(default = "default_zoom_level")]
    pub zoom_level: u32,
    /// Per-request HTTP timeout in seconds.
    #[serde(default = "default_timeout_seconds")]
    pub timeout_seconds: u64,
    /// Icon shown for a result, keyed by its primary interaction action.
    #[serde(default)]
    pub hit_icons: BTreeMap<String, String>,
    /// Ordered backend definitions; order decides duplicate-id suffixes.
    #[serde(default)]
    pub backends: Vec<BackendDefinition>,
}

impl Default for FederationConfig {
    fn default() -> Self {
        Self {
            min_characters: default_min_characters(),
            zoom_level: default_zoom_level(),
            timeout_seconds: default_timeout_seconds(),
            hit_icons: BTreeMap::new(),
            backends: Vec::new(),
        }
    }
}

/// One configured backend: a type tag plus type-specific options.
#[derive(Debug, Clone, Deserialize)]
pub struct BackendDefinition {
    #[serde(rename = "type")]
    pub kind: String,
    #[serde(flatten)]
    pub options: serde_json::Map<String, serde_json::Value>,
}

impl BackendDefinition {
    /// The options as a JSON value for adapter-side deserialization.
    pub fn options_value(&self) -> serde_json::Value {
        serde_json::Value::Object(self.options.clone())
    }
}

impl FederationConfig {
    /// Validates this configuration, returning an error if any field is
    /// invalid.
    ///
    /// Checks:
    /// - `min_characters` must be greater than 0
    /// - `timeout_seconds` must be greater than 0
    /// - `backends` must not be empty
    pub fn validate(&self) -> Result<(), SearchError> {
        if self.min_characters == 0 {
            return Err(SearchError::Config(
                "minCharacters must be greater than 0".into(),
            ));
        }
        if self.timeout_seconds == 0 {
            return Err(SearchError::Config(
                "timeoutSeconds must be greater than 0".into(),
            ));
        }
        if self.backends.is_empty() {
            return Err(SearchError::Config(
                "at least one search backend must be configured".into(),
            ));
        }
        Ok(())
    }
}
