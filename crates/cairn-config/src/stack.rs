//! Stack configuration.
//!
//! Values are stored flat under `namespace:key` names, the same shape as a
//! stack settings file:
//!
//! ```json
//! {
//!   "gcp:project": "fog-serverless",
//!   "gcp:region": "us-central1"
//! }
//! ```

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

use crate::error::ConfigError;

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct StackConfig {
  values: BTreeMap<String, serde_json::Value>,
}

impl StackConfig {
  pub fn new() -> Self {
    Self::default()
  }

  pub fn from_json_str(content: &str) -> Result<Self, ConfigError> {
    let value: serde_json::Value = serde_json::from_str(content)?;
    let serde_json::Value::Object(map) = value else {
      return Err(ConfigError::NotAnObject);
    };
    Ok(Self {
      values: map.into_iter().collect(),
    })
  }

  /// Set a fully-qualified `namespace:key` value.
  pub fn set(&mut self, key: impl Into<String>, value: impl Into<serde_json::Value>) {
    self.values.insert(key.into(), value.into());
  }

  pub fn get(&self, key: &str) -> Option<&serde_json::Value> {
    self.values.get(key)
  }

  /// View the values of a single namespace, e.g. `config.namespace("gcp")`.
  pub fn namespace(&self, namespace: impl Into<String>) -> NamespacedConfig<'_> {
    NamespacedConfig {
      config: self,
      namespace: namespace.into(),
    }
  }

  pub fn len(&self) -> usize {
    self.values.len()
  }

  pub fn is_empty(&self) -> bool {
    self.values.is_empty()
  }
}

/// Read access to the keys of one namespace.
#[derive(Debug, Clone)]
pub struct NamespacedConfig<'a> {
  config: &'a StackConfig,
  namespace: String,
}

impl NamespacedConfig<'_> {
  fn full_key(&self, key: &str) -> String {
    format!("{}:{}", self.namespace, key)
  }

  pub fn get(&self, key: &str) -> Option<&serde_json::Value> {
    self.config.get(&self.full_key(key))
  }

  pub fn get_str(&self, key: &str) -> Option<&str> {
    self.get(key).and_then(|v| v.as_str())
  }

  /// Return the value or `default` when the key is absent.
  pub fn get_or(&self, key: &str, default: impl Into<serde_json::Value>) -> serde_json::Value {
    self.get(key).cloned().unwrap_or_else(|| default.into())
  }

  pub fn require(&self, key: &str) -> Result<&serde_json::Value, ConfigError> {
    self.get(key).ok_or_else(|| ConfigError::MissingKey {
      key: self.full_key(key),
    })
  }

  pub fn require_str(&self, key: &str) -> Result<&str, ConfigError> {
    self
      .require(key)?
      .as_str()
      .ok_or_else(|| ConfigError::InvalidType {
        key: self.full_key(key),
        expected: "string",
      })
  }
}
