use thiserror::Error;

#[derive(Debug, Error)]
pub enum ConfigError {
  #[error("missing required configuration value: {key}")]
  MissingKey { key: String },

  #[error("configuration value '{key}' is not a {expected}")]
  InvalidType { key: String, expected: &'static str },

  #[error("stack configuration must be a JSON object of \"namespace:key\" entries")]
  NotAnObject,

  #[error("failed to parse configuration: {0}")]
  Parse(#[from] serde_json::Error),
}
