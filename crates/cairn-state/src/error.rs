use std::path::PathBuf;

/// Error type for state store operations.
#[derive(Debug, thiserror::Error)]
pub enum StoreError {
  #[error("failed to access state file '{}': {source}", path.display())]
  Io {
    path: PathBuf,
    #[source]
    source: std::io::Error,
  },

  #[error("invalid state document: {0}")]
  Serialization(#[from] serde_json::Error),
}
