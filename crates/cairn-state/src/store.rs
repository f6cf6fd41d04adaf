use std::io::ErrorKind;
use std::path::{Path, PathBuf};

use async_trait::async_trait;
use tokio::sync::RwLock;

use crate::error::StoreError;
use crate::types::StackState;

/// Loads and saves the state of one stack.
#[async_trait]
pub trait StateStore: Send + Sync {
  /// Load the last saved state. A store that was never written returns an
  /// empty state.
  async fn load(&self) -> Result<StackState, StoreError>;

  /// Replace the saved state.
  async fn save(&self, state: &StackState) -> Result<(), StoreError>;
}

/// Keeps state in memory. Useful for tests and short-lived processes.
#[derive(Debug, Default)]
pub struct MemoryStore {
  state: RwLock<StackState>,
}

impl MemoryStore {
  pub fn new() -> Self {
    Self::default()
  }

  /// Start from an existing state.
  pub fn with_state(state: StackState) -> Self {
    Self {
      state: RwLock::new(state),
    }
  }
}

#[async_trait]
impl StateStore for MemoryStore {
  async fn load(&self) -> Result<StackState, StoreError> {
    Ok(self.state.read().await.clone())
  }

  async fn save(&self, state: &StackState) -> Result<(), StoreError> {
    *self.state.write().await = state.clone();
    Ok(())
  }
}

/// Stores state as a pretty-printed JSON document.
///
/// Writes go to a sibling temporary file that is then renamed over the
/// target, so a crash mid-write leaves the previous state intact.
#[derive(Debug, Clone)]
pub struct JsonFileStore {
  path: PathBuf,
}

impl JsonFileStore {
  pub fn new(path: impl Into<PathBuf>) -> Self {
    Self { path: path.into() }
  }

  pub fn path(&self) -> &Path {
    &self.path
  }

  fn io_error(&self, source: std::io::Error) -> StoreError {
    StoreError::Io {
      path: self.path.clone(),
      source,
    }
  }
}

#[async_trait]
impl StateStore for JsonFileStore {
  async fn load(&self) -> Result<StackState, StoreError> {
    let contents = match tokio::fs::read(&self.path).await {
      Ok(contents) => contents,
      Err(e) if e.kind() == ErrorKind::NotFound => return Ok(StackState::default()),
      Err(e) => return Err(self.io_error(e)),
    };
    Ok(serde_json::from_slice(&contents)?)
  }

  async fn save(&self, state: &StackState) -> Result<(), StoreError> {
    if let Some(parent) = self.path.parent().filter(|p| !p.as_os_str().is_empty()) {
      tokio::fs::create_dir_all(parent)
        .await
        .map_err(|e| self.io_error(e))?;
    }

    let contents = serde_json::to_vec_pretty(state)?;
    let mut tmp = self.path.clone().into_os_string();
    tmp.push(".tmp");
    let tmp = PathBuf::from(tmp);

    tokio::fs::write(&tmp, contents)
      .await
      .map_err(|e| self.io_error(e))?;
    tokio::fs::rename(&tmp, &self.path)
      .await
      .map_err(|e| self.io_error(e))?;
    Ok(())
  }
}
