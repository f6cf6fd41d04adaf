use cairn_graph::{CycleError, GraphError};
use cairn_provider::ProviderError;
use cairn_state::StoreError;
use cairn_value::DeferredError;
use thiserror::Error;

/// Errors that stop a run before (or instead of) provisioning anything.
#[derive(Debug, Error)]
pub enum EngineError {
  #[error(transparent)]
  Graph(#[from] GraphError),

  #[error("no provider registered for kind '{kind}' (resource '{node}')")]
  MissingProvider { kind: String, node: String },

  #[error("state store error: {0}")]
  Store(#[from] StoreError),
}

impl EngineError {
  pub fn cycle(&self) -> Option<&CycleError> {
    match self {
      EngineError::Graph(GraphError::Cycle(cycle)) => Some(cycle),
      _ => None,
    }
  }
}

/// Why a single node (or deletion) failed.
#[derive(Debug, Clone, PartialEq, Error)]
pub enum NodeError {
  /// `upstream` failed, so this node was never provisioned. `origin` is the
  /// node where the failure started.
  #[error("upstream dependency '{upstream}' failed (origin '{origin}')")]
  UpstreamDependencyFailed { upstream: String, origin: String },

  #[error("failed to resolve input '{field}': {source}")]
  InputResolution {
    field: String,
    #[source]
    source: DeferredError,
  },

  #[error(transparent)]
  Provider(#[from] ProviderError),

  /// The run was cancelled while the node was waiting to retry.
  #[error("cancelled before the operation completed")]
  Cancelled,

  /// The provisioning task panicked or was aborted.
  #[error("provisioning task aborted: {message}")]
  Aborted { message: String },
}

impl NodeError {
  /// The node a failure of `node` is attributed to.
  pub fn origin<'a>(&'a self, node: &'a str) -> &'a str {
    match self {
      NodeError::UpstreamDependencyFailed { origin, .. } => origin,
      NodeError::InputResolution {
        source: DeferredError::UpstreamDependencyFailed { node: origin },
        ..
      } => origin,
      _ => node,
    }
  }

  /// Whether this failure started at the node itself.
  pub fn is_origin(&self) -> bool {
    !matches!(
      self,
      NodeError::UpstreamDependencyFailed { .. }
        | NodeError::InputResolution {
          source: DeferredError::UpstreamDependencyFailed { .. },
          ..
        }
    )
  }
}
