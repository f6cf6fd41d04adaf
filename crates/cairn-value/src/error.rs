use thiserror::Error;

/// Failure of a deferred value.
///
/// Cloneable so a memoized failure can be handed to every requester.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum DeferredError {
  /// A source node (or one of its own upstreams) failed.
  /// `node` names the node where the failure originated.
  #[error("upstream dependency '{node}' failed")]
  UpstreamDependencyFailed { node: String },

  /// The source node never ran because the run was cancelled.
  #[error("node '{node}' was not provisioned because the run was cancelled")]
  Cancelled { node: String },

  /// The source node is ready but has no such output.
  #[error("node '{node}' has no output '{field}'")]
  MissingOutput { node: String, field: String },

  /// The transformation rejected its inputs.
  #[error("transformation failed: {message}")]
  Transform { message: String },

  /// The value refers to a node that was never declared.
  #[error("reference to undeclared node '{node}'")]
  UnknownNode { node: String },
}

impl DeferredError {
  /// Node this failure is attributed to, if any.
  pub fn origin(&self) -> Option<&str> {
    match self {
      DeferredError::UpstreamDependencyFailed { node }
      | DeferredError::Cancelled { node }
      | DeferredError::MissingOutput { node, .. }
      | DeferredError::UnknownNode { node } => Some(node),
      DeferredError::Transform { .. } => None,
    }
  }
}
