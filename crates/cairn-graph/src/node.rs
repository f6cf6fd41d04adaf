use cairn_value::Input;
use indexmap::IndexMap;
use serde::{Deserialize, Serialize};

/// A declared unit of desired state.
#[derive(Debug, Clone)]
pub struct ResourceNode {
  /// Logical name, unique within a stack.
  pub name: String,
  /// Resource kind, used to pick a provider (e.g. `gcp:pubsub/Topic`).
  pub kind: String,
  pub inputs: IndexMap<String, Input>,
  /// Ordering-only dependencies, for resources that must exist first without
  /// any of their outputs being read.
  pub depends_on: Vec<String>,
  /// Overrides the engine's per-call timeout.
  pub timeout_ms: Option<u64>,
  /// Overrides the engine's retry attempt limit.
  pub max_attempts: Option<u32>,
}

impl ResourceNode {
  pub fn new(name: impl Into<String>, kind: impl Into<String>) -> Self {
    Self {
      name: name.into(),
      kind: kind.into(),
      inputs: IndexMap::new(),
      depends_on: Vec::new(),
      timeout_ms: None,
      max_attempts: None,
    }
  }

  /// Every node this one depends on: nodes read by its inputs in field
  /// order, then explicit `depends_on` entries. Deduplicated.
  pub fn dependencies(&self) -> Vec<String> {
    let mut names: Vec<String> = Vec::new();
    let referenced = self
      .inputs
      .values()
      .flat_map(|input| input.dependencies())
      .chain(self.depends_on.iter().cloned());
    for name in referenced {
      if !names.contains(&name) {
        names.push(name);
      }
    }
    names
  }
}

/// Lifecycle of a node within one run.
///
/// `Pending → Resolving → Provisioning → Ready`, or `Failed` from
/// `Resolving` or `Provisioning`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum NodeState {
  Pending,
  Resolving,
  Provisioning,
  Ready,
  Failed,
}

impl NodeState {
  pub fn is_terminal(self) -> bool {
    matches!(self, NodeState::Ready | NodeState::Failed)
  }
}

#[cfg(test)]
mod tests {
  use cairn_value::Deferred;

  use super::*;

  #[test]
  fn test_dependencies_combine_inputs_and_depends_on() {
    let mut node = ResourceNode::new("subscription", "gcp:pubsub/Subscription");
    node
      .inputs
      .insert("topic".to_string(), Deferred::output("topic", "name").into());
    node.inputs.insert(
      "push_endpoint".to_string(),
      Deferred::output("processor", "url").into(),
    );
    node.inputs.insert("ack_deadline".to_string(), 60.into());
    node.depends_on = vec!["invoker".to_string(), "processor".to_string()];

    assert_eq!(node.dependencies(), vec!["topic", "processor", "invoker"]);
  }

  #[test]
  fn test_terminal_states() {
    assert!(NodeState::Ready.is_terminal());
    assert!(NodeState::Failed.is_terminal());
    assert!(!NodeState::Pending.is_terminal());
    assert!(!NodeState::Resolving.is_terminal());
    assert!(!NodeState::Provisioning.is_terminal());
  }
}
