use cairn_graph::NodeState;
use cairn_state::StackState;
use cairn_value::{DeferredError, Fields};
use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::error::NodeError;
use crate::export::ExportValue;

/// What the engine did with a resource.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Action {
  Create,
  Update,
  /// Prior state matched; prior outputs were reused without calling the
  /// provider.
  NoOp,
}

/// Provisioning result of one declared node.
#[derive(Debug, Clone, PartialEq)]
pub struct NodeReport {
  pub name: String,
  pub kind: String,
  pub state: NodeState,
  /// `None` if the node never got as far as choosing an action.
  pub action: Option<Action>,
  /// Provider calls made for the chosen action, retries included.
  pub attempts: u32,
  /// Resolved inputs, once resolution succeeded.
  pub inputs: Option<Fields>,
  pub outputs: Option<Fields>,
  pub error: Option<NodeError>,
  /// Nodes that failed because this node failed, in declaration order.
  /// Empty unless this node is where a failure originated.
  pub blocked: Vec<String>,
}

impl NodeReport {
  pub fn is_ready(&self) -> bool {
    self.state == NodeState::Ready
  }

  pub fn is_failed(&self) -> bool {
    self.state == NodeState::Failed
  }

  /// Node this failure is attributed to.
  pub fn origin(&self) -> Option<&str> {
    self.error.as_ref().map(|e| e.origin(&self.name))
  }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RunOutcome {
  /// Every node is Ready and every deletion succeeded.
  Succeeded,
  /// The run completed, but some nodes or deletions failed.
  Failed { failed: Vec<String> },
  /// The run was cancelled. `pending` lists the nodes that never finished
  /// resolving, then the deletions that were never attempted.
  Cancelled { pending: Vec<String> },
}

#[derive(Debug, Clone, PartialEq)]
pub enum DeletionStatus {
  Deleted,
  Failed { error: NodeError },
  /// Not attempted because `blocked_by` still depends on the resource.
  Skipped { blocked_by: String },
  /// Not attempted because the run was cancelled.
  Cancelled,
}

/// Result of deleting one recorded resource.
#[derive(Debug, Clone, PartialEq)]
pub struct DeletionReport {
  pub name: String,
  pub kind: String,
  pub attempts: u32,
  pub status: DeletionStatus,
}

impl DeletionReport {
  pub fn is_deleted(&self) -> bool {
    self.status == DeletionStatus::Deleted
  }
}

/// Everything a run did, plus the state to persist for the next one.
#[derive(Debug, Clone)]
pub struct RunReport {
  pub run_id: String,
  pub stack: String,
  pub outcome: RunOutcome,
  /// One entry per declared node, in declaration order.
  pub nodes: Vec<NodeReport>,
  /// Resources deleted because they are no longer declared (or were
  /// replaced by a resource of another kind), in deletion order.
  pub deleted: Vec<DeletionReport>,
  /// Exports in declaration order.
  pub exports: Vec<ExportValue>,
  pub state: StackState,
}

impl RunReport {
  pub fn succeeded(&self) -> bool {
    self.outcome == RunOutcome::Succeeded
  }

  pub fn node(&self, name: &str) -> Option<&NodeReport> {
    self.nodes.iter().find(|n| n.name == name)
  }

  pub fn export(&self, name: &str) -> Option<&Result<Value, DeferredError>> {
    self
      .exports
      .iter()
      .find(|e| e.name == name)
      .map(|e| &e.value)
  }

  /// Failed nodes in declaration order.
  pub fn failed(&self) -> impl Iterator<Item = &NodeReport> {
    self.nodes.iter().filter(|n| n.is_failed())
  }
}

/// Result of destroying every recorded resource.
#[derive(Debug, Clone)]
pub struct DestroyReport {
  pub run_id: String,
  pub outcome: RunOutcome,
  /// In deletion order.
  pub deleted: Vec<DeletionReport>,
  /// Resources that are still recorded afterwards.
  pub state: StackState,
}

impl DestroyReport {
  pub fn succeeded(&self) -> bool {
    self.outcome == RunOutcome::Succeeded
  }
}
