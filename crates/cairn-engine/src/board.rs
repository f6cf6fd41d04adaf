//! Live per-node state for one run.

use std::collections::HashMap;

use async_trait::async_trait;
use cairn_graph::NodeState;
use cairn_value::{NodeOutcome, OutputSource};
use tokio::sync::watch;

#[derive(Debug, Clone)]
struct Slot {
  state: NodeState,
  outcome: Option<NodeOutcome>,
}

/// Lifecycle state and terminal outcome of every node in a run.
///
/// Each node has its own watch channel, so deferred values waiting on a node
/// wake up as soon as that node publishes its outcome.
pub(crate) struct Board {
  slots: HashMap<String, watch::Sender<Slot>>,
}

impl Board {
  pub(crate) fn new<'a>(names: impl IntoIterator<Item = &'a str>) -> Self {
    let slots = names
      .into_iter()
      .map(|name| {
        let (sender, _) = watch::channel(Slot {
          state: NodeState::Pending,
          outcome: None,
        });
        (name.to_string(), sender)
      })
      .collect();
    Self { slots }
  }

  pub(crate) fn state(&self, name: &str) -> NodeState {
    self
      .slots
      .get(name)
      .map(|slot| slot.borrow().state)
      .unwrap_or(NodeState::Pending)
  }

  /// Whether `name` has published an outcome.
  pub(crate) fn is_settled(&self, name: &str) -> bool {
    self
      .slots
      .get(name)
      .is_some_and(|slot| slot.borrow().outcome.is_some())
  }

  pub(crate) fn set_state(&self, name: &str, state: NodeState) {
    if let Some(slot) = self.slots.get(name) {
      slot.send_modify(|slot| slot.state = state);
    }
  }

  /// Publish the final state of `name` and wake everything waiting on it.
  pub(crate) fn settle(&self, name: &str, state: NodeState, outcome: NodeOutcome) {
    if let Some(slot) = self.slots.get(name) {
      slot.send_modify(|slot| {
        slot.state = state;
        slot.outcome = Some(outcome);
      });
    }
  }
}

#[async_trait]
impl OutputSource for Board {
  async fn terminal(&self, node: &str) -> Option<NodeOutcome> {
    let mut receiver = self.slots.get(node)?.subscribe();
    match receiver.wait_for(|slot| slot.outcome.is_some()).await {
      Ok(slot) => slot.outcome.clone(),
      Err(_) => None,
    }
  }
}
