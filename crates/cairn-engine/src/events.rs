//! Provisioning events and notifiers.
//!
//! Events are emitted while a stack is provisioned or destroyed so callers
//! can follow progress, stream it somewhere or record it.

use cairn_value::Fields;
use serde::{Deserialize, Serialize};
use tokio::sync::mpsc;

use crate::report::Action;

/// Events emitted during a run.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum ProvisionEvent {
  /// A run over a declared stack has started.
  RunStarted { run_id: String, stack: String },

  /// Destruction of every recorded resource has started.
  DestroyStarted { run_id: String, resources: usize },

  /// A node has started resolving its inputs.
  NodeStarted { run_id: String, node: String },

  /// A provider call failed with a retryable error and will be repeated.
  NodeRetrying {
    run_id: String,
    node: String,
    attempt: u32,
    delay_ms: u64,
    error: String,
  },

  /// A node reached `Ready`.
  NodeReady {
    run_id: String,
    node: String,
    action: Action,
    outputs: Fields,
  },

  /// A node reached `Failed`.
  NodeFailed {
    run_id: String,
    node: String,
    error: String,
  },

  /// A recorded resource was deleted.
  ResourceDeleted {
    run_id: String,
    resource: String,
    kind: String,
  },

  /// The run is over.
  RunFinished { run_id: String, succeeded: bool },
}

/// Receives provisioning events.
///
/// The engine calls `notify` for each event; implementations decide what to
/// do with them.
pub trait ProvisionNotifier: Send + Sync {
  fn notify(&self, event: ProvisionEvent);
}

/// Discards all events.
#[derive(Debug, Clone, Default)]
pub struct NoopNotifier;

impl ProvisionNotifier for NoopNotifier {
  fn notify(&self, _event: ProvisionEvent) {}
}

/// Sends events to an unbounded channel.
///
/// Unbounded so a slow consumer never holds up provisioning. Volume is a
/// handful of events per resource.
#[derive(Debug, Clone)]
pub struct ChannelNotifier {
  sender: mpsc::UnboundedSender<ProvisionEvent>,
}

impl ChannelNotifier {
  pub fn new(sender: mpsc::UnboundedSender<ProvisionEvent>) -> Self {
    Self { sender }
  }

  /// Create a notifier together with the receiving end of its channel.
  pub fn channel() -> (Self, mpsc::UnboundedReceiver<ProvisionEvent>) {
    let (sender, receiver) = mpsc::unbounded_channel();
    (Self::new(sender), receiver)
  }
}

impl ProvisionNotifier for ChannelNotifier {
  fn notify(&self, event: ProvisionEvent) {
    // Receiver may have been dropped.
    let _ = self.sender.send(event);
  }
}
