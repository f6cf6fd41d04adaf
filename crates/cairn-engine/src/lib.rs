//! Cairn Engine
//!
//! Executes a declared [`Stack`](cairn_graph::Stack):
//!
//! 1. Validate the stack (cycles, unknown references, missing providers)
//!    before any provider is called.
//! 2. Provision nodes as soon as all of their upstreams are terminal,
//!    resolving deferred inputs just before each provider call.
//! 3. Delete resources that are recorded in prior state but no longer
//!    declared.
//! 4. Resolve the stack's exports and assemble a [`RunReport`] together with
//!    the new [`StackState`](cairn_state::StackState).

mod board;
mod engine;
mod error;
mod events;
mod export;
mod node;
mod report;
mod retry;

pub use engine::Engine;
pub use error::{EngineError, NodeError};
pub use events::{ChannelNotifier, NoopNotifier, ProvisionEvent, ProvisionNotifier};
pub use export::{ExportValue, resolve_exports};
pub use report::{
  Action, DeletionReport, DeletionStatus, DestroyReport, NodeReport, RunOutcome, RunReport,
};
