//! Cairn Value
//!
//! Deferred values: placeholders for resource outputs that only exist once a
//! provider call has completed.
//!
//! A [`Deferred`] is built while a stack is being declared and is never
//! evaluated there. Evaluation happens inside a [`ResolveScope`] owned by a
//! single engine run, which
//!
//! - waits until every source node has reached a terminal state,
//! - runs each transformation at most once, sharing the outcome with every
//!   requester,
//! - fails a derived value without running its transformation when any of
//!   its sources failed.

mod deferred;
mod error;
mod input;
mod path;
mod scope;

pub use deferred::{Deferred, interpolate};
pub use error::DeferredError;
pub use input::Input;
pub use path::lookup;
pub use scope::{NodeOutcome, OutputSource, ResolveScope};

/// Ordered field map used for resource inputs and outputs.
pub type Fields = indexmap::IndexMap<String, serde_json::Value>;
