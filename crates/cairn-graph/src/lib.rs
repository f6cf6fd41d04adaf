//! Cairn Graph
//!
//! The declaration side of cairn. A stack is declared in two phases:
//!
//! 1. Build: [`StackBuilder`] collects [`ResourceNode`]s and exports. Nothing
//!    talks to a remote system and no value is resolved.
//! 2. Execute: an engine takes the finished [`Stack`], validates its
//!    [`DependencyGraph`] and provisions it.
//!
//! Edges are never declared by hand. They are derived from the deferred
//! values a node reads and from its explicit `depends_on` list.

mod error;
mod graph;
mod node;
mod stack;

pub use error::{CycleError, GraphError};
pub use graph::DependencyGraph;
pub use node::{NodeState, ResourceNode};
pub use stack::{ExportDecl, ResourceBuilder, ResourceRef, Stack, StackBuilder};
