//! Cairn State
//!
//! What the engine remembers between runs: for every resource it provisioned,
//! the inputs it was provisioned with, the outputs the provider returned and
//! the resources it depended on. The engine uses this to choose between
//! create, update and no-op, and to delete resources that are no longer
//! declared.
//!
//! The [`StateStore`] trait loads and saves a [`StackState`]. Two
//! implementations are provided: [`MemoryStore`] and [`JsonFileStore`].

mod error;
mod store;
mod types;

pub use error::StoreError;
pub use store::{JsonFileStore, MemoryStore, StateStore};
pub use types::{ResourceState, StackState};
