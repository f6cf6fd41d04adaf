//! Cairn Config
//!
//! Serializable configuration for the cairn provisioning engine.
//!
//! - [`EngineConfig`] controls how a run behaves: retry policy, per-call
//!   timeout and how many resources may be provisioned at once.
//! - [`StackConfig`] holds namespaced key/value settings a stack reads while
//!   it is being declared, e.g. `gcp:project`.
//!
//! Both can be loaded from JSON.

mod engine;
mod error;
mod stack;

pub use engine::{EngineConfig, RetryBackoff, RetryConfig};
pub use error::ConfigError;
pub use stack::{NamespacedConfig, StackConfig};
