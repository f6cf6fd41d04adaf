//! Cairn Provider
//!
//! The uniform interface between the engine and whatever system actually
//! owns a resource. The engine knows nothing about any resource kind; it
//! hands resolved inputs to the [`Provider`] registered for the node's kind
//! and stores the outputs it gets back.

mod error;
mod provider;
mod registry;

pub use error::ProviderError;
pub use provider::Provider;
pub use registry::ProviderRegistry;
