//! Cairn
//!
//! A declarative provisioning engine. Resources are declared with a
//! [`StackBuilder`], wired together through [`Deferred`] outputs, and
//! provisioned by an [`Engine`] through the [`Provider`]s registered for
//! their kinds.
//!
//! ```ignore
//! let mut builder = StackBuilder::new("fog");
//! let service = builder
//!   .resource("fog-ingestion", "gcp:cloudrun/Service")
//!   .input("location", "us-central1")
//!   .declare()?;
//! builder
//!   .resource("fog-push-sub", "gcp:pubsub/Subscription")
//!   .input("push_endpoint", interpolate([service.output("statuses.0.url").into(), "/events".into()]))
//!   .declare()?;
//! builder.export("cloudRunUrl", service.output("statuses.0.url"))?;
//!
//! let engine = Engine::new(providers, EngineConfig::default());
//! let report = engine.up(&builder.build(), &JsonFileStore::new("fog.json"), CancellationToken::new()).await?;
//! ```

pub use cairn_config as config;
pub use cairn_engine as engine;
pub use cairn_graph as graph;
pub use cairn_provider as provider;
pub use cairn_state as state;
pub use cairn_value as value;

pub use cairn_config::{ConfigError, EngineConfig, RetryBackoff, RetryConfig, StackConfig};
pub use cairn_engine::{
  Action, ChannelNotifier, DeletionReport, DeletionStatus, DestroyReport, Engine, EngineError,
  ExportValue, NodeError, NodeReport, NoopNotifier, ProvisionEvent, ProvisionNotifier,
  RunOutcome, RunReport,
};
pub use cairn_graph::{
  CycleError, DependencyGraph, GraphError, NodeState, ResourceRef, Stack, StackBuilder,
};
pub use cairn_provider::{Provider, ProviderError, ProviderRegistry};
pub use cairn_state::{JsonFileStore, MemoryStore, ResourceState, StackState, StateStore};
pub use cairn_value::{Deferred, DeferredError, Fields, Input, interpolate};
pub use serde_json::Value;
pub use tokio_util::sync::CancellationToken;
