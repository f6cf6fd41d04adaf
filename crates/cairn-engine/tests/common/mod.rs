//! Scripted provider shared by the engine integration tests.

#![allow(dead_code)]

use std::collections::HashMap;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use async_trait::async_trait;
use cairn_config::{EngineConfig, RetryBackoff, RetryConfig};
use cairn_provider::{Provider, ProviderError};
use cairn_value::Fields;
use serde_json::{Value, json};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Op {
  Create,
  Update,
  Delete,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Call {
  pub op: Op,
  pub kind: String,
  pub name: String,
}

/// How the provider answers calls for one resource.
#[derive(Debug, Clone)]
pub enum Behavior {
  Permanent(&'static str),
  AlwaysTransient,
  /// Fail with a transient error this many times, then succeed.
  TransientTimes(u32),
  /// Take this long on every call.
  Sleep(Duration),
  /// Take this long on the first call only.
  SleepOnce(Duration),
}

#[derive(Default)]
struct Script {
  behaviors: HashMap<String, Behavior>,
  outputs: HashMap<String, Fields>,
  diff_delays: HashMap<String, Duration>,
  calls: Vec<Call>,
  seen: HashMap<String, u32>,
}

/// Records every call, keyed by the resource's `name` input.
///
/// Outputs echo the inputs plus an `id` and whatever extra outputs were
/// configured for the resource.
#[derive(Default)]
pub struct MockProvider {
  script: Mutex<Script>,
  in_flight: AtomicUsize,
  max_in_flight: AtomicUsize,
}

impl MockProvider {
  pub fn new() -> Arc<Self> {
    Arc::new(Self::default())
  }

  pub fn behave(&self, name: &str, behavior: Behavior) {
    self.lock().behaviors.insert(name.to_string(), behavior);
  }

  pub fn outputs(&self, name: &str, outputs: Value) {
    let fields = match outputs {
      Value::Object(map) => map.into_iter().collect(),
      _ => panic!("outputs must be an object"),
    };
    self.lock().outputs.insert(name.to_string(), fields);
  }

  /// Make `diff` for `name` take `delay` before answering.
  pub fn slow_diff(&self, name: &str, delay: Duration) {
    self.lock().diff_delays.insert(name.to_string(), delay);
  }

  pub fn calls(&self) -> Vec<Call> {
    self.lock().calls.clone()
  }

  pub fn calls_for(&self, name: &str) -> Vec<Op> {
    self
      .lock()
      .calls
      .iter()
      .filter(|c| c.name == name)
      .map(|c| c.op)
      .collect()
  }

  pub fn count(&self, op: Op) -> usize {
    self.lock().calls.iter().filter(|c| c.op == op).count()
  }

  /// Resource names in the order `op` was first called for them.
  pub fn order_of(&self, op: Op) -> Vec<String> {
    let mut names: Vec<String> = Vec::new();
    for call in self.lock().calls.iter().filter(|c| c.op == op) {
      if !names.contains(&call.name) {
        names.push(call.name.clone());
      }
    }
    names
  }

  pub fn max_in_flight(&self) -> usize {
    self.max_in_flight.load(Ordering::SeqCst)
  }

  fn lock(&self) -> std::sync::MutexGuard<'_, Script> {
    self.script.lock().expect("script lock poisoned")
  }

  async fn invoke(&self, op: Op, kind: &str, name: &str) -> Result<(), ProviderError> {
    let (behavior, seen) = {
      let mut script = self.lock();
      script.calls.push(Call {
        op,
        kind: kind.to_string(),
        name: name.to_string(),
      });
      let seen = script.seen.entry(name.to_string()).or_default();
      *seen += 1;
      let seen = *seen;
      (script.behaviors.get(name).cloned(), seen)
    };

    let current = self.in_flight.fetch_add(1, Ordering::SeqCst) + 1;
    self.max_in_flight.fetch_max(current, Ordering::SeqCst);

    let result = match behavior {
      None => Ok(()),
      Some(Behavior::Permanent(message)) => Err(ProviderError::permanent(message)),
      Some(Behavior::AlwaysTransient) => Err(ProviderError::transient("503 service unavailable")),
      Some(Behavior::TransientTimes(n)) if seen <= n => {
        Err(ProviderError::transient("409 operation in progress"))
      }
      Some(Behavior::TransientTimes(_)) => Ok(()),
      Some(Behavior::Sleep(delay)) => {
        tokio::time::sleep(delay).await;
        Ok(())
      }
      Some(Behavior::SleepOnce(delay)) => {
        if seen == 1 {
          tokio::time::sleep(delay).await;
        }
        Ok(())
      }
    };

    self.in_flight.fetch_sub(1, Ordering::SeqCst);
    result
  }

  fn outputs_for(&self, kind: &str, name: &str, inputs: &Fields) -> Fields {
    let mut outputs = inputs.clone();
    outputs.insert("id".to_string(), json!(format!("{}/{}", kind, name)));
    if let Some(extra) = self.lock().outputs.get(name) {
      for (key, value) in extra {
        outputs.insert(key.clone(), value.clone());
      }
    }
    outputs
  }
}

fn resource_name(fields: &Fields) -> String {
  fields
    .get("name")
    .and_then(Value::as_str)
    .unwrap_or_default()
    .to_string()
}

#[async_trait]
impl Provider for MockProvider {
  async fn create(&self, kind: &str, inputs: &Fields) -> Result<Fields, ProviderError> {
    let name = resource_name(inputs);
    self.invoke(Op::Create, kind, &name).await?;
    Ok(self.outputs_for(kind, &name, inputs))
  }

  async fn update(
    &self,
    kind: &str,
    _prior_outputs: &Fields,
    inputs: &Fields,
  ) -> Result<Fields, ProviderError> {
    let name = resource_name(inputs);
    self.invoke(Op::Update, kind, &name).await?;
    Ok(self.outputs_for(kind, &name, inputs))
  }

  async fn delete(&self, kind: &str, prior_outputs: &Fields) -> Result<(), ProviderError> {
    let name = resource_name(prior_outputs);
    self.invoke(Op::Delete, kind, &name).await
  }

  async fn diff(
    &self,
    _kind: &str,
    prior_inputs: &Fields,
    _prior_outputs: &Fields,
    inputs: &Fields,
  ) -> Result<bool, ProviderError> {
    let delay = self.lock().diff_delays.get(&resource_name(inputs)).copied();
    if let Some(delay) = delay {
      tokio::time::sleep(delay).await;
    }
    Ok(prior_inputs != inputs)
  }
}

/// Fast retries so tests that exercise backoff stay quick.
pub fn fast_config() -> EngineConfig {
  EngineConfig::default().with_retry(RetryConfig {
    max_attempts: 3,
    initial_delay_ms: 1,
    max_delay_ms: 5,
    backoff: RetryBackoff::Exponential,
  })
}
