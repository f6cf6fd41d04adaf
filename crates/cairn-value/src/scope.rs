//! Per-run resolution of deferred values.

use std::collections::HashMap;
use std::sync::{Arc, Mutex};

use async_trait::async_trait;
use futures::FutureExt;
use futures::future::{BoxFuture, join_all};
use indexmap::IndexMap;
use serde_json::Value;
use tokio::sync::OnceCell;
use uuid::Uuid;

use crate::Fields;
use crate::deferred::{Deferred, Source};
use crate::error::DeferredError;
use crate::input::Input;
use crate::path::lookup;

/// Terminal outcome of a node, as seen by deferred values reading from it.
#[derive(Debug, Clone, PartialEq)]
pub enum NodeOutcome {
  Ready(Fields),
  /// The node failed. `origin` is the node where the failure started, which
  /// is the node itself unless it was blocked by an upstream failure.
  Failed { origin: String },
  /// The node never ran because the run was cancelled.
  Cancelled,
}

/// Where a [`ResolveScope`] reads node outcomes from.
#[async_trait]
pub trait OutputSource: Send + Sync {
  /// Wait until `node` reaches a terminal state and return its outcome.
  ///
  /// Returns `None` if no node with that name exists.
  async fn terminal(&self, node: &str) -> Option<NodeOutcome>;
}

#[async_trait]
impl<T: OutputSource + ?Sized> OutputSource for Arc<T> {
  async fn terminal(&self, node: &str) -> Option<NodeOutcome> {
    (**self).terminal(node).await
  }
}

type Memo = Arc<OnceCell<Result<Value, DeferredError>>>;

/// Resolves deferred values for one run.
///
/// Every deferred value is evaluated at most once per scope. Concurrent
/// requests for the same value wait on the same evaluation and receive the
/// same outcome.
pub struct ResolveScope<S> {
  source: S,
  memo: Mutex<HashMap<Uuid, Memo>>,
}

impl<S: OutputSource> ResolveScope<S> {
  pub fn new(source: S) -> Self {
    Self {
      source,
      memo: Mutex::new(HashMap::new()),
    }
  }

  pub fn source(&self) -> &S {
    &self.source
  }

  /// Resolve a deferred value, evaluating it on first request.
  pub fn resolve<'a>(
    &'a self,
    deferred: &'a Deferred,
  ) -> BoxFuture<'a, Result<Value, DeferredError>> {
    async move {
      if let Source::Literal(value) = deferred.source() {
        return Ok(value.clone());
      }
      let cell = self.cell(deferred.id());
      cell.get_or_init(|| self.evaluate(deferred)).await.clone()
    }
    .boxed()
  }

  pub async fn resolve_input(&self, input: &Input) -> Result<Value, DeferredError> {
    match input {
      Input::Literal(value) => Ok(value.clone()),
      Input::Deferred(deferred) => self.resolve(deferred).await,
    }
  }

  /// Resolve every input of a node. On failure returns the field that could
  /// not be resolved together with the error.
  pub async fn resolve_fields(
    &self,
    inputs: &IndexMap<String, Input>,
  ) -> Result<Fields, (String, DeferredError)> {
    let mut fields = Fields::with_capacity(inputs.len());
    for (name, input) in inputs {
      let value = self
        .resolve_input(input)
        .await
        .map_err(|e| (name.clone(), e))?;
      fields.insert(name.clone(), value);
    }
    Ok(fields)
  }

  fn cell(&self, id: Uuid) -> Memo {
    let mut memo = self.memo.lock().unwrap_or_else(|e| e.into_inner());
    memo.entry(id).or_default().clone()
  }

  fn evaluate<'a>(
    &'a self,
    deferred: &'a Deferred,
  ) -> BoxFuture<'a, Result<Value, DeferredError>> {
    async move {
      match deferred.source() {
        Source::Literal(value) => Ok(value.clone()),
        Source::Output { node, field } => match self.source.terminal(node).await {
          Some(NodeOutcome::Ready(fields)) => {
            lookup(&fields, field)
              .cloned()
              .ok_or_else(|| DeferredError::MissingOutput {
                node: node.clone(),
                field: field.clone(),
              })
          }
          Some(NodeOutcome::Failed { origin }) => {
            Err(DeferredError::UpstreamDependencyFailed { node: origin })
          }
          Some(NodeOutcome::Cancelled) => Err(DeferredError::Cancelled { node: node.clone() }),
          None => Err(DeferredError::UnknownNode { node: node.clone() }),
        },
        Source::Derived { sources, transform } => {
          // Wait for every source before looking at any failure.
          let resolved = join_all(sources.iter().map(|source| self.resolve(source))).await;
          let mut values = Vec::with_capacity(resolved.len());
          for result in resolved {
            values.push(result?);
          }
          transform(&values).map_err(|message| DeferredError::Transform { message })
        }
      }
    }
    .boxed()
  }
}

#[cfg(test)]
mod tests {
  use std::sync::atomic::{AtomicUsize, Ordering};
  use std::time::Duration;

  use serde_json::json;
  use tokio::sync::watch;

  use super::*;
  use crate::deferred::interpolate;

  /// Outcomes known up front.
  struct StaticSource {
    outcomes: HashMap<String, NodeOutcome>,
  }

  impl StaticSource {
    fn new(outcomes: impl IntoIterator<Item = (&'static str, NodeOutcome)>) -> Self {
      Self {
        outcomes: outcomes
          .into_iter()
          .map(|(name, outcome)| (name.to_string(), outcome))
          .collect(),
      }
    }
  }

  #[async_trait]
  impl OutputSource for StaticSource {
    async fn terminal(&self, node: &str) -> Option<NodeOutcome> {
      self.outcomes.get(node).cloned()
    }
  }

  /// A single node whose outcome is published later.
  struct LateSource {
    rx: watch::Receiver<Option<NodeOutcome>>,
  }

  #[async_trait]
  impl OutputSource for LateSource {
    async fn terminal(&self, _node: &str) -> Option<NodeOutcome> {
      let mut rx = self.rx.clone();
      let outcome = rx.wait_for(|o| o.is_some()).await.ok()?;
      outcome.clone()
    }
  }

  fn ready(pairs: &[(&str, Value)]) -> NodeOutcome {
    NodeOutcome::Ready(
      pairs
        .iter()
        .map(|(k, v)| (k.to_string(), v.clone()))
        .collect(),
    )
  }

  fn counting(counter: &Arc<AtomicUsize>, source: Deferred) -> Deferred {
    let counter = counter.clone();
    source.apply(move |v| {
      counter.fetch_add(1, Ordering::SeqCst);
      json!(format!("{}!", v.as_str().unwrap_or_default()))
    })
  }

  #[tokio::test]
  async fn test_output_lookup() {
    let scope = ResolveScope::new(StaticSource::new([(
      "service",
      ready(&[("url", json!("https://x.example/"))]),
    )]));

    let url = Deferred::output("service", "url");
    assert_eq!(scope.resolve(&url).await, Ok(json!("https://x.example/")));

    let missing = Deferred::output("service", "location");
    assert_eq!(
      scope.resolve(&missing).await,
      Err(DeferredError::MissingOutput {
        node: "service".to_string(),
        field: "location".to_string(),
      })
    );

    let unknown = Deferred::output("database", "name");
    assert_eq!(
      scope.resolve(&unknown).await,
      Err(DeferredError::UnknownNode {
        node: "database".to_string()
      })
    );
  }

  #[tokio::test]
  async fn test_interpolation_is_literal_concatenation() {
    let scope = ResolveScope::new(StaticSource::new([(
      "service",
      ready(&[("url", json!("https://x.example/"))]),
    )]));

    let endpoint = interpolate([
      Input::from(Deferred::output("service", "url")),
      Input::from("/events"),
    ]);
    assert_eq!(
      scope.resolve(&endpoint).await,
      Ok(json!("https://x.example//events"))
    );

    let mixed = interpolate([Input::from("port="), Input::from(8080)]);
    assert_eq!(scope.resolve(&mixed).await, Ok(json!("port=8080")));
  }

  #[tokio::test]
  async fn test_failed_source_skips_transformation() {
    let scope = ResolveScope::new(StaticSource::new([
      (
        "topic",
        NodeOutcome::Failed {
          origin: "topic".to_string(),
        },
      ),
      ("service", ready(&[("url", json!("https://x.example/"))])),
    ]));

    let calls = Arc::new(AtomicUsize::new(0));
    let counter = calls.clone();
    let derived = Deferred::derive(
      [
        Deferred::output("service", "url"),
        Deferred::output("topic", "name"),
      ],
      move |_| {
        counter.fetch_add(1, Ordering::SeqCst);
        Value::Null
      },
    );

    assert_eq!(
      scope.resolve(&derived).await,
      Err(DeferredError::UpstreamDependencyFailed {
        node: "topic".to_string()
      })
    );
    assert_eq!(calls.load(Ordering::SeqCst), 0);
  }

  #[tokio::test]
  async fn test_failure_names_originating_node() {
    let scope = ResolveScope::new(StaticSource::new([(
      "subscription",
      NodeOutcome::Failed {
        origin: "service".to_string(),
      },
    )]));

    let name = Deferred::output("subscription", "name");
    let err = scope.resolve(&name).await.unwrap_err();
    assert_eq!(err.origin(), Some("service"));
  }

  #[tokio::test]
  async fn test_transformation_runs_once_for_concurrent_requests() {
    let scope = Arc::new(ResolveScope::new(StaticSource::new([(
      "service",
      ready(&[("url", json!("https://x.example"))]),
    )])));

    let calls = Arc::new(AtomicUsize::new(0));
    let shared = counting(&calls, Deferred::output("service", "url"));

    // Two dependents plus direct requests, all in flight together.
    let first = shared.apply(|v| v.clone());
    let second = shared.apply(|v| v.clone());
    let requests = vec![shared.clone(), first, second, shared.clone(), shared];

    let results = join_all(requests.iter().map(|d| scope.resolve(d))).await;
    for result in results {
      assert_eq!(result, Ok(json!("https://x.example!")));
    }
    assert_eq!(calls.load(Ordering::SeqCst), 1);
  }

  #[tokio::test]
  async fn test_memoization_is_per_scope() {
    let calls = Arc::new(AtomicUsize::new(0));
    let value = counting(&calls, Deferred::output("service", "url"));

    for _ in 0..2 {
      let scope = ResolveScope::new(StaticSource::new([(
        "service",
        ready(&[("url", json!("u"))]),
      )]));
      scope.resolve(&value).await.unwrap();
      scope.resolve(&value).await.unwrap();
    }

    assert_eq!(calls.load(Ordering::SeqCst), 2);
  }

  #[tokio::test]
  async fn test_waits_for_terminal_state() {
    let (tx, rx) = watch::channel(None);
    let scope = Arc::new(ResolveScope::new(LateSource { rx }));

    let url = Deferred::output("service", "url");
    let handle = {
      let scope = scope.clone();
      let url = url.clone();
      tokio::spawn(async move { scope.resolve(&url).await })
    };

    tokio::time::sleep(Duration::from_millis(20)).await;
    assert!(!handle.is_finished());

    tx.send_replace(Some(ready(&[("url", json!("https://late.example"))])));

    let result = handle.await.unwrap();
    assert_eq!(result, Ok(json!("https://late.example")));
  }

  #[tokio::test]
  async fn test_resolve_fields_reports_failing_field() {
    let scope = ResolveScope::new(StaticSource::new([(
      "account",
      ready(&[("email", json!("sa@example.iam"))]),
    )]));

    let mut inputs = IndexMap::new();
    inputs.insert("role".to_string(), Input::from("roles/run.invoker"));
    inputs.insert(
      "member".to_string(),
      Input::from(interpolate([
        Input::from("serviceAccount:"),
        Input::from(Deferred::output("account", "email")),
      ])),
    );

    let fields = scope.resolve_fields(&inputs).await.unwrap();
    assert_eq!(fields["member"], json!("serviceAccount:sa@example.iam"));
    assert_eq!(fields.get_index(0).unwrap().0, "role");

    inputs.insert(
      "service".to_string(),
      Input::from(Deferred::output("account", "service")),
    );
    let (field, err) = scope.resolve_fields(&inputs).await.unwrap_err();
    assert_eq!(field, "service");
    assert!(matches!(err, DeferredError::MissingOutput { .. }));
  }
}
