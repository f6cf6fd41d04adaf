use std::collections::{HashMap, HashSet};
use std::sync::Arc;

use cairn_config::EngineConfig;
use cairn_graph::{NodeState, Stack};
use cairn_provider::{ProviderError, ProviderRegistry};
use cairn_state::{ResourceState, StackState, StateStore};
use cairn_value::{NodeOutcome, ResolveScope};
use chrono::Utc;
use futures::StreamExt;
use futures::stream::FuturesUnordered;
use tokio_util::sync::CancellationToken;
use tracing::{error, info, instrument, warn};

use crate::board::Board;
use crate::error::{EngineError, NodeError};
use crate::events::{NoopNotifier, ProvisionEvent, ProvisionNotifier};
use crate::export::resolve_exports;
use crate::node::{NodeRun, NodeTask};
use crate::report::{
  Action, DeletionReport, DeletionStatus, DestroyReport, NodeReport, RunOutcome, RunReport,
};
use crate::retry::{CallPolicy, call_with_retry};

/// Provisions declared stacks through registered providers.
pub struct Engine<N = NoopNotifier> {
  providers: ProviderRegistry,
  config: EngineConfig,
  notifier: Arc<N>,
}

impl Engine<NoopNotifier> {
  pub fn new(providers: ProviderRegistry, config: EngineConfig) -> Self {
    Self {
      providers,
      config,
      notifier: Arc::new(NoopNotifier),
    }
  }
}

impl<N: ProvisionNotifier + 'static> Engine<N> {
  /// Replace the notifier that receives [`ProvisionEvent`]s.
  pub fn with_notifier<M: ProvisionNotifier>(self, notifier: M) -> Engine<M> {
    Engine {
      providers: self.providers,
      config: self.config,
      notifier: Arc::new(notifier),
    }
  }

  pub fn config(&self) -> &EngineConfig {
    &self.config
  }

  pub fn providers(&self) -> &ProviderRegistry {
    &self.providers
  }

  /// Check everything that can be checked without calling a provider.
  ///
  /// Returns the topological order of the stack's nodes. Resources recorded
  /// in `prior` that will have to be deleted need a provider too.
  pub fn validate(&self, stack: &Stack, prior: &StackState) -> Result<Vec<String>, EngineError> {
    let order = stack.validate()?;
    let graph = stack.graph();

    for node in graph.nodes() {
      self.require_provider(&node.kind, &node.name)?;
    }
    for resource in prior.iter() {
      let declared_kind = graph.node(&resource.name).map(|node| node.kind.as_str());
      if declared_kind != Some(resource.kind.as_str()) {
        self.require_provider(&resource.kind, &resource.name)?;
      }
    }
    Ok(order)
  }

  fn require_provider(&self, kind: &str, node: &str) -> Result<(), EngineError> {
    if self.providers.contains(kind) {
      Ok(())
    } else {
      Err(EngineError::MissingProvider {
        kind: kind.to_string(),
        node: node.to_string(),
      })
    }
  }

  /// Provision `stack` against `prior` state.
  ///
  /// Fails without calling any provider if the stack does not validate.
  /// Otherwise every node ends Ready or Failed (or unfinished if `cancel`
  /// fires) and the report carries the state to persist.
  #[instrument(
    name = "engine_run",
    skip(self, stack, prior, cancel),
    fields(stack = %stack.name())
  )]
  pub async fn run(
    &self,
    stack: &Stack,
    prior: &StackState,
    cancel: CancellationToken,
  ) -> Result<RunReport, EngineError> {
    let order = self.validate(stack, prior)?;
    let graph = stack.graph();
    let run_id = uuid::Uuid::new_v4().to_string();

    info!(run_id = %run_id, nodes = order.len(), "run_started");
    self.notifier.notify(ProvisionEvent::RunStarted {
      run_id: run_id.clone(),
      stack: stack.name().to_string(),
    });

    let board = Arc::new(Board::new(order.iter().map(String::as_str)));
    let scope = Arc::new(ResolveScope::new(board.clone()));
    let mut runs = self
      .schedule(stack, prior, &order, &run_id, &board, &scope, &cancel)
      .await;

    // Nodes that never started still need an outcome so nothing waits on
    // them forever.
    for name in &order {
      if !board.is_settled(name) {
        board.settle(name, board.state(name), NodeOutcome::Cancelled);
      }
    }
    let cancelled = cancel.is_cancelled();

    let mut nodes: Vec<NodeReport> = graph
      .nodes()
      .map(|node| {
        let run = runs.remove(&node.name);
        NodeReport {
          name: node.name.clone(),
          kind: node.kind.clone(),
          state: board.state(&node.name),
          action: run.as_ref().and_then(|r| r.action),
          attempts: run.as_ref().map_or(0, |r| r.attempts),
          inputs: run.as_ref().and_then(|r| r.inputs.clone()),
          outputs: run.as_ref().and_then(|r| r.outputs.clone()),
          error: run.and_then(|r| r.error),
          blocked: Vec::new(),
        }
      })
      .collect();
    attribute_blocked(stack, &mut nodes);

    let mut state = next_state(stack, prior, &nodes);

    let deleted = if cancelled {
      warn!(run_id = %run_id, "prune_skipped");
      Vec::new()
    } else {
      let replaced = nodes
        .iter()
        .filter(|n| n.is_ready())
        .filter(|n| prior.get(&n.name).is_some_and(|p| p.kind != n.kind))
        .map(|n| n.name.as_str());
      let stale = prior.names().filter(|name| !graph.contains(name));
      let targets: Vec<&str> = stale.chain(replaced).collect();
      let order = prior.deletion_order(targets);
      self.delete(&run_id, prior, &order, &mut state, &cancel).await
    };

    let exports = resolve_exports(&scope, stack.exports()).await;

    // Cancellation may also have arrived while pruning.
    let outcome = if cancel.is_cancelled() {
      RunOutcome::Cancelled {
        pending: nodes
          .iter()
          .filter(|n| matches!(n.state, NodeState::Pending | NodeState::Resolving))
          .map(|n| n.name.clone())
          .chain(
            deleted
              .iter()
              .filter(|d| d.status == DeletionStatus::Cancelled)
              .map(|d| d.name.clone()),
          )
          .collect(),
      }
    } else {
      let failed: Vec<String> = nodes
        .iter()
        .filter(|n| n.is_failed())
        .map(|n| n.name.clone())
        .chain(deleted.iter().filter(|d| !d.is_deleted()).map(|d| d.name.clone()))
        .collect();
      if failed.is_empty() {
        RunOutcome::Succeeded
      } else {
        RunOutcome::Failed { failed }
      }
    };

    match &outcome {
      RunOutcome::Succeeded => info!(run_id = %run_id, "run_succeeded"),
      RunOutcome::Failed { failed } => error!(run_id = %run_id, failed = ?failed, "run_failed"),
      RunOutcome::Cancelled { pending } => {
        warn!(run_id = %run_id, pending = ?pending, "run_cancelled")
      }
    }
    self.notifier.notify(ProvisionEvent::RunFinished {
      run_id: run_id.clone(),
      succeeded: outcome == RunOutcome::Succeeded,
    });

    Ok(RunReport {
      run_id,
      stack: stack.name().to_string(),
      outcome,
      nodes,
      deleted,
      exports,
      state,
    })
  }

  /// Start every node whose upstreams are terminal, up to the parallelism
  /// limit, until nothing is running and nothing more can start.
  #[allow(clippy::too_many_arguments)]
  async fn schedule(
    &self,
    stack: &Stack,
    prior: &StackState,
    order: &[String],
    run_id: &str,
    board: &Arc<Board>,
    scope: &Arc<ResolveScope<Arc<Board>>>,
    cancel: &CancellationToken,
  ) -> HashMap<String, NodeRun> {
    let graph = stack.graph();
    let limit = self.config.parallelism.unwrap_or(usize::MAX).max(1);
    let mut started: HashSet<&str> = HashSet::new();
    let mut in_flight = FuturesUnordered::new();
    let mut runs = HashMap::with_capacity(order.len());

    loop {
      if !cancel.is_cancelled() {
        for name in order {
          if in_flight.len() >= limit {
            break;
          }
          if started.contains(name.as_str()) {
            continue;
          }
          let upstream = graph.upstream(name);
          if !upstream.iter().all(|up| board.is_settled(up)) {
            continue;
          }
          let Some(node) = graph.node(name) else {
            continue;
          };
          let Some(provider) = self.providers.get(&node.kind) else {
            continue;
          };

          started.insert(name.as_str());
          let mut retry = self.config.retry.clone();
          if let Some(max_attempts) = node.max_attempts {
            retry.max_attempts = max_attempts;
          }
          let task = NodeTask {
            run_id: run_id.to_string(),
            node: node.clone(),
            upstream: upstream.to_vec(),
            provider,
            prior: prior.get(name).cloned(),
            board: board.clone(),
            scope: scope.clone(),
            notifier: self.notifier.clone(),
            policy: CallPolicy {
              retry,
              timeout_ms: node.timeout_ms.or(self.config.timeout_ms),
            },
            cancel: cancel.clone(),
          };
          let handle = tokio::spawn(task.run());
          let name = name.clone();
          in_flight.push(async move { (name, handle.await) });
        }
      }

      let Some((name, joined)) = in_flight.next().await else {
        break;
      };
      let run = match joined {
        Ok(run) => run,
        Err(e) => {
          error!(run_id = %run_id, node = %name, error = %e, "node_task_aborted");
          board.settle(
            &name,
            NodeState::Failed,
            NodeOutcome::Failed {
              origin: name.clone(),
            },
          );
          NodeRun::aborted(e.to_string())
        }
      };
      runs.insert(name, run);
    }

    runs
  }

  /// Delete `order` (already in deletion order) using the records in
  /// `prior`, updating `state` as resources disappear.
  ///
  /// A resource is skipped while anything left in `state` still depends on
  /// it. A resource replaced by one of another kind under the same name is
  /// deleted but its name stays recorded.
  async fn delete(
    &self,
    run_id: &str,
    prior: &StackState,
    order: &[String],
    state: &mut StackState,
    cancel: &CancellationToken,
  ) -> Vec<DeletionReport> {
    let policy = CallPolicy {
      retry: self.config.retry.clone(),
      timeout_ms: self.config.timeout_ms,
    };
    let mut reports = Vec::with_capacity(order.len());

    for name in order {
      let Some(resource) = prior.get(name) else {
        continue;
      };
      let replaced = state
        .get(name)
        .is_some_and(|current| current.kind != resource.kind);

      let mut report = DeletionReport {
        name: resource.name.clone(),
        kind: resource.kind.clone(),
        attempts: 0,
        status: DeletionStatus::Deleted,
      };

      if cancel.is_cancelled() {
        report.status = DeletionStatus::Cancelled;
        reports.push(report);
        continue;
      }

      if !replaced {
        let blocker = state
          .iter()
          .find(|other| other.name != resource.name && other.dependencies.contains(name));
        if let Some(blocker) = blocker {
          warn!(run_id = %run_id, resource = %name, blocked_by = %blocker.name, "delete_skipped");
          report.status = DeletionStatus::Skipped {
            blocked_by: blocker.name.clone(),
          };
          reports.push(report);
          continue;
        }
      }

      let Some(provider) = self.providers.get(&resource.kind) else {
        report.status = DeletionStatus::Failed {
          error: NodeError::Provider(ProviderError::permanent(format!(
            "no provider registered for kind '{}'",
            resource.kind
          ))),
        };
        reports.push(report);
        continue;
      };

      let provider = provider.as_ref();
      let kind = resource.kind.as_str();
      let outputs = &resource.outputs;
      let attempted = call_with_retry(
        &policy,
        cancel,
        |attempt, err, delay| {
          warn!(
            run_id = %run_id,
            resource = %name,
            attempt,
            delay_ms = delay.as_millis() as u64,
            error = %err,
            "delete_retrying"
          );
        },
        move || provider.delete(kind, outputs),
      )
      .await;
      report.attempts = attempted.attempts;

      match attempted.result {
        Ok(()) => {
          info!(run_id = %run_id, resource = %name, kind = %kind, "resource_deleted");
          if !replaced {
            state.remove(name);
          }
          self.notifier.notify(ProvisionEvent::ResourceDeleted {
            run_id: run_id.to_string(),
            resource: name.clone(),
            kind: kind.to_string(),
          });
        }
        Err(err) => {
          error!(run_id = %run_id, resource = %name, error = %err, "resource_delete_failed");
          report.status = DeletionStatus::Failed { error: err };
        }
      }
      reports.push(report);
    }

    reports
  }

  /// Delete every resource recorded in `prior`, dependents first.
  ///
  /// A resource is skipped while a resource that depends on it is still
  /// recorded, e.g. because its own deletion failed.
  #[instrument(name = "engine_destroy", skip(self, prior, cancel))]
  pub async fn destroy(
    &self,
    prior: &StackState,
    cancel: CancellationToken,
  ) -> Result<DestroyReport, EngineError> {
    for resource in prior.iter() {
      self.require_provider(&resource.kind, &resource.name)?;
    }

    let run_id = uuid::Uuid::new_v4().to_string();
    info!(run_id = %run_id, resources = prior.len(), "destroy_started");
    self.notifier.notify(ProvisionEvent::DestroyStarted {
      run_id: run_id.clone(),
      resources: prior.len(),
    });

    let mut state = prior.clone();
    let order = prior.deletion_order(prior.names());
    let deleted = self.delete(&run_id, prior, &order, &mut state, &cancel).await;

    let outcome = if cancel.is_cancelled() {
      RunOutcome::Cancelled {
        pending: deleted
          .iter()
          .filter(|d| d.status == DeletionStatus::Cancelled)
          .map(|d| d.name.clone())
          .collect(),
      }
    } else {
      let failed: Vec<String> = deleted
        .iter()
        .filter(|d| !d.is_deleted())
        .map(|d| d.name.clone())
        .collect();
      if failed.is_empty() {
        RunOutcome::Succeeded
      } else {
        RunOutcome::Failed { failed }
      }
    };

    info!(run_id = %run_id, remaining = state.len(), "destroy_finished");
    self.notifier.notify(ProvisionEvent::RunFinished {
      run_id: run_id.clone(),
      succeeded: outcome == RunOutcome::Succeeded,
    });

    Ok(DestroyReport {
      run_id,
      outcome,
      deleted,
      state,
    })
  }

  /// Load prior state from `store`, run `stack` and save the new state.
  ///
  /// The new state is saved whatever the outcome, so resources provisioned
  /// before a failure or cancellation are remembered.
  pub async fn up(
    &self,
    stack: &Stack,
    store: &dyn StateStore,
    cancel: CancellationToken,
  ) -> Result<RunReport, EngineError> {
    let prior = store.load().await?;
    let report = self.run(stack, &prior, cancel).await?;
    store.save(&report.state).await?;
    Ok(report)
  }

  /// Load prior state from `store`, destroy it and save what is left.
  pub async fn down(
    &self,
    store: &dyn StateStore,
    cancel: CancellationToken,
  ) -> Result<DestroyReport, EngineError> {
    let prior = store.load().await?;
    let report = self.destroy(&prior, cancel).await?;
    store.save(&report.state).await?;
    Ok(report)
  }
}

/// Fill in `blocked` on every node where a failure originated.
fn attribute_blocked(stack: &Stack, nodes: &mut [NodeReport]) {
  let origins: HashMap<String, String> = nodes
    .iter()
    .filter_map(|n| Some((n.name.clone(), n.origin()?.to_string())))
    .collect();

  for node in nodes.iter_mut() {
    if origins.get(&node.name) != Some(&node.name) {
      continue;
    }
    node.blocked = stack
      .graph()
      .dependents_closure(&node.name)
      .into_iter()
      .filter(|dependent| origins.get(dependent) == Some(&node.name))
      .collect();
  }
}

/// State after a run: Ready nodes are recorded with what they were
/// provisioned with. Everything else keeps its prior record.
fn next_state(stack: &Stack, prior: &StackState, nodes: &[NodeReport]) -> StackState {
  let mut state = prior.clone();
  for report in nodes.iter().filter(|n| n.is_ready()) {
    let Some(node) = stack.graph().node(&report.name) else {
      continue;
    };
    let dependencies = node.dependencies();

    if report.action == Some(Action::NoOp) {
      if let Some(previous) = prior.get(&report.name) {
        state.insert(ResourceState {
          dependencies,
          ..previous.clone()
        });
        continue;
      }
    }

    state.insert(ResourceState {
      name: report.name.clone(),
      kind: report.kind.clone(),
      inputs: report.inputs.clone().unwrap_or_default(),
      outputs: report.outputs.clone().unwrap_or_default(),
      dependencies,
      updated_at: Utc::now(),
    });
  }
  state
}
