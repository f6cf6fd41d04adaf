//! Provisioning of a single node.

use std::sync::Arc;
use std::time::Duration;

use cairn_graph::{NodeState, ResourceNode};
use cairn_provider::{Provider, ProviderError};
use cairn_state::ResourceState;
use cairn_value::{Fields, NodeOutcome, OutputSource, ResolveScope};
use tokio_util::sync::CancellationToken;
use tracing::{error, info, instrument, warn};

use crate::board::Board;
use crate::error::NodeError;
use crate::events::{ProvisionEvent, ProvisionNotifier};
use crate::report::Action;
use crate::retry::{Attempted, CallPolicy, call_with_retry};

/// What a node task hands back to the scheduler.
#[derive(Debug)]
pub(crate) struct NodeRun {
  pub action: Option<Action>,
  pub attempts: u32,
  pub inputs: Option<Fields>,
  pub outputs: Option<Fields>,
  pub error: Option<NodeError>,
}

impl NodeRun {
  fn new() -> Self {
    Self {
      action: None,
      attempts: 0,
      inputs: None,
      outputs: None,
      error: None,
    }
  }

  pub(crate) fn aborted(message: String) -> Self {
    Self {
      error: Some(NodeError::Aborted { message }),
      ..Self::new()
    }
  }
}

/// Everything a spawned node task owns.
pub(crate) struct NodeTask<N> {
  pub run_id: String,
  pub node: ResourceNode,
  /// Upstream node names, in declaration order.
  pub upstream: Vec<String>,
  pub provider: Arc<dyn Provider>,
  pub prior: Option<ResourceState>,
  pub board: Arc<Board>,
  pub scope: Arc<ResolveScope<Arc<Board>>>,
  pub notifier: Arc<N>,
  pub policy: CallPolicy,
  pub cancel: CancellationToken,
}

impl<N: ProvisionNotifier> NodeTask<N> {
  /// Drive the node to a terminal state and publish it on the board.
  #[instrument(
    name = "provision_node",
    skip(self),
    fields(
      run_id = %self.run_id,
      node = %self.node.name,
      kind = %self.node.kind,
    )
  )]
  pub(crate) async fn run(self) -> NodeRun {
    let mut run = NodeRun::new();

    info!("node_started");
    self.notifier.notify(ProvisionEvent::NodeStarted {
      run_id: self.run_id.clone(),
      node: self.node.name.clone(),
    });
    self.board.set_state(&self.node.name, NodeState::Resolving);

    // Upstreams named only by `depends_on` are never read during
    // resolution, so every upstream outcome is checked first.
    for upstream in &self.upstream {
      match self.board.terminal(upstream).await {
        Some(NodeOutcome::Failed { origin }) => {
          let err = NodeError::UpstreamDependencyFailed {
            upstream: upstream.clone(),
            origin,
          };
          return self.fail(run, err);
        }
        Some(NodeOutcome::Cancelled) => return self.abandon(run),
        Some(NodeOutcome::Ready(_)) | None => {}
      }
    }

    let inputs = match self.scope.resolve_fields(&self.node.inputs).await {
      Ok(inputs) => inputs,
      Err((field, source)) => {
        return self.fail(run, NodeError::InputResolution { field, source });
      }
    };
    run.inputs = Some(inputs.clone());

    if self.cancel.is_cancelled() {
      return self.abandon(run);
    }

    let action = match self.decide(&inputs).await {
      Ok(action) => action,
      Err(err) => return self.fail(run, err),
    };
    // `diff` may have been in flight when the run was cancelled.
    if self.cancel.is_cancelled() {
      return self.abandon(run);
    }
    run.action = Some(action);
    self.board.set_state(&self.node.name, NodeState::Provisioning);

    let provider = self.provider.as_ref();
    let kind = self.node.kind.as_str();
    let inputs = &inputs;
    let prior_outputs = self.prior.as_ref().map(|prior| &prior.outputs);

    let attempted = match (action, prior_outputs) {
      (Action::NoOp, Some(outputs)) => {
        info!("node_unchanged");
        run.outputs = Some(outputs.clone());
        return self.succeed(run, action);
      }
      (Action::Update, Some(outputs)) => {
        self
          .call(move || provider.update(kind, outputs, inputs))
          .await
      }
      _ => self.call(move || provider.create(kind, inputs)).await,
    };

    run.attempts = attempted.attempts;
    match attempted.result {
      Ok(outputs) => {
        run.outputs = Some(outputs);
        self.succeed(run, action)
      }
      Err(NodeError::Cancelled) if attempted.attempts == 0 => {
        run.action = None;
        self.abandon(run)
      }
      Err(err) => self.fail(run, err),
    }
  }

  /// Choose between create, update and no-op from prior state.
  async fn decide(&self, inputs: &Fields) -> Result<Action, NodeError> {
    let Some(prior) = &self.prior else {
      return Ok(Action::Create);
    };

    if prior.kind != self.node.kind {
      warn!(prior_kind = %prior.kind, "resource_replaced");
      return Ok(Action::Create);
    }

    let diff = self
      .provider
      .diff(&self.node.kind, &prior.inputs, &prior.outputs, inputs);
    let changed = match self.policy.timeout_ms {
      Some(timeout_ms) => tokio::time::timeout(Duration::from_millis(timeout_ms), diff)
        .await
        .unwrap_or(Err(ProviderError::Timeout { timeout_ms }))?,
      None => diff.await?,
    };

    Ok(if changed { Action::Update } else { Action::NoOp })
  }

  async fn call<F, Fut>(&self, call: F) -> Attempted<Fields>
  where
    F: FnMut() -> Fut,
    Fut: Future<Output = Result<Fields, ProviderError>>,
  {
    let on_retry = |attempt: u32, err: &ProviderError, delay: Duration| {
      warn!(
        attempt,
        delay_ms = delay.as_millis() as u64,
        error = %err,
        "node_retrying"
      );
      self.notifier.notify(ProvisionEvent::NodeRetrying {
        run_id: self.run_id.clone(),
        node: self.node.name.clone(),
        attempt,
        delay_ms: delay.as_millis() as u64,
        error: err.to_string(),
      });
    };
    call_with_retry(&self.policy, &self.cancel, on_retry, call).await
  }

  fn succeed(&self, run: NodeRun, action: Action) -> NodeRun {
    let outputs = run.outputs.clone().unwrap_or_default();
    info!(action = ?action, attempts = run.attempts, "node_ready");
    self.board.settle(
      &self.node.name,
      NodeState::Ready,
      NodeOutcome::Ready(outputs.clone()),
    );
    self.notifier.notify(ProvisionEvent::NodeReady {
      run_id: self.run_id.clone(),
      node: self.node.name.clone(),
      action,
      outputs,
    });
    run
  }

  fn fail(&self, mut run: NodeRun, err: NodeError) -> NodeRun {
    let origin = err.origin(&self.node.name).to_string();
    if err.is_origin() {
      error!(error = %err, attempts = run.attempts, "node_failed");
    } else {
      warn!(origin = %origin, error = %err, "node_blocked");
    }
    self.board.settle(
      &self.node.name,
      NodeState::Failed,
      NodeOutcome::Failed { origin },
    );
    self.notifier.notify(ProvisionEvent::NodeFailed {
      run_id: self.run_id.clone(),
      node: self.node.name.clone(),
      error: err.to_string(),
    });
    run.error = Some(err);
    run
  }

  /// The run was cancelled before any create or update for this node.
  fn abandon(&self, run: NodeRun) -> NodeRun {
    warn!("node_cancelled");
    self.board.settle(
      &self.node.name,
      NodeState::Resolving,
      NodeOutcome::Cancelled,
    );
    run
  }
}
