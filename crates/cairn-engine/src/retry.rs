use std::time::Duration;

use cairn_config::RetryConfig;
use cairn_provider::ProviderError;
use tokio_util::sync::CancellationToken;

use crate::error::NodeError;

/// How a single provider operation is attempted.
#[derive(Debug, Clone)]
pub(crate) struct CallPolicy {
  pub retry: RetryConfig,
  pub timeout_ms: Option<u64>,
}

/// Outcome of [`call_with_retry`]: the number of calls made and the result
/// of the last one.
pub(crate) struct Attempted<T> {
  pub attempts: u32,
  pub result: Result<T, NodeError>,
}

/// Run `call` until it succeeds, fails permanently, or the attempt budget
/// is used up.
///
/// Each call is bounded by the policy's timeout. Retryable failures
/// (transient errors and timeouts) back off before the next attempt; when
/// no attempt is left the last one is escalated to a permanent error. No
/// call is started once `cancel` fires.
pub(crate) async fn call_with_retry<T, F, Fut>(
  policy: &CallPolicy,
  cancel: &CancellationToken,
  mut on_retry: impl FnMut(u32, &ProviderError, Duration),
  mut call: F,
) -> Attempted<T>
where
  F: FnMut() -> Fut,
  Fut: Future<Output = Result<T, ProviderError>>,
{
  let budget = policy.retry.attempts();
  let mut attempts = 0;

  loop {
    if cancel.is_cancelled() {
      return Attempted {
        attempts,
        result: Err(NodeError::Cancelled),
      };
    }

    attempts += 1;
    let result = match policy.timeout_ms {
      Some(timeout_ms) => tokio::time::timeout(Duration::from_millis(timeout_ms), call())
        .await
        .unwrap_or(Err(ProviderError::Timeout { timeout_ms })),
      None => call().await,
    };

    let err = match result {
      Ok(value) => {
        return Attempted {
          attempts,
          result: Ok(value),
        };
      }
      Err(err) if !err.is_retryable() => {
        return Attempted {
          attempts,
          result: Err(err.into()),
        };
      }
      Err(err) if attempts >= budget => {
        return Attempted {
          attempts,
          result: Err(ProviderError::exhausted(attempts, err).into()),
        };
      }
      Err(err) => err,
    };

    let delay = policy.retry.delay_for_attempt(attempts);
    on_retry(attempts, &err, delay);

    tokio::select! {
      _ = cancel.cancelled() => {
        return Attempted {
          attempts,
          result: Err(NodeError::Cancelled),
        };
      }
      _ = tokio::time::sleep(delay) => {}
    }
  }
}
