use thiserror::Error;

/// Failure of a provider call.
#[derive(Debug, Clone, PartialEq, Error)]
pub enum ProviderError {
  /// The call may succeed if repeated (rate limit, network blip, resource
  /// still settling).
  #[error("transient provider error: {message}")]
  Transient { message: String },

  /// The call will not succeed if repeated. `cause` holds the last retryable
  /// error when retries were exhausted.
  #[error("provider error: {message}")]
  Permanent {
    message: String,
    #[source]
    cause: Option<Box<ProviderError>>,
  },

  /// The call did not complete within the configured timeout.
  #[error("provider call timed out after {timeout_ms}ms")]
  Timeout { timeout_ms: u64 },
}

impl ProviderError {
  pub fn transient(message: impl Into<String>) -> Self {
    ProviderError::Transient {
      message: message.into(),
    }
  }

  pub fn permanent(message: impl Into<String>) -> Self {
    ProviderError::Permanent {
      message: message.into(),
      cause: None,
    }
  }

  /// Escalate the last retryable error once every attempt has been used.
  pub fn exhausted(attempts: u32, last: ProviderError) -> Self {
    ProviderError::Permanent {
      message: format!("gave up after {} attempts: {}", attempts, last),
      cause: Some(Box::new(last)),
    }
  }

  pub fn is_retryable(&self) -> bool {
    matches!(
      self,
      ProviderError::Transient { .. } | ProviderError::Timeout { .. }
    )
  }
}

#[cfg(test)]
mod tests {
  use std::error::Error as _;

  use super::*;

  #[test]
  fn test_retryable_classification() {
    assert!(ProviderError::transient("rate limited").is_retryable());
    assert!(ProviderError::Timeout { timeout_ms: 10 }.is_retryable());
    assert!(!ProviderError::permanent("invalid name").is_retryable());
  }

  #[test]
  fn test_exhausted_wraps_last_error() {
    let last = ProviderError::transient("503 service unavailable");
    let err = ProviderError::exhausted(3, last.clone());

    assert!(!err.is_retryable());
    assert_eq!(
      err.to_string(),
      "provider error: gave up after 3 attempts: transient provider error: 503 service unavailable"
    );
    match &err {
      ProviderError::Permanent { cause, .. } => assert_eq!(cause.as_deref(), Some(&last)),
      other => panic!("expected Permanent, got {:?}", other),
    }
    assert!(err.source().is_some());
  }
}
