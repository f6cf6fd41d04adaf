use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::error::ConfigError;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RetryBackoff {
  Constant,
  Linear,
  Exponential,
}

/// Retry policy for provider calls that fail with a retryable error.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct RetryConfig {
  /// Total number of attempts, including the first one.
  pub max_attempts: u32,
  /// Delay after the first failed attempt.
  pub initial_delay_ms: u64,
  /// Upper bound for any single delay.
  pub max_delay_ms: u64,
  pub backoff: RetryBackoff,
}

impl Default for RetryConfig {
  fn default() -> Self {
    Self {
      max_attempts: 3,
      initial_delay_ms: 200,
      max_delay_ms: 5_000,
      backoff: RetryBackoff::Exponential,
    }
  }
}

impl RetryConfig {
  /// A policy that never retries.
  pub fn none() -> Self {
    Self {
      max_attempts: 1,
      ..Self::default()
    }
  }

  /// Number of attempts actually made. A zero setting still makes one call.
  pub fn attempts(&self) -> u32 {
    self.max_attempts.max(1)
  }

  /// Delay to wait after `attempt` (1-indexed) failed.
  pub fn delay_for_attempt(&self, attempt: u32) -> Duration {
    let attempt = attempt.max(1);
    let base = self.initial_delay_ms;
    let delay = match self.backoff {
      RetryBackoff::Constant => base,
      RetryBackoff::Linear => base.saturating_mul(u64::from(attempt)),
      RetryBackoff::Exponential => {
        let factor = 2u64.checked_pow(attempt - 1).unwrap_or(u64::MAX);
        base.saturating_mul(factor)
      }
    };
    Duration::from_millis(delay.min(self.max_delay_ms))
  }
}

/// Settings for a single engine run.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct EngineConfig {
  pub retry: RetryConfig,
  /// Timeout for each provider call. `None` waits indefinitely.
  #[serde(skip_serializing_if = "Option::is_none")]
  pub timeout_ms: Option<u64>,
  /// Maximum number of resources provisioning at the same time.
  /// `None` means no limit.
  #[serde(skip_serializing_if = "Option::is_none")]
  pub parallelism: Option<usize>,
}

impl Default for EngineConfig {
  fn default() -> Self {
    Self {
      retry: RetryConfig::default(),
      timeout_ms: Some(300_000),
      parallelism: None,
    }
  }
}

impl EngineConfig {
  pub fn from_json_str(content: &str) -> Result<Self, ConfigError> {
    Ok(serde_json::from_str(content)?)
  }

  pub fn with_retry(mut self, retry: RetryConfig) -> Self {
    self.retry = retry;
    self
  }

  pub fn with_timeout_ms(mut self, timeout_ms: Option<u64>) -> Self {
    self.timeout_ms = timeout_ms;
    self
  }

  pub fn with_parallelism(mut self, parallelism: Option<usize>) -> Self {
    self.parallelism = parallelism;
    self
  }
}

#[cfg(test)]
mod tests {
  use super::*;

  fn retry(backoff: RetryBackoff) -> RetryConfig {
    RetryConfig {
      max_attempts: 5,
      initial_delay_ms: 100,
      max_delay_ms: 1_000,
      backoff,
    }
  }

  #[test]
  fn test_exponential_delays_double_and_cap() {
    let config = retry(RetryBackoff::Exponential);
    assert_eq!(config.delay_for_attempt(1), Duration::from_millis(100));
    assert_eq!(config.delay_for_attempt(2), Duration::from_millis(200));
    assert_eq!(config.delay_for_attempt(3), Duration::from_millis(400));
    assert_eq!(config.delay_for_attempt(5), Duration::from_millis(1_000));
    assert_eq!(config.delay_for_attempt(80), Duration::from_millis(1_000));
  }

  #[test]
  fn test_linear_and_constant_delays() {
    let linear = retry(RetryBackoff::Linear);
    assert_eq!(linear.delay_for_attempt(3), Duration::from_millis(300));

    let constant = retry(RetryBackoff::Constant);
    assert_eq!(constant.delay_for_attempt(4), Duration::from_millis(100));
  }

  #[test]
  fn test_zero_attempts_still_calls_once() {
    let config = RetryConfig {
      max_attempts: 0,
      ..RetryConfig::default()
    };
    assert_eq!(config.attempts(), 1);
  }

  #[test]
  fn test_engine_config_from_partial_json() {
    let config = EngineConfig::from_json_str(
      r#"{ "retry": { "max_attempts": 7, "backoff": "linear" }, "parallelism": 4 }"#,
    )
    .unwrap();

    assert_eq!(config.retry.max_attempts, 7);
    assert_eq!(config.retry.backoff, RetryBackoff::Linear);
    assert_eq!(config.retry.initial_delay_ms, 200);
    assert_eq!(config.parallelism, Some(4));
    assert_eq!(config.timeout_ms, Some(300_000));
  }
}
