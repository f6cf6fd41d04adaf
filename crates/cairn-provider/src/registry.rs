use std::collections::HashMap;
use std::fmt;
use std::sync::Arc;

use crate::provider::Provider;

/// Maps resource kinds to the provider that handles them.
#[derive(Clone, Default)]
pub struct ProviderRegistry {
  providers: HashMap<String, Arc<dyn Provider>>,
}

impl ProviderRegistry {
  pub fn new() -> Self {
    Self::default()
  }

  /// Register `provider` for `kind`, replacing any previous registration.
  /// The same provider may be registered for several kinds.
  pub fn register(&mut self, kind: impl Into<String>, provider: Arc<dyn Provider>) {
    self.providers.insert(kind.into(), provider);
  }

  /// Builder-style [`ProviderRegistry::register`].
  pub fn with(mut self, kind: impl Into<String>, provider: Arc<dyn Provider>) -> Self {
    self.register(kind, provider);
    self
  }

  pub fn get(&self, kind: &str) -> Option<Arc<dyn Provider>> {
    self.providers.get(kind).cloned()
  }

  pub fn contains(&self, kind: &str) -> bool {
    self.providers.contains_key(kind)
  }

  /// Registered kinds, sorted.
  pub fn kinds(&self) -> Vec<&str> {
    let mut kinds: Vec<&str> = self.providers.keys().map(String::as_str).collect();
    kinds.sort_unstable();
    kinds
  }
}

impl fmt::Debug for ProviderRegistry {
  fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
    f.debug_struct("ProviderRegistry")
      .field("kinds", &self.kinds())
      .finish()
  }
}

#[cfg(test)]
mod tests {
  use async_trait::async_trait;
  use cairn_value::Fields;
  use serde_json::json;

  use super::*;
  use crate::error::ProviderError;

  struct Echo;

  #[async_trait]
  impl Provider for Echo {
    async fn create(&self, _kind: &str, inputs: &Fields) -> Result<Fields, ProviderError> {
      Ok(inputs.clone())
    }

    async fn update(
      &self,
      _kind: &str,
      _prior_outputs: &Fields,
      inputs: &Fields,
    ) -> Result<Fields, ProviderError> {
      Ok(inputs.clone())
    }

    async fn delete(&self, _kind: &str, _prior_outputs: &Fields) -> Result<(), ProviderError> {
      Ok(())
    }
  }

  #[test]
  fn test_one_provider_for_many_kinds() {
    let echo: Arc<dyn Provider> = Arc::new(Echo);
    let registry = ProviderRegistry::new()
      .with("gcp:pubsub/Topic", echo.clone())
      .with("gcp:pubsub/Subscription", echo);

    assert!(registry.contains("gcp:pubsub/Topic"));
    assert!(registry.get("gcp:cloudrun/Service").is_none());
    assert_eq!(
      registry.kinds(),
      vec!["gcp:pubsub/Subscription", "gcp:pubsub/Topic"]
    );
    assert_eq!(
      format!("{:?}", registry),
      r#"ProviderRegistry { kinds: ["gcp:pubsub/Subscription", "gcp:pubsub/Topic"] }"#
    );
  }

  #[tokio::test]
  async fn test_default_diff_compares_inputs() {
    let echo = Echo;
    let mut prior = Fields::new();
    prior.insert("name".to_string(), json!("fog-events"));
    let outputs = prior.clone();

    let needs_update = echo
      .diff("gcp:pubsub/Topic", &prior, &outputs, &prior.clone())
      .await
      .unwrap();
    assert!(!needs_update);

    let mut changed = prior.clone();
    changed.insert("labels".to_string(), json!({"env": "prod"}));
    assert!(
      echo
        .diff("gcp:pubsub/Topic", &prior, &outputs, &changed)
        .await
        .unwrap()
    );
  }
}
