use async_trait::async_trait;
use cairn_value::Fields;

use crate::error::ProviderError;

/// Adapter for one or more resource kinds.
///
/// Implementations must be safe to call concurrently: the engine provisions
/// independent resources in parallel and may hold several calls to the same
/// provider in flight at once.
#[async_trait]
pub trait Provider: Send + Sync {
  /// Create a resource from fully resolved inputs and return its outputs.
  async fn create(&self, kind: &str, inputs: &Fields) -> Result<Fields, ProviderError>;

  /// Bring an existing resource in line with `inputs`.
  async fn update(
    &self,
    kind: &str,
    prior_outputs: &Fields,
    inputs: &Fields,
  ) -> Result<Fields, ProviderError>;

  /// Delete an existing resource.
  async fn delete(&self, kind: &str, prior_outputs: &Fields) -> Result<(), ProviderError>;

  /// Whether an existing resource needs an update.
  ///
  /// The default compares the resolved inputs with the inputs recorded when
  /// the resource was last provisioned.
  async fn diff(
    &self,
    _kind: &str,
    prior_inputs: &Fields,
    _prior_outputs: &Fields,
    inputs: &Fields,
  ) -> Result<bool, ProviderError> {
    Ok(prior_inputs != inputs)
  }
}
