use cairn_graph::ExportDecl;
use cairn_value::{DeferredError, OutputSource, ResolveScope};
use futures::future::join_all;
use serde_json::Value;

/// A resolved stack export.
#[derive(Debug, Clone, PartialEq)]
pub struct ExportValue {
  pub name: String,
  pub value: Result<Value, DeferredError>,
}

/// Resolve `exports` within a run's scope.
///
/// Waits for every referenced node to be terminal. Results keep declaration
/// order, and a transformation already evaluated in `scope` is not run again.
pub async fn resolve_exports<S: OutputSource>(
  scope: &ResolveScope<S>,
  exports: &[ExportDecl],
) -> Vec<ExportValue> {
  let values = join_all(exports.iter().map(|export| scope.resolve_input(&export.value))).await;
  exports
    .iter()
    .zip(values)
    .map(|(export, value)| ExportValue {
      name: export.name.clone(),
      value,
    })
    .collect()
}
