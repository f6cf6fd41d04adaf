use thiserror::Error;

/// The dependency graph contains a cycle.
///
/// `members` lists the nodes on the cycle in dependency order: each member
/// depends on the next one, and the last depends on the first.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("dependency cycle detected: {}", cycle_path(.members))]
pub struct CycleError {
  pub members: Vec<String>,
}

fn cycle_path(members: &[String]) -> String {
  match members.first() {
    Some(first) => format!("{} -> {}", members.join(" -> "), first),
    None => String::new(),
  }
}

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum GraphError {
  #[error("resource '{name}' is declared more than once")]
  DuplicateNode { name: String },

  #[error("export '{name}' is declared more than once")]
  DuplicateExport { name: String },

  #[error("'{referenced_by}' references undeclared resource '{node}'")]
  UnknownNode { node: String, referenced_by: String },

  #[error(transparent)]
  Cycle(#[from] CycleError),
}
