use std::collections::HashSet;

use cairn_value::Fields;
use chrono::{DateTime, Utc};
use indexmap::IndexMap;
use serde::{Deserialize, Serialize};

/// Last known state of one provisioned resource.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ResourceState {
  pub name: String,
  pub kind: String,
  /// Resolved inputs the resource was last provisioned with.
  pub inputs: Fields,
  pub outputs: Fields,
  /// Resources this one depended on when it was provisioned.
  #[serde(default)]
  pub dependencies: Vec<String>,
  pub updated_at: DateTime<Utc>,
}

/// Every resource provisioned for a stack, keyed by logical name.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct StackState {
  #[serde(default)]
  resources: IndexMap<String, ResourceState>,
}

impl StackState {
  pub fn new() -> Self {
    Self::default()
  }

  pub fn get(&self, name: &str) -> Option<&ResourceState> {
    self.resources.get(name)
  }

  pub fn contains(&self, name: &str) -> bool {
    self.resources.contains_key(name)
  }

  /// Insert or replace the record for `resource.name`.
  pub fn insert(&mut self, resource: ResourceState) {
    self.resources.insert(resource.name.clone(), resource);
  }

  pub fn remove(&mut self, name: &str) -> Option<ResourceState> {
    self.resources.shift_remove(name)
  }

  pub fn iter(&self) -> impl Iterator<Item = &ResourceState> {
    self.resources.values()
  }

  pub fn names(&self) -> impl Iterator<Item = &str> {
    self.resources.keys().map(String::as_str)
  }

  pub fn len(&self) -> usize {
    self.resources.len()
  }

  pub fn is_empty(&self) -> bool {
    self.resources.is_empty()
  }

  /// Order `names` for deletion: every resource comes before the resources
  /// it depends on. Unrelated resources are deleted in reverse insertion
  /// order. Names missing from the state are dropped.
  pub fn deletion_order<'a>(&self, names: impl IntoIterator<Item = &'a str>) -> Vec<String> {
    let selected: HashSet<&str> = names.into_iter().collect();

    // Dependencies first, then flip. Depth-first with an explicit work
    // stack of (resource, next dependency to visit).
    let mut done: HashSet<&str> = HashSet::new();
    let mut visiting: HashSet<&str> = HashSet::new();
    let mut order: Vec<&str> = Vec::new();
    for root in self.resources.keys() {
      let root = root.as_str();
      if done.contains(root) {
        continue;
      }
      visiting.insert(root);
      let mut stack: Vec<(&str, usize)> = vec![(root, 0)];

      while let Some((name, next)) = stack.last_mut() {
        let dependency = self
          .resources
          .get(*name)
          .and_then(|resource| resource.dependencies.get(*next));
        *next += 1;

        match dependency {
          Some(dependency) => {
            // A cycle in recorded state can only come from a hand-edited
            // file; the back edge is ignored.
            if let Some((key, _)) = self.resources.get_key_value(dependency.as_str()) {
              let key = key.as_str();
              if !done.contains(key) && visiting.insert(key) {
                stack.push((key, 0));
              }
            }
          }
          None => {
            let name = *name;
            stack.pop();
            visiting.remove(name);
            done.insert(name);
            order.push(name);
          }
        }
      }
    }

    order
      .into_iter()
      .rev()
      .filter(|name| selected.contains(name))
      .map(str::to_string)
      .collect()
  }
}
