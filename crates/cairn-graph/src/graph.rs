use std::collections::HashMap;

use indexmap::IndexMap;

use crate::error::{CycleError, GraphError};
use crate::node::ResourceNode;

/// Resource nodes plus the edges induced by their references.
///
/// An edge `A -> B` means B reads from (or explicitly depends on) A, so A
/// must reach a terminal state before B starts.
#[derive(Debug, Clone, Default)]
pub struct DependencyGraph {
  /// Nodes in declaration order.
  nodes: IndexMap<String, ResourceNode>,
  /// Adjacency list: node -> downstream nodes.
  adjacency: HashMap<String, Vec<String>>,
  /// Reverse adjacency: node -> upstream nodes.
  reverse_adjacency: HashMap<String, Vec<String>>,
}

enum Mark {
  Visiting,
  Done,
}

struct Frame<'a> {
  name: &'a str,
  upstream: Vec<&'a str>,
  next: usize,
}

impl DependencyGraph {
  pub fn new() -> Self {
    Self::default()
  }

  /// Add a node and derive its incoming edges.
  ///
  /// Upstream nodes may be declared later; references that never get
  /// declared are reported by [`DependencyGraph::validate`].
  pub fn add_node(&mut self, node: ResourceNode) -> Result<(), GraphError> {
    if self.nodes.contains_key(&node.name) {
      return Err(GraphError::DuplicateNode { name: node.name });
    }

    let name = node.name.clone();
    let dependencies = node.dependencies();
    self.nodes.insert(name.clone(), node);
    self.adjacency.entry(name.clone()).or_default();
    self.reverse_adjacency.entry(name.clone()).or_default();

    for upstream in dependencies {
      self.add_edge(&upstream, &name);
    }
    Ok(())
  }

  pub(crate) fn add_edge(&mut self, from: &str, to: &str) {
    let downstream = self.adjacency.entry(from.to_string()).or_default();
    if !downstream.iter().any(|n| n == to) {
      downstream.push(to.to_string());
    }
    let upstream = self.reverse_adjacency.entry(to.to_string()).or_default();
    if !upstream.iter().any(|n| n == from) {
      upstream.push(from.to_string());
    }
  }

  pub fn node(&self, name: &str) -> Option<&ResourceNode> {
    self.nodes.get(name)
  }

  pub fn contains(&self, name: &str) -> bool {
    self.nodes.contains_key(name)
  }

  /// Nodes in declaration order.
  pub fn nodes(&self) -> impl Iterator<Item = &ResourceNode> {
    self.nodes.values()
  }

  pub fn len(&self) -> usize {
    self.nodes.len()
  }

  pub fn is_empty(&self) -> bool {
    self.nodes.is_empty()
  }

  /// Position of a node in declaration order.
  pub fn declaration_index(&self, name: &str) -> Option<usize> {
    self.nodes.get_index_of(name)
  }

  /// Get downstream nodes for a given node.
  pub fn downstream(&self, name: &str) -> &[String] {
    self
      .adjacency
      .get(name)
      .map(|v| v.as_slice())
      .unwrap_or(&[])
  }

  /// Get upstream nodes for a given node.
  pub fn upstream(&self, name: &str) -> &[String] {
    self
      .reverse_adjacency
      .get(name)
      .map(|v| v.as_slice())
      .unwrap_or(&[])
  }

  /// Every node that depends on `name`, directly or transitively, in
  /// declaration order.
  pub fn dependents_closure(&self, name: &str) -> Vec<String> {
    let mut seen: Vec<&str> = Vec::new();
    let mut queue: Vec<&str> = vec![name];
    while let Some(current) = queue.pop() {
      for next in self.downstream(current) {
        if next != name && !seen.contains(&next.as_str()) {
          seen.push(next);
          queue.push(next);
        }
      }
    }
    seen.sort_by_key(|n| self.declaration_index(n));
    seen.into_iter().map(str::to_string).collect()
  }

  /// Check that every referenced node exists and that there is no cycle.
  pub fn validate(&self) -> Result<Vec<String>, GraphError> {
    for node in self.nodes.values() {
      for upstream in self.upstream(&node.name) {
        if !self.nodes.contains_key(upstream) {
          return Err(GraphError::UnknownNode {
            node: upstream.clone(),
            referenced_by: node.name.clone(),
          });
        }
      }
    }
    Ok(self.topological_order()?)
  }

  /// Order nodes so that every node comes after all of its upstreams.
  ///
  /// Depth-first over upstream edges with an explicit work stack. Roots are
  /// taken in declaration order and each node's upstreams are visited in
  /// declaration order, so nodes without a relative constraint keep their
  /// declaration order. References to undeclared nodes are skipped here.
  pub fn topological_order(&self) -> Result<Vec<String>, CycleError> {
    let mut marks: HashMap<&str, Mark> = HashMap::with_capacity(self.nodes.len());
    let mut order = Vec::with_capacity(self.nodes.len());

    for root in self.nodes.keys() {
      let root = root.as_str();
      if marks.contains_key(root) {
        continue;
      }
      marks.insert(root, Mark::Visiting);
      // The frames on the stack are the current path from `root`.
      let mut stack = vec![Frame {
        name: root,
        upstream: self.declared_upstream(root),
        next: 0,
      }];

      while let Some(frame) = stack.last_mut() {
        let up = frame.upstream.get(frame.next).copied();
        frame.next += 1;

        let Some(up) = up else {
          let name = frame.name;
          stack.pop();
          marks.insert(name, Mark::Done);
          order.push(name.to_string());
          continue;
        };

        match marks.get(up) {
          Some(Mark::Done) => {}
          Some(Mark::Visiting) => {
            let start = stack.iter().position(|f| f.name == up).unwrap_or(0);
            return Err(CycleError {
              members: stack[start..].iter().map(|f| f.name.to_string()).collect(),
            });
          }
          None => {
            marks.insert(up, Mark::Visiting);
            stack.push(Frame {
              name: up,
              upstream: self.declared_upstream(up),
              next: 0,
            });
          }
        }
      }
    }
    Ok(order)
  }

  /// Declared upstreams of `name`, in declaration order.
  fn declared_upstream(&self, name: &str) -> Vec<&str> {
    let mut upstream: Vec<&str> = self
      .upstream(name)
      .iter()
      .map(String::as_str)
      .filter(|n| self.nodes.contains_key(*n))
      .collect();
    upstream.sort_by_key(|n| self.declaration_index(n));
    upstream
  }
}
