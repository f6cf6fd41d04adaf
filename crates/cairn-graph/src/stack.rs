//! Declaration surface.
//!
//! ```ignore
//! let mut builder = StackBuilder::new("fog");
//!
//! let topic = builder
//!   .resource("fog-events-topic", "gcp:pubsub/Topic")
//!   .input("name", "fog-events")
//!   .declare()?;
//!
//! let service = builder
//!   .resource("fog-ingestion", "gcp:cloudrun/Service")
//!   .input("location", "us-central1")
//!   .declare()?;
//!
//! builder
//!   .resource("fog-push-sub", "gcp:pubsub/Subscription")
//!   .input("topic", topic.output("name"))
//!   .input("push_endpoint", interpolate([service.output("url").into(), "/events".into()]))
//!   .declare()?;
//!
//! builder.export("cloudRunUrl", service.output("url"))?;
//! let stack = builder.build();
//! ```

use cairn_value::{Deferred, Input};

use crate::error::GraphError;
use crate::graph::DependencyGraph;
use crate::node::ResourceNode;

/// A value surfaced to the caller once the run is over.
#[derive(Debug, Clone)]
pub struct ExportDecl {
  pub name: String,
  pub value: Input,
}

/// A fully declared stack, ready to hand to an engine.
#[derive(Debug, Clone)]
pub struct Stack {
  name: String,
  graph: DependencyGraph,
  exports: Vec<ExportDecl>,
}

impl Stack {
  pub fn name(&self) -> &str {
    &self.name
  }

  pub fn graph(&self) -> &DependencyGraph {
    &self.graph
  }

  /// Exports in declaration order.
  pub fn exports(&self) -> &[ExportDecl] {
    &self.exports
  }

  /// Validate the graph and the exports' references. Returns the
  /// topological order on success.
  pub fn validate(&self) -> Result<Vec<String>, GraphError> {
    let order = self.graph.validate()?;
    for export in &self.exports {
      for node in export.value.dependencies() {
        if !self.graph.contains(&node) {
          return Err(GraphError::UnknownNode {
            node,
            referenced_by: format!("export:{}", export.name),
          });
        }
      }
    }
    Ok(order)
  }
}

/// Collects declarations. Performs no resolution and no external calls.
#[derive(Debug)]
pub struct StackBuilder {
  name: String,
  graph: DependencyGraph,
  exports: Vec<ExportDecl>,
}

impl StackBuilder {
  pub fn new(name: impl Into<String>) -> Self {
    Self {
      name: name.into(),
      graph: DependencyGraph::new(),
      exports: Vec::new(),
    }
  }

  /// Start declaring a resource. Nothing is recorded until
  /// [`ResourceBuilder::declare`] is called.
  pub fn resource(
    &mut self,
    name: impl Into<String>,
    kind: impl Into<String>,
  ) -> ResourceBuilder<'_> {
    ResourceBuilder {
      builder: self,
      node: ResourceNode::new(name, kind),
    }
  }

  /// Add an already-assembled node.
  pub fn add(&mut self, node: ResourceNode) -> Result<ResourceRef, GraphError> {
    let reference = ResourceRef {
      name: node.name.clone(),
      kind: node.kind.clone(),
    };
    self.graph.add_node(node)?;
    Ok(reference)
  }

  pub fn export(
    &mut self,
    name: impl Into<String>,
    value: impl Into<Input>,
  ) -> Result<&mut Self, GraphError> {
    let name = name.into();
    if self.exports.iter().any(|e| e.name == name) {
      return Err(GraphError::DuplicateExport { name });
    }
    self.exports.push(ExportDecl {
      name,
      value: value.into(),
    });
    Ok(self)
  }

  /// Finish the build phase. Validation happens when the stack is executed
  /// (or through [`Stack::validate`]).
  pub fn build(self) -> Stack {
    Stack {
      name: self.name,
      graph: self.graph,
      exports: self.exports,
    }
  }
}

pub struct ResourceBuilder<'a> {
  builder: &'a mut StackBuilder,
  node: ResourceNode,
}

impl ResourceBuilder<'_> {
  pub fn input(mut self, field: impl Into<String>, value: impl Into<Input>) -> Self {
    self.node.inputs.insert(field.into(), value.into());
    self
  }

  /// Order this resource after `other` without reading any of its outputs.
  pub fn depends_on(mut self, other: impl AsRef<str>) -> Self {
    let other = other.as_ref().to_string();
    if !self.node.depends_on.contains(&other) {
      self.node.depends_on.push(other);
    }
    self
  }

  pub fn timeout_ms(mut self, timeout_ms: u64) -> Self {
    self.node.timeout_ms = Some(timeout_ms);
    self
  }

  pub fn max_attempts(mut self, max_attempts: u32) -> Self {
    self.node.max_attempts = Some(max_attempts);
    self
  }

  pub fn declare(self) -> Result<ResourceRef, GraphError> {
    self.builder.add(self.node)
  }
}

/// Handle to a declared resource, used to reference its outputs.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ResourceRef {
  name: String,
  kind: String,
}

impl ResourceRef {
  /// Reference a resource by name without holding its handle, e.g. one
  /// declared further down.
  pub fn named(name: impl Into<String>, kind: impl Into<String>) -> Self {
    Self {
      name: name.into(),
      kind: kind.into(),
    }
  }

  pub fn name(&self) -> &str {
    &self.name
  }

  pub fn kind(&self) -> &str {
    &self.kind
  }

  /// Deferred value of one of this resource's outputs.
  pub fn output(&self, field: impl Into<String>) -> Deferred {
    Deferred::output(self.name.clone(), field)
  }
}

impl AsRef<str> for ResourceRef {
  fn as_ref(&self) -> &str {
    &self.name
  }
}

#[cfg(test)]
mod tests {
  use cairn_value::interpolate;
  use serde_json::json;

  use super::*;

  #[test]
  fn test_builder_derives_edges() {
    let mut builder = StackBuilder::new("fog");

    let topic = builder
      .resource("topic", "gcp:pubsub/Topic")
      .input("name", "fog-events")
      .declare()
      .unwrap();
    let service = builder
      .resource("service", "gcp:cloudrun/Service")
      .input("location", "us-central1")
      .declare()
      .unwrap();
    let invoker = builder
      .resource("invoker", "gcp:cloudrun/IamMember")
      .input("service", service.output("name"))
      .input("member", "allUsers")
      .declare()
      .unwrap();
    builder
      .resource("subscription", "gcp:pubsub/Subscription")
      .input("topic", topic.output("name"))
      .input(
        "push_endpoint",
        interpolate([Input::from(service.output("url")), Input::from("/events")]),
      )
      .input("ack_deadline_seconds", 60)
      .depends_on(&invoker)
      .declare()
      .unwrap();
    builder.export("topicName", topic.output("name")).unwrap();

    let stack = builder.build();
    let graph = stack.graph();

    assert_eq!(graph.len(), 4);
    assert_eq!(graph.upstream("subscription"), ["topic", "service", "invoker"]);
    assert_eq!(graph.downstream("service"), ["invoker", "subscription"]);
    assert_eq!(
      graph.node("subscription").unwrap().inputs["ack_deadline_seconds"]
        .as_literal(),
      Some(&json!(60))
    );
    assert_eq!(stack.exports()[0].name, "topicName");
    assert_eq!(
      stack.validate().unwrap(),
      vec!["topic", "service", "invoker", "subscription"]
    );
  }

  #[test]
  fn test_build_does_not_validate() {
    let mut builder = StackBuilder::new("broken");
    builder
      .resource("a", "test")
      .input("x", Deferred::output("b", "x"))
      .declare()
      .unwrap();
    builder
      .resource("b", "test")
      .input("x", Deferred::output("a", "x"))
      .declare()
      .unwrap();

    let stack = builder.build();
    assert!(matches!(stack.validate(), Err(GraphError::Cycle(_))));
  }

  #[test]
  fn test_export_referencing_unknown_node() {
    let mut builder = StackBuilder::new("fog");
    builder
      .export("dbName", Deferred::output("database", "name"))
      .unwrap();

    assert_eq!(
      builder.build().validate().unwrap_err(),
      GraphError::UnknownNode {
        node: "database".to_string(),
        referenced_by: "export:dbName".to_string(),
      }
    );
  }

  #[test]
  fn test_duplicate_export_rejected() {
    let mut builder = StackBuilder::new("fog");
    builder.export("region", "us-central1").unwrap();
    let err = builder.export("region", "europe-west1").unwrap_err();
    assert!(matches!(err, GraphError::DuplicateExport { .. }));
  }

  #[test]
  fn test_duplicate_resource_rejected() {
    let mut builder = StackBuilder::new("fog");
    builder.resource("topic", "gcp:pubsub/Topic").declare().unwrap();
    let err = builder
      .resource("topic", "gcp:pubsub/Topic")
      .declare()
      .unwrap_err();
    assert!(matches!(err, GraphError::DuplicateNode { .. }));
  }
}
