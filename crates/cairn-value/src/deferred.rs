use std::fmt;
use std::sync::Arc;

use serde_json::Value;
use uuid::Uuid;

use crate::input::Input;

type Transform = dyn Fn(&[Value]) -> Result<Value, String> + Send + Sync;

/// A value that becomes known only after one or more resources are provisioned.
///
/// Cloning is cheap and clones share identity, so a transformation shared by
/// several dependents is still evaluated once per run.
#[derive(Clone)]
pub struct Deferred {
  inner: Arc<Inner>,
}

struct Inner {
  id: Uuid,
  source: Source,
}

pub(crate) enum Source {
  Literal(Value),
  Output { node: String, field: String },
  Derived {
    sources: Vec<Deferred>,
    transform: Box<Transform>,
  },
}

impl Deferred {
  fn from_source(source: Source) -> Self {
    Self {
      inner: Arc::new(Inner {
        id: Uuid::new_v4(),
        source,
      }),
    }
  }

  /// An already-known value, useful as a source of [`Deferred::derive`].
  pub fn literal(value: impl Into<Value>) -> Self {
    Self::from_source(Source::Literal(value.into()))
  }

  /// Output `field` of the resource named `node`.
  ///
  /// `field` may be a path such as `statuses.0.url`. The node does not have
  /// to be declared yet; undeclared references are reported when the stack
  /// is validated.
  pub fn output(node: impl Into<String>, field: impl Into<String>) -> Self {
    Self::from_source(Source::Output {
      node: node.into(),
      field: field.into(),
    })
  }

  /// Derive a new value from `sources` with a pure transformation.
  pub fn derive<I, F>(sources: I, transform: F) -> Self
  where
    I: IntoIterator<Item = Deferred>,
    F: Fn(&[Value]) -> Value + Send + Sync + 'static,
  {
    Self::try_derive(sources, move |values| Ok(transform(values)))
  }

  /// Like [`Deferred::derive`], but the transformation may reject its inputs.
  pub fn try_derive<I, F>(sources: I, transform: F) -> Self
  where
    I: IntoIterator<Item = Deferred>,
    F: Fn(&[Value]) -> Result<Value, String> + Send + Sync + 'static,
  {
    Self::from_source(Source::Derived {
      sources: sources.into_iter().collect(),
      transform: Box::new(transform),
    })
  }

  /// Derive a new value from this one alone.
  pub fn apply<F>(&self, transform: F) -> Self
  where
    F: Fn(&Value) -> Value + Send + Sync + 'static,
  {
    Self::derive([self.clone()], move |values| transform(&values[0]))
  }

  pub fn id(&self) -> Uuid {
    self.inner.id
  }

  pub(crate) fn source(&self) -> &Source {
    &self.inner.source
  }

  /// Names of the nodes this value reads from, in first-reference order.
  pub fn dependencies(&self) -> Vec<String> {
    let mut names = Vec::new();
    self.collect_dependencies(&mut names);
    names
  }

  fn collect_dependencies(&self, names: &mut Vec<String>) {
    match self.source() {
      Source::Literal(_) => {}
      Source::Output { node, .. } => {
        if !names.contains(node) {
          names.push(node.clone());
        }
      }
      Source::Derived { sources, .. } => {
        for source in sources {
          source.collect_dependencies(names);
        }
      }
    }
  }
}

impl fmt::Debug for Deferred {
  fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
    match self.source() {
      Source::Literal(value) => f.debug_tuple("Deferred::Literal").field(value).finish(),
      Source::Output { node, field } => f
        .debug_struct("Deferred::Output")
        .field("node", node)
        .field("field", field)
        .finish(),
      Source::Derived { sources, .. } => f
        .debug_struct("Deferred::Derived")
        .field("sources", sources)
        .finish_non_exhaustive(),
    }
  }
}

/// Concatenate literals and deferred values into one string.
///
/// Strings are inserted verbatim and other JSON values as their JSON text.
/// No separator or URL normalization is applied:
/// `interpolate([url.into(), "/events".into()])` with
/// `url = "https://x.example/"` gives `"https://x.example//events"`.
pub fn interpolate<I, P>(parts: I) -> Deferred
where
  I: IntoIterator<Item = P>,
  P: Into<Input>,
{
  let sources = parts.into_iter().map(|part| match part.into() {
    Input::Literal(value) => Deferred::literal(value),
    Input::Deferred(deferred) => deferred,
  });

  Deferred::derive(sources, |values| {
    let mut out = String::new();
    for value in values {
      match value {
        Value::String(s) => out.push_str(s),
        other => out.push_str(&other.to_string()),
      }
    }
    Value::String(out)
  })
}
