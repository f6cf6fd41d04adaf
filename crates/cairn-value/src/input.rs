use serde_json::Value;

use crate::deferred::Deferred;

/// A resource input: either known at declaration time or deferred.
#[derive(Debug, Clone)]
pub enum Input {
  Literal(Value),
  Deferred(Deferred),
}

impl Input {
  /// Nodes this input reads from. Empty for literals.
  pub fn dependencies(&self) -> Vec<String> {
    match self {
      Input::Literal(_) => Vec::new(),
      Input::Deferred(deferred) => deferred.dependencies(),
    }
  }

  pub fn as_literal(&self) -> Option<&Value> {
    match self {
      Input::Literal(value) => Some(value),
      Input::Deferred(_) => None,
    }
  }

  pub fn is_deferred(&self) -> bool {
    matches!(self, Input::Deferred(_))
  }
}

impl From<Deferred> for Input {
  fn from(deferred: Deferred) -> Self {
    Input::Deferred(deferred)
  }
}

impl From<&Deferred> for Input {
  fn from(deferred: &Deferred) -> Self {
    Input::Deferred(deferred.clone())
  }
}

impl From<Value> for Input {
  fn from(value: Value) -> Self {
    Input::Literal(value)
  }
}

impl From<&str> for Input {
  fn from(value: &str) -> Self {
    Input::Literal(Value::String(value.to_string()))
  }
}

impl From<String> for Input {
  fn from(value: String) -> Self {
    Input::Literal(Value::String(value))
  }
}

impl From<bool> for Input {
  fn from(value: bool) -> Self {
    Input::Literal(Value::Bool(value))
  }
}

impl From<i64> for Input {
  fn from(value: i64) -> Self {
    Input::Literal(Value::from(value))
  }
}

impl From<u64> for Input {
  fn from(value: u64) -> Self {
    Input::Literal(Value::from(value))
  }
}

impl From<i32> for Input {
  fn from(value: i32) -> Self {
    Input::Literal(Value::from(value))
  }
}
