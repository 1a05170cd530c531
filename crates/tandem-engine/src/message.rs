//! Wire types exchanged with an engine.

use std::fmt;

use serde::{Deserialize, Serialize};

/// Numeric method tag selecting the handler that runs a task.
///
/// Tags are owned by the capability that issues them; the coordination core
/// treats them as opaque.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Method(pub u16);

impl Method {
  pub const SLEEP: Method = Method(1);
  pub const TICKS: Method = Method(4);
}

impl fmt::Display for Method {
  fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
    write!(f, "{}", self.0)
  }
}

/// A task pushed into an engine.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Message {
  #[serde(rename = "fk")]
  pub flow_key: String,
  #[serde(rename = "md")]
  pub method: Method,
  #[serde(rename = "tk")]
  pub task_key: String,
  #[serde(rename = "pl")]
  pub payload: String,
}

/// A single result produced by a task.
///
/// Serialized as the success envelope returned from
/// [`Engine::wait`](crate::Engine::wait).
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Response {
  #[serde(rename = "fk")]
  pub flow_key: String,
  #[serde(rename = "md")]
  pub method: Method,
  #[serde(rename = "tk")]
  pub task_key: String,
  #[serde(rename = "er")]
  pub is_error: bool,
  #[serde(rename = "pl")]
  pub payload: String,
  #[serde(rename = "hn")]
  pub has_next: bool,
  /// Milliseconds since the task started.
  #[serde(rename = "ems")]
  pub execution_ms: u64,
}

impl Response {
  /// Final successful result of a task.
  pub fn success(message: &Message, payload: String, execution_ms: u64) -> Self {
    Self::build(message, false, payload, false, execution_ms)
  }

  /// Intermediate result; more results for the same task follow.
  pub fn page(message: &Message, payload: String, execution_ms: u64) -> Self {
    Self::build(message, false, payload, true, execution_ms)
  }

  /// Final failed result; the payload carries the error text.
  pub fn failure(message: &Message, error: String, execution_ms: u64) -> Self {
    Self::build(message, true, error, false, execution_ms)
  }

  fn build(
    message: &Message,
    is_error: bool,
    payload: String,
    has_next: bool,
    execution_ms: u64,
  ) -> Self {
    Self {
      flow_key: message.flow_key.clone(),
      method: message.method,
      task_key: message.task_key.clone(),
      is_error,
      payload,
      has_next,
      execution_ms,
    }
  }
}
