use serde::{Deserialize, Serialize};
use tandem_engine::{ERROR_PREFIX, Method};

use crate::error::FlowError;

/// A result delivered by the engine for one task.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TaskResult {
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
}

/// A task accepted by the engine whose result is not known yet.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RunningTask {
  pub task_key: String,
}

impl TaskResult {
  /// Decode the string returned by [`Engine::wait`](tandem_engine::Engine::wait).
  pub fn from_envelope(envelope: &str) -> Result<Self, FlowError> {
    if envelope.starts_with(ERROR_PREFIX) {
      return Err(FlowError::task(envelope));
    }

    let value: serde_json::Value = serde_json::from_str(envelope)
      .map_err(|e| FlowError::response_format(format!("response is not JSON: {e}")))?;

    serde_json::from_value(value).map_err(|e| FlowError::response_format(e.to_string()))
  }

  /// Turn an error result into [`FlowError::Task`].
  pub fn into_checked(self) -> Result<Self, FlowError> {
    if !self.is_error {
      return Ok(self);
    }
    if self.payload.is_empty() {
      return Err(FlowError::task("Unknown error"));
    }
    Err(FlowError::task(self.payload))
  }
}
