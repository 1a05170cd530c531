//! Core-side wrapper around the execution engine.

use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering};

use tandem_engine::{Engine, Message, Method};
use tracing::{debug, warn};

use crate::error::FlowError;
use crate::result::{RunningTask, TaskResult};

static TASK_SEQUENCE: AtomicU64 = AtomicU64::new(0);

/// Pushes tasks into an [`Engine`] and decodes what comes back.
pub struct Gateway {
  engine: Arc<dyn Engine>,
}

impl Gateway {
  /// Wrap `engine`; fails when the engine reports itself unavailable.
  pub fn new(engine: Arc<dyn Engine>) -> Result<Self, FlowError> {
    if !engine.is_available() {
      return Err(FlowError::Configuration {
        message: "execution engine is not available".to_string(),
      });
    }
    Ok(Self { engine })
  }

  /// Enqueue a task for `flow_key`.
  ///
  /// Task keys are `"{flow_key}:{n}"` with `n` unique for the process.
  pub fn push(
    &self,
    flow_key: &str,
    method: Method,
    payload: &str,
  ) -> Result<RunningTask, FlowError> {
    let sequence = TASK_SEQUENCE.fetch_add(1, Ordering::Relaxed) + 1;
    let task_key = format!("{flow_key}:{sequence}");

    self
      .engine
      .push(Message {
        flow_key: flow_key.to_string(),
        method,
        task_key: task_key.clone(),
        payload: payload.to_string(),
      })
      .map_err(|e| FlowError::task(e.to_string()))?;

    debug!(flow_key = %flow_key, task_key = %task_key, method = %method, "task pushed");
    Ok(RunningTask { task_key })
  }

  /// Block until a task of `flow_key` reports a result.
  ///
  /// Error results are returned as values; only a failed wait is an `Err`.
  pub fn wait(&self, flow_key: &str, remain_ms: i64) -> Result<TaskResult, FlowError> {
    let envelope = self.engine.wait(flow_key, remain_ms);
    let result = TaskResult::from_envelope(&envelope);

    match &result {
      Ok(result) => debug!(
        flow_key = %flow_key,
        task_key = %result.task_key,
        is_error = result.is_error,
        has_next = result.has_next,
        "task result received"
      ),
      Err(e) => warn!(flow_key = %flow_key, remain_ms, error = %e, "wait failed"),
    }
    result
  }

  pub fn count(&self) -> usize {
    self.engine.count()
  }

  pub fn stop_flow(&self, flow_key: &str) {
    self.engine.stop_flow(flow_key);
  }

  pub fn destroy(&self) {
    self.engine.destroy();
  }
}
