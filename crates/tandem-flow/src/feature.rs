//! Shared execution path for capability modules.
//!
//! A capability encodes its request, hands it to [`FeatureExecutor`] and
//! decodes the payload of the [`TaskResult`] it gets back. The same call
//! works from plain code (through [`Runtime::block_on`]) and from inside a
//! WaitGroup callback (awaited), because the flow is resolved ambiently.

use std::rc::Rc;

use serde::Serialize;
use tandem_engine::Method;
use tracing::instrument;

use crate::context::Context;
use crate::error::FlowError;
use crate::flow::Flow;
use crate::result::TaskResult;
use crate::runtime::Runtime;

pub struct FeatureExecutor;

impl FeatureExecutor {
  /// Run one task on the current flow.
  #[instrument(name = "feature_exec", skip_all, fields(method = %method))]
  pub async fn exec(
    runtime: &Runtime,
    ctx: &Context,
    method: Method,
    payload: &str,
  ) -> Result<TaskResult, FlowError> {
    let flow = runtime.current_flow();
    flow.exec(ctx, method, payload).await
  }

  /// Like [`exec`](Self::exec) with a payload serialized to JSON.
  pub async fn exec_json<P>(
    runtime: &Runtime,
    ctx: &Context,
    method: Method,
    payload: &P,
  ) -> Result<TaskResult, FlowError>
  where
    P: Serialize + ?Sized,
  {
    let payload = encode(payload)?;
    Self::exec(runtime, ctx, method, &payload).await
  }

  /// Start a task that reports several results.
  ///
  /// The flow is resolved now, so the stream keeps reading from it even if
  /// it is consumed elsewhere.
  pub fn stream<P>(
    runtime: &Runtime,
    ctx: &Context,
    method: Method,
    payload: &P,
  ) -> Result<TaskStream, FlowError>
  where
    P: Serialize + ?Sized,
  {
    Ok(TaskStream {
      flow: runtime.current_flow(),
      context: *ctx,
      method,
      payload: encode(payload)?,
      task_key: None,
      finished: false,
    })
  }
}

fn encode<P: Serialize + ?Sized>(payload: &P) -> Result<String, FlowError> {
  serde_json::to_string(payload).map_err(|e| FlowError::InvalidValue {
    message: format!("failed to encode payload: {e}"),
  })
}

/// Results of one paged task, read one at a time.
///
/// The task is pushed on the first call to [`next`](Self::next). Pages that
/// arrive while the reader waits on something else are kept on the flow
/// until read. Dropping an unfinished stream discards the task's remaining
/// results.
pub struct TaskStream {
  flow: Rc<Flow>,
  context: Context,
  method: Method,
  payload: String,
  task_key: Option<String>,
  finished: bool,
}

impl TaskStream {
  /// The next result, or `None` after the last one (or after an error).
  pub async fn next(&mut self) -> Option<Result<TaskResult, FlowError>> {
    if self.finished {
      return None;
    }

    let result = match &self.task_key {
      None => {
        self
          .flow
          .exec(&self.context, self.method, &self.payload)
          .await
      }
      Some(task_key) => self.flow.suspend(&self.context, task_key).await,
    };

    match result {
      Ok(result) => {
        self.task_key = Some(result.task_key.clone());
        self.finished = !result.has_next;
        Some(Ok(result))
      }
      Err(e) => {
        self.finished = true;
        Some(Err(e))
      }
    }
  }

  /// Read every remaining result.
  pub async fn collect(mut self) -> Result<Vec<TaskResult>, FlowError> {
    let mut results = Vec::new();
    while let Some(result) = self.next().await {
      results.push(result?);
    }
    Ok(results)
  }

  pub fn is_finished(&self) -> bool {
    self.finished
  }
}

impl Drop for TaskStream {
  fn drop(&mut self) {
    if self.finished {
      return;
    }
    if let Some(task_key) = &self.task_key {
      self.flow.abandon(task_key);
    }
  }
}
