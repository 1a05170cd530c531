//! Sleeps for the requested number of milliseconds, then completes with an
//! empty payload.

use std::time::Duration;

use async_trait::async_trait;
use serde::Deserialize;

use crate::handler::TaskHandler;
use crate::task::Task;

#[derive(Debug, Deserialize)]
struct SleepPayload {
  ms: i64,
}

pub struct SleepHandler;

#[async_trait]
impl TaskHandler for SleepHandler {
  async fn handle(&self, task: Task) {
    let payload: SleepPayload = match serde_json::from_str(task.payload()) {
      Ok(payload) => payload,
      Err(e) => {
        task.fail(format!("sleep: parse error: {e}"));
        return;
      }
    };

    let Ok(ms) = u64::try_from(payload.ms) else {
      task.fail("sleep: milliseconds must be greater than zero");
      return;
    };
    if ms == 0 {
      task.fail("sleep: milliseconds must be greater than zero");
      return;
    }

    tokio::select! {
      _ = task.cancelled() => task.fail("sleep: closed by task stop"),
      _ = tokio::time::sleep(Duration::from_millis(ms)) => task.complete(""),
    }
  }
}
