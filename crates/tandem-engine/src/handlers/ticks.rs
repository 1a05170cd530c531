//! Emits `count` results spaced `ms` apart. Every result but the last is a
//! page; each payload is `{"tick": n}` starting at 1.

use std::time::Duration;

use async_trait::async_trait;
use serde::Deserialize;

use crate::handler::TaskHandler;
use crate::task::Task;

#[derive(Debug, Deserialize)]
struct TicksPayload {
  count: u32,
  ms: i64,
}

pub struct TicksHandler;

#[async_trait]
impl TaskHandler for TicksHandler {
  async fn handle(&self, task: Task) {
    let payload: TicksPayload = match serde_json::from_str(task.payload()) {
      Ok(payload) => payload,
      Err(e) => {
        task.fail(format!("ticks: parse error: {e}"));
        return;
      }
    };
    if payload.count == 0 {
      task.fail("ticks: count must be greater than zero");
      return;
    }
    let interval = match u64::try_from(payload.ms) {
      Ok(ms) if ms > 0 => Duration::from_millis(ms),
      _ => {
        task.fail("ticks: milliseconds must be greater than zero");
        return;
      }
    };

    for tick in 1..=payload.count {
      tokio::select! {
        _ = task.cancelled() => {
          task.fail("ticks: closed by task stop");
          return;
        }
        _ = tokio::time::sleep(interval) => {}
      }

      let body = serde_json::json!({ "tick": tick }).to_string();
      if tick < payload.count {
        task.page(body);
      } else {
        task.complete(body);
      }
    }
  }
}
