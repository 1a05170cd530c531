use std::time::Instant;

use tokio::sync::mpsc;
use tokio_util::sync::{CancellationToken, WaitForCancellationFuture};

use crate::message::{Message, Response};

/// A running task as seen by its [`TaskHandler`](crate::TaskHandler).
///
/// Results are published through the owning flow's channel. A cancelled task
/// is expected to report that through [`fail`](Self::fail) and stop.
pub struct Task {
  message: Message,
  cancel: CancellationToken,
  results: mpsc::UnboundedSender<Response>,
  started: Instant,
}

impl Task {
  pub(crate) fn new(
    message: Message,
    cancel: CancellationToken,
    results: mpsc::UnboundedSender<Response>,
  ) -> Self {
    Self {
      message,
      cancel,
      results,
      started: Instant::now(),
    }
  }

  pub fn message(&self) -> &Message {
    &self.message
  }

  pub fn payload(&self) -> &str {
    &self.message.payload
  }

  /// Resolves when the task's flow is stopped or the engine destroyed.
  pub fn cancelled(&self) -> WaitForCancellationFuture<'_> {
    self.cancel.cancelled()
  }

  pub fn is_cancelled(&self) -> bool {
    self.cancel.is_cancelled()
  }

  /// Publish the final result.
  pub fn complete(&self, payload: impl Into<String>) {
    self.publish(Response::success(
      &self.message,
      payload.into(),
      self.elapsed_ms(),
    ));
  }

  /// Publish an intermediate result; the task keeps running.
  pub fn page(&self, payload: impl Into<String>) {
    self.publish(Response::page(&self.message, payload.into(), self.elapsed_ms()));
  }

  /// Publish a failure as the final result.
  pub fn fail(&self, error: impl Into<String>) {
    self.publish(Response::failure(
      &self.message,
      error.into(),
      self.elapsed_ms(),
    ));
  }

  fn publish(&self, response: Response) {
    // The receiver is gone once the flow was stopped.
    let _ = self.results.send(response);
  }

  fn elapsed_ms(&self) -> u64 {
    u64::try_from(self.started.elapsed().as_millis()).unwrap_or(u64::MAX)
  }
}
