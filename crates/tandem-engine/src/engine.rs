//! The engine boundary consumed by the coordination core.

use std::fmt::Display;

use crate::error::EngineError;
use crate::message::Message;

/// Prefix of the sentinel string returned by [`Engine::wait`] on failure.
pub const ERROR_PREFIX: &str = "error:";

/// Format an error as the sentinel string returned by [`Engine::wait`].
pub fn error_envelope(error: &impl Display) -> String {
  format!("{ERROR_PREFIX} {error}")
}

/// An execution engine running tasks on behalf of flows.
///
/// Results are grouped by flow key: `wait` returns the next result produced
/// by any task of the given flow, in the order the engine produced them.
pub trait Engine: Send + Sync {
  /// Enqueue a task. Returns as soon as the task is accepted.
  fn push(&self, message: Message) -> Result<(), EngineError>;

  /// Block until a task of `flow_key` produces a result or `timeout_ms`
  /// elapses.
  ///
  /// Returns the JSON-encoded [`Response`](crate::Response), or a string
  /// starting with [`ERROR_PREFIX`] when no result could be obtained.
  fn wait(&self, flow_key: &str, timeout_ms: i64) -> String;

  /// Number of tasks that have not finished yet.
  fn count(&self) -> usize;

  /// Cancel every pending task of the flow and discard its results.
  fn stop_flow(&self, flow_key: &str);

  /// Cancel everything and start over with an empty state.
  fn destroy(&self);

  fn is_available(&self) -> bool {
    true
  }
}
