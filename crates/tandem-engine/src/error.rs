use crate::message::Method;

/// Errors raised by an engine.
///
/// The `Display` text of the wait-related variants is what ends up in the
/// `error: ...` sentinel returned from [`Engine::wait`](crate::Engine::wait).
#[derive(Debug, thiserror::Error)]
pub enum EngineError {
  #[error("unknown method: {method}")]
  UnknownMethod { method: Method },

  #[error("flow not found")]
  FlowNotFound,

  #[error("timeout must be greater than 0")]
  InvalidTimeout,

  #[error("timeout waiting for task completion")]
  WaitTimeout,

  #[error("flow stopped")]
  FlowStopped,

  #[error("result channel closed")]
  ChannelClosed,

  #[error("failed to encode response: {0}")]
  Encode(#[from] serde_json::Error),

  #[error("failed to start engine runtime: {0}")]
  Runtime(#[from] std::io::Error),
}
