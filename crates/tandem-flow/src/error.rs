/// Errors surfaced by the coordination core.
#[derive(Debug, thiserror::Error)]
pub enum FlowError {
  /// The execution engine is missing or unusable.
  #[error("configuration error: {message}")]
  Configuration { message: String },

  #[error("invalid value: {message}")]
  InvalidValue { message: String },

  /// The context's time budget is spent.
  #[error("context deadline exceeded")]
  Timeout,

  /// A task failed, or the engine could not deliver its result. Recoverable:
  /// the message is the engine's text, unchanged.
  #[error("{message}")]
  Task { message: String },

  /// The engine answered with something that is not a result envelope.
  #[error("unexpected response format: {message}")]
  ResponseFormat { message: String },

  /// Bookkeeping between flows, coroutines and task keys is broken.
  #[error("internal consistency violated: {message}")]
  InternalConsistency { message: String },
}

impl FlowError {
  pub fn task(message: impl Into<String>) -> Self {
    Self::Task {
      message: message.into(),
    }
  }

  pub(crate) fn internal(message: impl Into<String>) -> Self {
    Self::InternalConsistency {
      message: message.into(),
    }
  }

  pub(crate) fn response_format(message: impl Into<String>) -> Self {
    Self::ResponseFormat {
      message: message.into(),
    }
  }

  pub fn is_task(&self) -> bool {
    matches!(self, Self::Task { .. })
  }
}
