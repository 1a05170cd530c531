/// Runtime settings for a [`LocalEngine`](crate::LocalEngine).
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EngineConfig {
  /// Number of tokio worker threads running task handlers.
  pub worker_threads: usize,
  /// Name given to the worker threads.
  pub thread_name: String,
}

impl Default for EngineConfig {
  fn default() -> Self {
    Self {
      worker_threads: 2,
      thread_name: "tandem-engine".to_string(),
    }
  }
}
