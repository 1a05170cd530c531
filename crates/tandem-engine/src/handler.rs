use std::collections::HashMap;
use std::sync::Arc;

use async_trait::async_trait;

use crate::handlers::{SleepHandler, TicksHandler};
use crate::message::Method;
use crate::task::Task;

/// Runs tasks of one [`Method`].
///
/// A handler must publish exactly one final result (via `complete` or
/// `fail`), optionally preceded by pages. A cancelled task fails with a
/// `closed by task stop` message.
#[async_trait]
pub trait TaskHandler: Send + Sync {
  async fn handle(&self, task: Task);
}

/// Handler registry keyed by method tag.
#[derive(Clone, Default)]
pub struct Handlers {
  handlers: HashMap<Method, Arc<dyn TaskHandler>>,
}

impl Handlers {
  /// An empty registry.
  pub fn new() -> Self {
    Self::default()
  }

  /// A registry with the sleep and ticks handlers installed.
  pub fn with_builtins() -> Self {
    let mut handlers = Self::new();
    handlers.register(Method::SLEEP, SleepHandler);
    handlers.register(Method::TICKS, TicksHandler);
    handlers
  }

  /// Install `handler` for `method`, replacing any previous one.
  pub fn register(&mut self, method: Method, handler: impl TaskHandler + 'static) {
    self.handlers.insert(method, Arc::new(handler));
  }

  pub fn get(&self, method: Method) -> Option<Arc<dyn TaskHandler>> {
    self.handlers.get(&method).cloned()
  }
}
