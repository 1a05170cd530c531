//! Deterministic engine for unit tests.

use std::collections::VecDeque;
use std::sync::Mutex;
use std::sync::atomic::{AtomicUsize, Ordering};

use tandem_engine::{Engine, EngineError, Message};

type Responder = Box<dyn Fn(&Message) -> String + Send + Sync>;

/// Answers each `wait` with a response built from the oldest pushed message.
pub(crate) struct ScriptedEngine {
  available: bool,
  queue: Mutex<VecDeque<Message>>,
  pushed: AtomicUsize,
  stopped: Mutex<Vec<String>>,
  respond: Responder,
}

impl ScriptedEngine {
  pub(crate) fn respond(respond: impl Fn(&Message) -> String + Send + Sync + 'static) -> Self {
    Self {
      available: true,
      queue: Mutex::new(VecDeque::new()),
      pushed: AtomicUsize::new(0),
      stopped: Mutex::new(Vec::new()),
      respond: Box::new(respond),
    }
  }

  /// Every task succeeds with an empty payload.
  pub(crate) fn echo() -> Self {
    Self::respond(|message| Self::envelope(message, &message.task_key, false, ""))
  }

  pub(crate) fn unavailable() -> Self {
    Self {
      available: false,
      ..Self::echo()
    }
  }

  pub(crate) fn envelope(message: &Message, task_key: &str, is_error: bool, payload: &str) -> String {
    serde_json::json!({
      "fk": message.flow_key,
      "md": message.method,
      "tk": task_key,
      "er": is_error,
      "pl": payload,
      "hn": false,
    })
    .to_string()
  }

  pub(crate) fn pushed(&self) -> usize {
    self.pushed.load(Ordering::SeqCst)
  }

  pub(crate) fn stopped(&self) -> Vec<String> {
    self.stopped.lock().unwrap().clone()
  }
}

impl Engine for ScriptedEngine {
  fn push(&self, message: Message) -> Result<(), EngineError> {
    self.pushed.fetch_add(1, Ordering::SeqCst);
    self.queue.lock().unwrap().push_back(message);
    Ok(())
  }

  fn wait(&self, _flow_key: &str, _timeout_ms: i64) -> String {
    match self.queue.lock().unwrap().pop_front() {
      Some(message) => (self.respond)(&message),
      None => "error: timeout waiting for task completion".to_string(),
    }
  }

  fn count(&self) -> usize {
    self.queue.lock().unwrap().len()
  }

  fn stop_flow(&self, flow_key: &str) {
    self.stopped.lock().unwrap().push(flow_key.to_string());
    self
      .queue
      .lock()
      .unwrap()
      .retain(|message| message.flow_key != flow_key);
  }

  fn destroy(&self) {
    self.queue.lock().unwrap().clear();
  }

  fn is_available(&self) -> bool {
    self.available
  }
}
