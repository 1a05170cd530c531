//! In-process engine backed by a tokio runtime.
//!
//! Every flow owns an unbounded result channel and a cancellation token that
//! is a child of the engine-wide token. Each pushed message runs as its own
//! tokio task; handlers publish into the flow's channel and `wait` blocks the
//! calling thread on that channel.

use std::collections::{HashMap, HashSet};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use std::time::Duration;

use tokio::runtime::{Builder, Runtime};
use tokio::sync::mpsc;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

use crate::config::EngineConfig;
use crate::engine::{Engine, error_envelope};
use crate::error::EngineError;
use crate::handler::Handlers;
use crate::message::{Message, Response};
use crate::task::Task;

type SharedReceiver = Arc<tokio::sync::Mutex<mpsc::UnboundedReceiver<Response>>>;

/// Engine running task handlers on a private multi-threaded tokio runtime.
///
/// `wait` blocks the calling thread and must not be called from inside an
/// async context.
pub struct LocalEngine {
  runtime: Runtime,
  handlers: Handlers,
  state: Arc<Mutex<EngineState>>,
}

struct EngineState {
  cancel: CancellationToken,
  flows: HashMap<String, FlowSlot>,
}

struct FlowSlot {
  cancel: CancellationToken,
  sender: mpsc::UnboundedSender<Response>,
  receiver: SharedReceiver,
  active: HashSet<String>,
}

impl FlowSlot {
  fn new(cancel: CancellationToken) -> Self {
    let (sender, receiver) = mpsc::unbounded_channel();
    Self {
      cancel,
      sender,
      receiver: Arc::new(tokio::sync::Mutex::new(receiver)),
      active: HashSet::new(),
    }
  }
}

impl EngineState {
  fn finish(&mut self, flow_key: &str, task_key: &str) {
    // The flow is gone when it was stopped while the task was running.
    if let Some(slot) = self.flows.get_mut(flow_key) {
      slot.active.remove(task_key);
    }
  }
}

/// Clears a task from its flow's active set.
struct Finish {
  state: Arc<Mutex<EngineState>>,
  flow_key: String,
  task_key: String,
}

impl Drop for Finish {
  fn drop(&mut self) {
    lock(&self.state).finish(&self.flow_key, &self.task_key);
  }
}

fn lock(state: &Mutex<EngineState>) -> MutexGuard<'_, EngineState> {
  state.lock().unwrap_or_else(PoisonError::into_inner)
}

impl LocalEngine {
  /// Create an engine with the built-in handlers.
  pub fn new(config: EngineConfig) -> Result<Self, EngineError> {
    Self::with_handlers(config, Handlers::with_builtins())
  }

  /// Create an engine with a custom handler registry.
  pub fn with_handlers(config: EngineConfig, handlers: Handlers) -> Result<Self, EngineError> {
    let runtime = Builder::new_multi_thread()
      .worker_threads(config.worker_threads.max(1))
      .thread_name(config.thread_name.clone())
      .enable_all()
      .build()?;

    info!(
      worker_threads = config.worker_threads,
      "local engine started"
    );

    Ok(Self {
      runtime,
      handlers,
      state: Arc::new(Mutex::new(EngineState {
        cancel: CancellationToken::new(),
        flows: HashMap::new(),
      })),
    })
  }

  /// Number of flows with a live result channel.
  pub fn flow_count(&self) -> usize {
    lock(&self.state).flows.len()
  }

  fn next_response(&self, flow_key: &str, timeout_ms: i64) -> Result<Response, EngineError> {
    let timeout = match u64::try_from(timeout_ms) {
      Ok(ms) if ms > 0 => Duration::from_millis(ms),
      _ => return Err(EngineError::InvalidTimeout),
    };

    let (receiver, cancel) = {
      let state = lock(&self.state);
      let slot = state.flows.get(flow_key).ok_or(EngineError::FlowNotFound)?;
      (Arc::clone(&slot.receiver), slot.cancel.clone())
    };

    self.runtime.block_on(async move {
      let mut receiver = receiver.lock().await;
      tokio::select! {
        biased;
        response = receiver.recv() => response.ok_or(EngineError::ChannelClosed),
        _ = cancel.cancelled() => Err(EngineError::FlowStopped),
        _ = tokio::time::sleep(timeout) => Err(EngineError::WaitTimeout),
      }
    })
  }
}

impl Engine for LocalEngine {
  fn push(&self, message: Message) -> Result<(), EngineError> {
    let handler = self
      .handlers
      .get(message.method)
      .ok_or(EngineError::UnknownMethod {
        method: message.method,
      })?;

    let flow_key = message.flow_key.clone();
    let task_key = message.task_key.clone();
    let method = message.method;

    let task = {
      let mut guard = lock(&self.state);
      let EngineState { cancel, flows } = &mut *guard;
      let slot = flows
        .entry(flow_key.clone())
        .or_insert_with(|| FlowSlot::new(cancel.child_token()));
      slot.active.insert(task_key.clone());
      Task::new(message, slot.cancel.child_token(), slot.sender.clone())
    };

    debug!(flow_key = %flow_key, task_key = %task_key, method = %method, "task accepted");

    let finish = Finish {
      state: Arc::clone(&self.state),
      flow_key,
      task_key,
    };
    self.runtime.spawn(async move {
      // Dropped when the handler returns or panics.
      let _finish = finish;
      handler.handle(task).await;
    });

    Ok(())
  }

  fn wait(&self, flow_key: &str, timeout_ms: i64) -> String {
    let encoded = self
      .next_response(flow_key, timeout_ms)
      .and_then(|response| serde_json::to_string(&response).map_err(EngineError::from));

    match encoded {
      Ok(envelope) => envelope,
      Err(e) => {
        warn!(flow_key = %flow_key, timeout_ms, error = %e, "wait failed");
        error_envelope(&e)
      }
    }
  }

  fn count(&self) -> usize {
    lock(&self.state)
      .flows
      .values()
      .map(|slot| slot.active.len())
      .sum()
  }

  fn stop_flow(&self, flow_key: &str) {
    let slot = lock(&self.state).flows.remove(flow_key);
    if let Some(slot) = slot {
      slot.cancel.cancel();
      info!(flow_key = %flow_key, cancelled = slot.active.len(), "flow stopped");
    }
  }

  fn destroy(&self) {
    let mut state = lock(&self.state);
    state.cancel.cancel();
    state.flows.clear();
    state.cancel = CancellationToken::new();
    info!("local engine reset");
  }
}
