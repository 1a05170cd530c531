//! A flow groups tasks under one key and correlates their results with the
//! code waiting for them.
//!
//! In sync mode `exec` blocks on the engine until the result arrives. In
//! async mode `exec` records which coroutine is waiting for the task key and
//! suspends; the owning [`WaitGroup`](crate::WaitGroup) later delivers the
//! result and resumes it.

use std::cell::{Cell, RefCell};
use std::collections::{HashMap, HashSet, VecDeque};
use std::fmt;
use std::future::Future;
use std::pin::Pin;
use std::rc::Rc;
use std::task::{Context as TaskContext, Poll};

use tandem_engine::Method;
use tracing::{debug, error, info, instrument};
use uuid::Uuid;

use crate::context::Context;
use crate::coroutine::{self, CoroutineId};
use crate::error::FlowError;
use crate::gateway::Gateway;
use crate::registry::Registry;
use crate::result::TaskResult;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FlowMode {
  Sync,
  Async,
}

impl fmt::Display for FlowMode {
  fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
    match self {
      FlowMode::Sync => write!(f, "sync"),
      FlowMode::Async => write!(f, "async"),
    }
  }
}

pub struct Flow {
  key: String,
  mode: FlowMode,
  gateway: Rc<Gateway>,
  registry: Rc<Registry>,
  /// Task key -> coroutine suspended on it.
  outstanding: RefCell<HashMap<String, CoroutineId>>,
  /// Results that arrived for a task key and were not read yet.
  delivered: RefCell<HashMap<String, VecDeque<TaskResult>>>,
  /// Paged tasks with more results to come.
  paging: RefCell<HashSet<String>>,
  /// Tasks whose reader went away; their remaining results are dropped.
  abandoned: RefCell<HashSet<String>>,
  stopped: Cell<bool>,
}

impl Flow {
  pub(crate) fn new(mode: FlowMode, gateway: Rc<Gateway>, registry: Rc<Registry>) -> Self {
    let key = Uuid::new_v4().to_string();
    info!(flow_key = %key, mode = %mode, "flow created");
    Self {
      key,
      mode,
      gateway,
      registry,
      outstanding: RefCell::new(HashMap::new()),
      delivered: RefCell::new(HashMap::new()),
      paging: RefCell::new(HashSet::new()),
      abandoned: RefCell::new(HashSet::new()),
      stopped: Cell::new(false),
    }
  }

  pub fn key(&self) -> &str {
    &self.key
  }

  pub fn mode(&self) -> FlowMode {
    self.mode
  }

  pub fn is_async(&self) -> bool {
    self.mode == FlowMode::Async
  }

  /// Number of task keys with a coroutine suspended on them.
  pub fn outstanding_count(&self) -> usize {
    self.outstanding.borrow().len()
  }

  /// Run one task and return its result.
  ///
  /// Error results become [`FlowError::Task`]. In async mode this must be
  /// awaited inside a WaitGroup coroutine.
  #[instrument(name = "flow_exec", skip_all, fields(flow_key = %self.key, method = %method))]
  pub async fn exec(
    &self,
    ctx: &Context,
    method: Method,
    payload: &str,
  ) -> Result<TaskResult, FlowError> {
    match self.mode {
      FlowMode::Sync => {
        let task = self.gateway.push(&self.key, method, payload)?;
        self.wait_for(ctx, &task.task_key)
      }
      FlowMode::Async => {
        let coroutine = active_coroutine()?;
        let task = self.gateway.push(&self.key, method, payload)?;
        self.park(coroutine, &task.task_key).await
      }
    }
  }

  /// Wait for the next result of a task that was already pushed.
  ///
  /// Used to read the pages of a task that reports `has_next`. A page that
  /// arrived while the caller was busy with another task is returned right
  /// away.
  pub async fn suspend(&self, ctx: &Context, task_key: &str) -> Result<TaskResult, FlowError> {
    match self.mode {
      FlowMode::Sync => self.wait_for(ctx, task_key),
      FlowMode::Async => {
        let coroutine = active_coroutine()?;
        self.park(coroutine, task_key).await
      }
    }
  }

  /// Next result of any task of this flow, error results included.
  pub fn wait(&self, ctx: &Context) -> Result<TaskResult, FlowError> {
    loop {
      let result = self.gateway.wait(&self.key, ctx.remaining_ms())?;
      if !self.discard_abandoned(&result) {
        return Ok(result);
      }
    }
  }

  /// Cancel the flow's engine tasks and forget its coroutines. Idempotent.
  pub fn stop(&self) {
    if self.stopped.replace(true) {
      return;
    }
    self.gateway.stop_flow(&self.key);
    self.registry.remove_flow(&self.key);
    let outstanding = std::mem::take(&mut *self.outstanding.borrow_mut());
    self.delivered.borrow_mut().clear();
    self.paging.borrow_mut().clear();
    self.abandoned.borrow_mut().clear();
    info!(flow_key = %self.key, outstanding = outstanding.len(), "flow stopped");
  }

  pub fn is_stopped(&self) -> bool {
    self.stopped.get()
  }

  /// Hand `result` to whoever reads its task key.
  ///
  /// Returns the coroutine suspended on the key, if any. A page of a paged
  /// task nobody is suspended on yet is held until its reader asks for it.
  pub(crate) fn route(&self, result: TaskResult) -> Result<Option<CoroutineId>, FlowError> {
    let task_key = result.task_key.clone();
    let owner = self.outstanding.borrow_mut().remove(&task_key);
    if owner.is_none() && !self.paging.borrow().contains(&task_key) {
      error!(flow_key = %self.key, task_key = %task_key, "no coroutine for task");
      return Err(FlowError::internal(format!(
        "coroutine not found by task key [{task_key}]"
      )));
    }
    if owner.is_none() {
      debug!(flow_key = %self.key, task_key = %task_key, "page held for its reader");
    }
    self.deliver(result);
    Ok(owner)
  }

  /// Blocking read of the next result for `task_key`, holding pages of
  /// other paged tasks that arrive first.
  fn wait_for(&self, ctx: &Context, task_key: &str) -> Result<TaskResult, FlowError> {
    loop {
      if let Some(result) = self.take_delivered(task_key) {
        return accept(result, task_key);
      }
      let result = self.wait(ctx)?;
      if result.task_key != task_key && self.paging.borrow().contains(&result.task_key) {
        debug!(flow_key = %self.key, task_key = %result.task_key, "page held for its reader");
        self.deliver(result);
        continue;
      }
      self.track_paging(&result);
      return accept(result, task_key);
    }
  }

  async fn park(&self, coroutine: CoroutineId, task_key: &str) -> Result<TaskResult, FlowError> {
    if self.abandoned.borrow().contains(task_key) {
      return Err(FlowError::internal(format!(
        "task [{task_key}] was abandoned"
      )));
    }
    let result = Suspend {
      flow: self,
      coroutine,
      task_key,
      parked: false,
      done: false,
    }
    .await;
    accept(result, task_key)
  }

  fn deliver(&self, result: TaskResult) {
    self.track_paging(&result);
    self
      .delivered
      .borrow_mut()
      .entry(result.task_key.clone())
      .or_default()
      .push_back(result);
  }

  fn track_paging(&self, result: &TaskResult) {
    let mut paging = self.paging.borrow_mut();
    if result.has_next {
      paging.insert(result.task_key.clone());
    } else {
      paging.remove(&result.task_key);
    }
  }

  fn take_delivered(&self, task_key: &str) -> Option<TaskResult> {
    let mut delivered = self.delivered.borrow_mut();
    let queue = delivered.get_mut(task_key)?;
    let result = queue.pop_front();
    if queue.is_empty() {
      delivered.remove(task_key);
    }
    result
  }

  /// Stop delivering results of a task nobody reads anymore.
  pub(crate) fn abandon(&self, task_key: &str) {
    if self.stopped.get() {
      return;
    }
    self.outstanding.borrow_mut().remove(task_key);
    self.paging.borrow_mut().remove(task_key);
    let held = self.delivered.borrow_mut().remove(task_key);
    if held.is_some_and(|held| held.back().is_some_and(|last| !last.has_next)) {
      // The last result is already here; nothing more will arrive.
      return;
    }
    debug!(flow_key = %self.key, task_key = %task_key, "task abandoned");
    self.abandoned.borrow_mut().insert(task_key.to_string());
  }

  fn discard_abandoned(&self, result: &TaskResult) -> bool {
    let mut abandoned = self.abandoned.borrow_mut();
    if !abandoned.contains(&result.task_key) {
      return false;
    }
    if !result.has_next {
      abandoned.remove(&result.task_key);
    }
    debug!(flow_key = %self.key, task_key = %result.task_key, "result of abandoned task dropped");
    true
  }
}

impl Drop for Flow {
  fn drop(&mut self) {
    self.stop();
  }
}

impl fmt::Debug for Flow {
  fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
    f.debug_struct("Flow")
      .field("key", &self.key)
      .field("mode", &self.mode)
      .field("outstanding", &self.outstanding_count())
      .finish()
  }
}

fn active_coroutine() -> Result<CoroutineId, FlowError> {
  coroutine::current().ok_or_else(|| FlowError::internal("can't wait outside of a coroutine"))
}

fn accept(result: TaskResult, task_key: &str) -> Result<TaskResult, FlowError> {
  if result.task_key != task_key {
    error!(expected = %task_key, actual = %result.task_key, "unexpected task key");
    return Err(FlowError::internal(format!(
      "unexpected task key: expected [{task_key}], got [{}]",
      result.task_key
    )));
  }
  result.into_checked()
}

/// Pending until a result for `task_key` has been delivered to the flow.
///
/// Several of these may be live in one coroutine at once (`join!`), each
/// waiting on its own key. Dropping one before it completes abandons its
/// task.
struct Suspend<'a> {
  flow: &'a Flow,
  coroutine: CoroutineId,
  task_key: &'a str,
  parked: bool,
  done: bool,
}

impl Future for Suspend<'_> {
  type Output = TaskResult;

  fn poll(mut self: Pin<&mut Self>, _cx: &mut TaskContext<'_>) -> Poll<Self::Output> {
    if let Some(result) = self.flow.take_delivered(self.task_key) {
      self.done = true;
      return Poll::Ready(result);
    }
    if !self.parked {
      self.parked = true;
      self
        .flow
        .outstanding
        .borrow_mut()
        .insert(self.task_key.to_string(), self.coroutine);
      debug!(
        flow_key = %self.flow.key,
        task_key = %self.task_key,
        coroutine = %self.coroutine,
        "coroutine suspended"
      );
    }
    Poll::Pending
  }
}

impl Drop for Suspend<'_> {
  fn drop(&mut self) {
    if !self.done {
      self.flow.abandon(self.task_key);
    }
  }
}
