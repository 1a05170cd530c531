//! Fan-out/fan-in over one async flow.
//!
//! Every callback added to a [`WaitGroup`] becomes a coroutine. Coroutines
//! run until they await a task on the group's flow, then park. Iterating the
//! group pulls results off the flow, resumes whichever coroutine owns each
//! task key, and yields callbacks' return values in the order they finish.
//!
//! ```ignore
//! let group: WaitGroup<u32> = WaitGroup::new(&runtime, ctx);
//! group.add(|ctx| async move {
//!   sleeper.usleep(&ctx, 10).await?;
//!   Ok(1)
//! })?;
//! for completion in group.iterate() {
//!   let (token, value) = completion?;
//! }
//! ```

use std::cell::RefCell;
use std::collections::{HashMap, VecDeque};
use std::fmt;
use std::future::Future;
use std::pin::Pin;
use std::rc::Rc;
use std::task::Poll;

use tracing::{debug, error, info, instrument};
use uuid::Uuid;

use crate::context::Context;
use crate::coroutine::{self, CoroutineId};
use crate::error::FlowError;
use crate::flow::Flow;
use crate::runtime::Runtime;

type Coroutine<T, E> = Pin<Box<dyn Future<Output = Result<T, E>>>>;

/// Caller-visible handle of one `add()`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct Token(Uuid);

impl Token {
  fn new() -> Self {
    Self(Uuid::new_v4())
  }

  pub fn as_uuid(&self) -> &Uuid {
    &self.0
  }
}

impl fmt::Display for Token {
  fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
    fmt::Display::fmt(&self.0, f)
  }
}

enum Slot<T, E> {
  Suspended(Coroutine<T, E>),
  /// Taken out while being polled.
  Running,
}

struct State<T, E> {
  coroutines: HashMap<CoroutineId, Slot<T, E>>,
  tokens: HashMap<CoroutineId, Token>,
  /// Callbacks that finished without suspending, in `add()` order.
  finished: VecDeque<(Token, T)>,
}

/// Runs callbacks cooperatively and yields their results as they complete.
///
/// `E` is the callbacks' error type; engine and bookkeeping failures reach
/// the caller through `E: From<FlowError>`.
///
/// Dropping the group stops its flow, which cancels any engine task still
/// running for callbacks that were never resumed.
pub struct WaitGroup<T, E = FlowError> {
  runtime: Runtime,
  flow: Rc<Flow>,
  context: Context,
  state: RefCell<State<T, E>>,
}

impl<T, E> WaitGroup<T, E>
where
  T: 'static,
  E: From<FlowError> + 'static,
{
  /// A group with its own async flow. `ctx` is handed to every callback and
  /// bounds each wait on the engine.
  pub fn new(runtime: &Runtime, ctx: Context) -> Self {
    Self {
      runtime: runtime.clone(),
      flow: runtime.async_flow(),
      context: ctx,
      state: RefCell::new(State {
        coroutines: HashMap::new(),
        tokens: HashMap::new(),
        finished: VecDeque::new(),
      }),
    }
  }

  pub fn flow(&self) -> &Rc<Flow> {
    &self.flow
  }

  pub fn context(&self) -> Context {
    self.context
  }

  /// Start `callback` and run it up to its first suspension.
  ///
  /// A callback that finishes right away has its value queued and yielded
  /// first by [`iterate`](Self::iterate); one that fails right away has its
  /// error returned here.
  #[instrument(name = "wait_group_add", skip_all, fields(flow_key = %self.flow.key()))]
  pub fn add<F, Fut>(&self, callback: F) -> Result<Token, E>
  where
    F: FnOnce(Context) -> Fut,
    Fut: Future<Output = Result<T, E>> + 'static,
  {
    let token = Token::new();
    let id = CoroutineId::next();
    self.runtime.register(id, &self.flow);

    let mut future: Coroutine<T, E> = {
      let _enter = coroutine::enter(id);
      Box::pin(callback(self.context))
    };

    match coroutine::resume(id, future.as_mut()) {
      Poll::Pending => {
        debug!(token = %token, coroutine = %id, "callback suspended");
        let mut state = self.state.borrow_mut();
        state.coroutines.insert(id, Slot::Suspended(future));
        state.tokens.insert(id, token);
        Ok(token)
      }
      Poll::Ready(outcome) => {
        drop(future);
        self.runtime.unregister(id);
        let value = outcome?;
        debug!(token = %token, coroutine = %id, "callback finished without suspending");
        self.state.borrow_mut().finished.push_back((token, value));
        Ok(token)
      }
    }
  }

  /// Completions in the order they happen.
  ///
  /// Stops after the first error. Stopping early leaves the remaining
  /// callbacks parked; iterating again picks them up.
  pub fn iterate(&self) -> Completions<'_, T, E> {
    Completions {
      group: self,
      done: false,
    }
  }

  /// Drain every callback, returning how many completed.
  pub fn wait_all(&self) -> Result<usize, E> {
    let mut completed = 0;
    for completion in self.iterate() {
      completion?;
      completed += 1;
    }
    Ok(completed)
  }

  /// Drain every callback, returning `(token, value)` pairs in completion
  /// order.
  pub fn wait_results(&self) -> Result<Vec<(Token, T)>, E> {
    self.iterate().collect()
  }

  /// Callbacks that have not been yielded yet.
  pub fn pending(&self) -> usize {
    let state = self.state.borrow();
    state.coroutines.len() + state.finished.len()
  }

  pub fn is_empty(&self) -> bool {
    self.pending() == 0
  }

  fn next_completion(&self) -> Result<Option<(Token, T)>, E> {
    loop {
      {
        let mut state = self.state.borrow_mut();
        if let Some(completion) = state.finished.pop_front() {
          return Ok(Some(completion));
        }
        if state.coroutines.is_empty() {
          return Ok(None);
        }
      }

      let result = self.flow.wait(&self.context)?;
      let task_key = result.task_key.clone();
      let Some(id) = self.flow.route(result)? else {
        // A page nobody is suspended on yet; its reader picks it up later.
        continue;
      };

      let mut future = self.take_suspended(id, &task_key)?;

      match coroutine::resume(id, future.as_mut()) {
        Poll::Pending => {
          self
            .state
            .borrow_mut()
            .coroutines
            .insert(id, Slot::Suspended(future));
        }
        Poll::Ready(outcome) => {
          drop(future);
          let token = {
            let mut state = self.state.borrow_mut();
            state.coroutines.remove(&id);
            state.tokens.remove(&id)
          };
          self.runtime.unregister(id);

          let token = token
            .ok_or_else(|| FlowError::internal(format!("no token recorded for coroutine {id}")))?;
          let value = outcome?;
          debug!(token = %token, coroutine = %id, "callback finished");
          return Ok(Some((token, value)));
        }
      }
    }
  }

  fn take_suspended(&self, id: CoroutineId, task_key: &str) -> Result<Coroutine<T, E>, FlowError> {
    let mut state = self.state.borrow_mut();
    let slot = state.coroutines.get_mut(&id).ok_or_else(|| {
      FlowError::internal(format!(
        "coroutine {id} not found by task key [{task_key}]"
      ))
    })?;

    match std::mem::replace(slot, Slot::Running) {
      Slot::Suspended(coroutine) => Ok(coroutine),
      Slot::Running => {
        error!(coroutine = %id, task_key = %task_key, "coroutine is not suspended");
        Err(FlowError::internal(format!(
          "coroutine with task key [{task_key}] is not suspended"
        )))
      }
    }
  }
}

impl<T, E> Drop for WaitGroup<T, E> {
  fn drop(&mut self) {
    let state = self.state.get_mut();
    let pending = state.coroutines.len();
    for id in state.coroutines.keys() {
      self.runtime.unregister(*id);
    }
    // Parked callbacks are dropped here, including any nested groups they own.
    state.coroutines.clear();
    state.tokens.clear();
    state.finished.clear();
    self.flow.stop();
    info!(flow_key = %self.flow.key(), pending, "wait group closed");
  }
}

/// Iterator returned by [`WaitGroup::iterate`].
pub struct Completions<'a, T, E> {
  group: &'a WaitGroup<T, E>,
  done: bool,
}

impl<T, E> Iterator for Completions<'_, T, E>
where
  T: 'static,
  E: From<FlowError> + 'static,
{
  type Item = Result<(Token, T), E>;

  fn next(&mut self) -> Option<Self::Item> {
    if self.done {
      return None;
    }
    match self.group.next_completion() {
      Ok(Some(completion)) => Some(Ok(completion)),
      Ok(None) => {
        self.done = true;
        None
      }
      Err(e) => {
        self.done = true;
        Some(Err(e))
      }
    }
  }
}

impl<T, E> std::iter::FusedIterator for Completions<'_, T, E>
where
  T: 'static,
  E: From<FlowError> + 'static,
{
}
