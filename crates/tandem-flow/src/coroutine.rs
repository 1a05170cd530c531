//! Coroutine identity and the "currently polled coroutine" cell.
//!
//! A coroutine is a boxed future polled by a [`WaitGroup`](crate::WaitGroup).
//! While it is being polled its id is installed in a thread-local cell so
//! that code deep inside the callback can find the flow it belongs to.

use std::cell::Cell;
use std::fmt;
use std::future::Future;
use std::pin::Pin;
use std::sync::atomic::{AtomicU64, Ordering};
use std::task::{Context as TaskContext, Poll};

use futures::task::noop_waker_ref;

static NEXT_ID: AtomicU64 = AtomicU64::new(1);

thread_local! {
  static CURRENT: Cell<Option<CoroutineId>> = const { Cell::new(None) };
}

/// Process-unique, monotonically assigned coroutine id.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct CoroutineId(u64);

impl CoroutineId {
  pub(crate) fn next() -> Self {
    Self(NEXT_ID.fetch_add(1, Ordering::Relaxed))
  }
}

impl fmt::Display for CoroutineId {
  fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
    write!(f, "#{}", self.0)
  }
}

/// The coroutine being polled on this thread, if any.
pub fn current() -> Option<CoroutineId> {
  CURRENT.with(Cell::get)
}

/// Restores the previously polled coroutine on drop.
pub(crate) struct Enter {
  previous: Option<CoroutineId>,
}

pub(crate) fn enter(id: CoroutineId) -> Enter {
  Enter {
    previous: CURRENT.with(|current| current.replace(Some(id))),
  }
}

impl Drop for Enter {
  fn drop(&mut self) {
    CURRENT.with(|current| current.set(self.previous));
  }
}

/// Poll `future` once as coroutine `id`.
///
/// Coroutines only suspend on flow results, which the WaitGroup delivers
/// itself, so the waker is never used.
pub(crate) fn resume<F>(id: CoroutineId, future: Pin<&mut F>) -> Poll<F::Output>
where
  F: Future + ?Sized,
{
  let _enter = enter(id);
  poll_detached(future)
}

/// Poll `future` once without installing a coroutine.
pub(crate) fn poll_detached<F>(future: Pin<&mut F>) -> Poll<F::Output>
where
  F: Future + ?Sized,
{
  let mut cx = TaskContext::from_waker(noop_waker_ref());
  future.poll(&mut cx)
}
