//! Coroutine to flow associations used for ambient flow resolution.

use std::cell::RefCell;
use std::collections::HashMap;
use std::rc::{Rc, Weak};

use tracing::debug;

use crate::coroutine::CoroutineId;
use crate::flow::Flow;

struct Entry {
  flow_key: String,
  flow: Weak<Flow>,
}

/// Which flow each live coroutine belongs to.
///
/// Entries do not keep flows alive. An entry whose flow has been dropped
/// resolves to nothing.
#[derive(Default)]
pub struct Registry {
  entries: RefCell<HashMap<CoroutineId, Entry>>,
}

impl Registry {
  pub fn new() -> Self {
    Self::default()
  }

  pub fn register(&self, coroutine: CoroutineId, flow: &Rc<Flow>) {
    self.entries.borrow_mut().insert(
      coroutine,
      Entry {
        flow_key: flow.key().to_string(),
        flow: Rc::downgrade(flow),
      },
    );
  }

  pub fn unregister(&self, coroutine: CoroutineId) {
    self.entries.borrow_mut().remove(&coroutine);
  }

  /// The flow `coroutine` was registered with, if it is still alive.
  pub fn resolve(&self, coroutine: CoroutineId) -> Option<Rc<Flow>> {
    let mut entries = self.entries.borrow_mut();
    let flow = entries.get(&coroutine)?.flow.upgrade();
    if flow.is_none() {
      entries.remove(&coroutine);
    }
    flow
  }

  /// Drop every entry pointing at the flow with `flow_key`.
  pub fn remove_flow(&self, flow_key: &str) -> usize {
    let mut entries = self.entries.borrow_mut();
    let before = entries.len();
    entries.retain(|_, entry| entry.flow_key != flow_key);
    let removed = before - entries.len();
    if removed > 0 {
      debug!(flow_key = %flow_key, removed, "coroutines deregistered");
    }
    removed
  }

  pub fn len(&self) -> usize {
    self.entries.borrow().len()
  }

  pub fn is_empty(&self) -> bool {
    self.len() == 0
  }
}
