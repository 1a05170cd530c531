//! Owner of the gateway, the registry and the default flow.

use std::cell::OnceCell;
use std::future::Future;
use std::pin::pin;
use std::rc::Rc;
use std::sync::Arc;
use std::task::Poll;

use tandem_engine::Engine;

use crate::coroutine::{self, CoroutineId};
use crate::error::FlowError;
use crate::flow::{Flow, FlowMode};
use crate::gateway::Gateway;
use crate::registry::Registry;

/// Entry point of the coordination core.
///
/// Built once per thread of control and passed to whatever needs it. Clones
/// share the same gateway, registry and default flow.
#[derive(Clone)]
pub struct Runtime {
  inner: Rc<Inner>,
}

struct Inner {
  gateway: Rc<Gateway>,
  registry: Rc<Registry>,
  default_flow: OnceCell<Rc<Flow>>,
}

impl Runtime {
  pub fn new(engine: Arc<dyn Engine>) -> Result<Self, FlowError> {
    let gateway = Gateway::new(engine)?;
    Ok(Self {
      inner: Rc::new(Inner {
        gateway: Rc::new(gateway),
        registry: Rc::new(Registry::new()),
        default_flow: OnceCell::new(),
      }),
    })
  }

  pub fn gateway(&self) -> &Gateway {
    &self.inner.gateway
  }

  pub fn registry(&self) -> &Registry {
    &self.inner.registry
  }

  /// The flow owning the code that is running right now.
  ///
  /// Inside a WaitGroup callback this is the WaitGroup's flow; anywhere else
  /// it is the default synchronous flow.
  pub fn current_flow(&self) -> Rc<Flow> {
    coroutine::current()
      .and_then(|coroutine| self.inner.registry.resolve(coroutine))
      .unwrap_or_else(|| self.default_flow())
  }

  /// A new flow in async mode.
  pub fn async_flow(&self) -> Rc<Flow> {
    Rc::new(self.new_flow(FlowMode::Async))
  }

  pub fn register(&self, coroutine: CoroutineId, flow: &Rc<Flow>) {
    self.inner.registry.register(coroutine, flow);
  }

  pub fn unregister(&self, coroutine: CoroutineId) {
    self.inner.registry.unregister(coroutine);
  }

  /// Drive `future` to completion from plain, non-coroutine code.
  ///
  /// Capability calls made outside a WaitGroup run on the default
  /// synchronous flow and never suspend. A future that does suspend is an
  /// error: it belongs inside a WaitGroup callback.
  pub fn block_on<T, F>(&self, future: F) -> Result<T, FlowError>
  where
    F: Future<Output = Result<T, FlowError>>,
  {
    let future = pin!(future);
    match coroutine::poll_detached(future) {
      Poll::Ready(output) => output,
      Poll::Pending => Err(FlowError::internal(
        "future suspended outside of a coroutine; await it inside a WaitGroup callback",
      )),
    }
  }

  fn default_flow(&self) -> Rc<Flow> {
    Rc::clone(
      self
        .inner
        .default_flow
        .get_or_init(|| Rc::new(self.new_flow(FlowMode::Sync))),
    )
  }

  fn new_flow(&self, mode: FlowMode) -> Flow {
    Flow::new(
      mode,
      Rc::clone(&self.inner.gateway),
      Rc::clone(&self.inner.registry),
    )
  }
}
