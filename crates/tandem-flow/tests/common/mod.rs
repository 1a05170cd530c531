#![allow(dead_code)]

use std::sync::Arc;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::time::{Duration, Instant};

use tandem_engine::{Engine, EngineConfig, EngineError, LocalEngine, Message};
use tandem_flow::{Context, FeatureExecutor, FlowError, Method, Runtime};

/// LocalEngine that counts pushes.
pub struct CountingEngine {
  inner: LocalEngine,
  pushes: AtomicUsize,
}

impl CountingEngine {
  pub fn pushes(&self) -> usize {
    self.pushes.load(Ordering::SeqCst)
  }
}

impl Engine for CountingEngine {
  fn push(&self, message: Message) -> Result<(), EngineError> {
    self.pushes.fetch_add(1, Ordering::SeqCst);
    self.inner.push(message)
  }

  fn wait(&self, flow_key: &str, timeout_ms: i64) -> String {
    self.inner.wait(flow_key, timeout_ms)
  }

  fn count(&self) -> usize {
    self.inner.count()
  }

  fn stop_flow(&self, flow_key: &str) {
    self.inner.stop_flow(flow_key)
  }

  fn destroy(&self) {
    self.inner.destroy()
  }
}

pub fn runtime() -> (Runtime, Arc<CountingEngine>) {
  let engine = Arc::new(CountingEngine {
    inner: LocalEngine::new(EngineConfig::default()).expect("engine should start"),
    pushes: AtomicUsize::new(0),
  });
  let runtime = Runtime::new(engine.clone()).expect("engine should be available");
  (runtime, engine)
}

/// Sleep on whatever flow is current.
pub async fn sleep(runtime: &Runtime, ctx: &Context, ms: i64) -> Result<(), FlowError> {
  let payload = serde_json::json!({ "ms": ms });
  FeatureExecutor::exec_json(runtime, ctx, Method::SLEEP, &payload).await?;
  Ok(())
}

/// Wait until the engine has no pending tasks.
pub fn assert_idle(engine: &CountingEngine) {
  let deadline = Instant::now() + Duration::from_secs(2);
  while engine.count() > 0 && Instant::now() < deadline {
    std::thread::sleep(Duration::from_millis(5));
  }
  assert_eq!(engine.count(), 0, "engine still has pending tasks");
}
