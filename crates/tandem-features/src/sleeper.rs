use serde::{Deserialize, Serialize};
use tandem_flow::{Context, FeatureExecutor, FlowError, Method, Runtime, TaskStream};
use tracing::debug;

#[derive(Debug, Serialize)]
struct SleepRequest {
  ms: i64,
}

#[derive(Debug, Serialize)]
struct TicksRequest {
  count: u32,
  ms: i64,
}

#[derive(Debug, Deserialize)]
struct Tick {
  tick: u32,
}

/// Sleeps executed by the engine.
///
/// From plain code, drive calls with [`Runtime::block_on`]; inside a
/// WaitGroup callback, await them and the group runs siblings meanwhile.
#[derive(Clone)]
pub struct Sleeper {
  runtime: Runtime,
}

impl Sleeper {
  pub fn new(runtime: Runtime) -> Self {
    Self { runtime }
  }

  pub async fn sleep(&self, ctx: &Context, seconds: i64) -> Result<(), FlowError> {
    self.usleep(ctx, seconds.saturating_mul(1_000)).await
  }

  /// Sleep for `milliseconds`; the engine rejects values below 1.
  pub async fn usleep(&self, ctx: &Context, milliseconds: i64) -> Result<(), FlowError> {
    let request = SleepRequest { ms: milliseconds };
    let result = FeatureExecutor::exec_json(&self.runtime, ctx, Method::SLEEP, &request).await?;
    debug!(task_key = %result.task_key, ms = milliseconds, "slept");
    Ok(())
  }

  /// `count` ticks, `interval_ms` apart, numbered from 1.
  pub fn ticks(&self, ctx: &Context, count: u32, interval_ms: i64) -> Result<Ticks, FlowError> {
    let request = TicksRequest {
      count,
      ms: interval_ms,
    };
    let stream = FeatureExecutor::stream(&self.runtime, ctx, Method::TICKS, &request)?;
    Ok(Ticks { stream })
  }
}

/// Tick numbers as the engine emits them.
pub struct Ticks {
  stream: TaskStream,
}

impl Ticks {
  pub async fn next(&mut self) -> Option<Result<u32, FlowError>> {
    let result = match self.stream.next().await? {
      Ok(result) => result,
      Err(e) => return Some(Err(e)),
    };
    Some(
      serde_json::from_str::<Tick>(&result.payload)
        .map(|tick| tick.tick)
        .map_err(|e| FlowError::ResponseFormat {
          message: format!("invalid tick payload: {e}"),
        }),
    )
  }

  pub async fn collect(mut self) -> Result<Vec<u32>, FlowError> {
    let mut ticks = Vec::new();
    while let Some(tick) = self.next().await {
      ticks.push(tick?);
    }
    Ok(ticks)
  }
}
