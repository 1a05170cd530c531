use std::path::PathBuf;
use std::sync::Arc;
use std::time::Instant;

use anyhow::{Context as _, Result};
use clap::{Parser, Subcommand};
use tracing::info;
use tracing_subscriber::EnvFilter;

use tandem_config::TandemConfig;
use tandem_engine::{EngineConfig, LocalEngine};
use tandem_features::Sleeper;
use tandem_flow::{Context, Runtime, WaitGroup};

/// Tandem - cooperative task coordination over an execution engine
#[derive(Parser)]
#[command(name = "tandem")]
#[command(version, about, long_about = None)]
struct Cli {
  /// Path to a JSON config file
  #[arg(long, global = true)]
  config: Option<PathBuf>,

  #[command(subcommand)]
  command: Option<Commands>,
}

#[derive(Subcommand)]
enum Commands {
  /// Run one sleep per `--ms` concurrently and print them in completion order
  Sleep {
    /// Milliseconds to sleep; repeat for more callbacks
    #[arg(long = "ms", required = true)]
    ms: Vec<i64>,

    /// Context budget in seconds (default: from config)
    #[arg(long)]
    timeout: Option<i64>,
  },

  /// Read a tick stream from plain, blocking code
  Ticks {
    #[arg(long, default_value_t = 3)]
    count: u32,

    /// Milliseconds between ticks
    #[arg(long, default_value_t = 10)]
    ms: i64,
  },
}

fn main() -> Result<()> {
  let cli = Cli::parse();

  let config = match &cli.config {
    Some(path) => TandemConfig::load(path)
      .with_context(|| format!("failed to load config: {}", path.display()))?,
    None => TandemConfig::default(),
  };

  tracing_subscriber::fmt()
    .with_env_filter(
      EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(&config.log_filter)),
    )
    .with_writer(std::io::stderr)
    .init();

  match cli.command {
    Some(Commands::Sleep { ms, timeout }) => {
      let runtime = build_runtime(&config)?;
      run_sleep(&runtime, ms, timeout.unwrap_or(config.timeout_seconds))?;
    }
    Some(Commands::Ticks { count, ms }) => {
      let runtime = build_runtime(&config)?;
      run_ticks(&runtime, count, ms, config.timeout_seconds)?;
    }
    None => {
      println!("tandem - use --help to see available commands");
    }
  }

  Ok(())
}

fn build_runtime(config: &TandemConfig) -> Result<Runtime> {
  let engine = LocalEngine::new(EngineConfig {
    worker_threads: config.engine.worker_threads,
    ..EngineConfig::default()
  })
  .context("failed to start engine")?;

  Runtime::new(Arc::new(engine)).context("failed to create runtime")
}

fn run_sleep(runtime: &Runtime, durations: Vec<i64>, timeout: i64) -> Result<()> {
  let ctx = Context::new(timeout).context("invalid timeout")?;
  let sleeper = Sleeper::new(runtime.clone());
  let group: WaitGroup<i64> = WaitGroup::new(runtime, ctx);
  let started = Instant::now();

  for ms in durations {
    let sleeper = sleeper.clone();
    group.add(move |ctx| async move {
      sleeper.usleep(&ctx, ms).await?;
      Ok(ms)
    })?;
  }

  let mut output = Vec::new();
  for completion in group.iterate() {
    let (token, ms) = completion.context("sleep callback failed")?;
    output.push(serde_json::json!({
      "token": token.to_string(),
      "ms": ms,
      "elapsed_ms": started.elapsed().as_millis(),
    }));
  }

  info!(callbacks = output.len(), "all sleeps finished");
  println!("{}", serde_json::to_string_pretty(&output)?);

  Ok(())
}

fn run_ticks(runtime: &Runtime, count: u32, ms: i64, timeout: i64) -> Result<()> {
  let ctx = Context::new(timeout).context("invalid timeout")?;
  let sleeper = Sleeper::new(runtime.clone());

  let ticks = sleeper.ticks(&ctx, count, ms)?;
  let ticks = runtime.block_on(ticks.collect()).context("tick stream failed")?;

  println!("{}", serde_json::to_string(&ticks)?);

  Ok(())
}
