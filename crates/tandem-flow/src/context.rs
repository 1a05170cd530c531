//! Deadline carried through a call chain.

use std::time::{Duration, Instant};

use crate::error::FlowError;

/// A time budget fixed at construction.
///
/// Cheap to copy; every WaitGroup callback receives its own copy.
#[derive(Debug, Clone, Copy)]
pub struct Context {
  timeout: Duration,
  start: Instant,
}

impl Context {
  /// Start a budget of `timeout_seconds`, which must be at least 1.
  pub fn new(timeout_seconds: i64) -> Result<Self, FlowError> {
    let seconds = u64::try_from(timeout_seconds)
      .ok()
      .filter(|seconds| *seconds >= 1)
      .ok_or_else(|| FlowError::InvalidValue {
        message: format!("timeout must be at least 1 second, got {timeout_seconds}"),
      })?;

    Ok(Self {
      timeout: Duration::from_secs(seconds),
      start: Instant::now(),
    })
  }

  pub fn timeout(&self) -> Duration {
    self.timeout
  }

  pub fn elapsed(&self) -> Duration {
    self.start.elapsed()
  }

  /// Fails with [`FlowError::Timeout`] once the budget is exceeded.
  pub fn check(&self) -> Result<(), FlowError> {
    if self.elapsed() > self.timeout {
      return Err(FlowError::Timeout);
    }
    Ok(())
  }

  /// Remaining budget in milliseconds; negative once exceeded.
  pub fn remaining_ms(&self) -> i64 {
    let timeout = i64::try_from(self.timeout.as_millis()).unwrap_or(i64::MAX);
    let elapsed = i64::try_from(self.elapsed().as_millis()).unwrap_or(i64::MAX);
    timeout.saturating_sub(elapsed)
  }
}
