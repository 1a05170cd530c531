//! Built-in task handlers.

mod sleep;
mod ticks;

pub use sleep::SleepHandler;
pub use ticks::TicksHandler;
