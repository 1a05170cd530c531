//! Tandem Flow
//!
//! Cooperative task coordination on top of an execution [`Engine`]. Code that
//! issues engine requests reads like ordinary blocking code; the same code run
//! inside a [`WaitGroup`] callback is multiplexed with its siblings over one
//! flow, and the group yields results in completion order.
//!
//! # Architecture
//!
//! ```text
//! ┌─────────────────────────────────────────────────────────────┐
//! │                        WaitGroup                            │
//! │  - add(callback) starts a coroutine                         │
//! │  - iterate() waits on the flow, resumes the owner           │
//! └─────────────────────────────────────────────────────────────┘
//!                               │
//!                               ▼
//! ┌─────────────────────────────────────────────────────────────┐
//! │                 Runtime / Registry / Flow                   │
//! │  - current_flow(): coroutine's flow or the default sync one │
//! │  - exec(): push, then block (sync) or park (async)          │
//! └─────────────────────────────────────────────────────────────┘
//!                               │
//!                               ▼
//! ┌─────────────────────────────────────────────────────────────┐
//! │                         Gateway                             │
//! │  - task keys, envelope decoding                             │
//! └─────────────────────────────────────────────────────────────┘
//!                               │
//!                               ▼
//!                        dyn Engine (tandem-engine)
//! ```
//!
//! Everything here is single-threaded: a [`Runtime`] and the flows it creates
//! are `!Send`.
//!
//! [`Engine`]: tandem_engine::Engine

mod context;
pub mod coroutine;
mod error;
mod feature;
mod flow;
mod gateway;
mod registry;
mod result;
mod runtime;
mod wait_group;

#[cfg(test)]
mod testing;

pub use context::Context;
pub use coroutine::CoroutineId;
pub use error::FlowError;
pub use feature::{FeatureExecutor, TaskStream};
pub use flow::{Flow, FlowMode};
pub use gateway::Gateway;
pub use registry::Registry;
pub use result::{RunningTask, TaskResult};
pub use runtime::Runtime;
pub use wait_group::{Completions, Token, WaitGroup};

pub use tandem_engine::Method;
