//! Tandem Engine
//!
//! This crate defines the boundary between tandem's coordination core and the
//! execution engine that actually runs tasks, plus `LocalEngine`, an in-process
//! implementation of that boundary on a tokio runtime.
//!
//! # Architecture
//!
//! ```text
//! ┌─────────────────────────────────────────────────────────────┐
//! │                     Engine (trait)                          │
//! │  - push(message)          fire-and-forget enqueue           │
//! │  - wait(flow_key, ms)     next result envelope of a flow    │
//! │  - stop_flow / destroy    coarse-grained cancellation       │
//! └─────────────────────────────────────────────────────────────┘
//!                               │
//!                               ▼
//! ┌─────────────────────────────────────────────────────────────┐
//! │                      LocalEngine                            │
//! │  - per-flow result channel + cancellation token             │
//! │  - spawns one tokio task per pushed message                 │
//! └─────────────────────────────────────────────────────────────┘
//!                               │
//!                               ▼
//! ┌─────────────────────────────────────────────────────────────┐
//! │                 TaskHandler (by Method)                     │
//! │  - SleepHandler, TicksHandler                               │
//! └─────────────────────────────────────────────────────────────┘
//! ```
//!
//! Results travel back as JSON envelopes (see [`Response`]) or as an
//! `error: ...` sentinel string when the wait itself failed.

mod config;
mod engine;
mod error;
mod handler;
pub mod handlers;
mod local;
mod message;
mod task;

pub use config::EngineConfig;
pub use engine::{Engine, ERROR_PREFIX, error_envelope};
pub use error::EngineError;
pub use handler::{Handlers, TaskHandler};
pub use local::LocalEngine;
pub use message::{Message, Method, Response};
pub use task::Task;
