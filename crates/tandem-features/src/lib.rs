//! Tandem Features
//!
//! Capability modules built on [`FeatureExecutor`](tandem_flow::FeatureExecutor).
//! Each one encodes its request, picks a method tag and decodes the result;
//! whether the call blocks or suspends is decided by the flow it runs on.

mod sleeper;

pub use sleeper::{Sleeper, Ticks};
