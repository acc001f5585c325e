//! The simulator server.
//!
//! ## Module Structure
//!
//! - `types`: error types surfaced to callers
//! - `core`: the `Simulator` and its shared state
//! - `admission`: accept loop bounded by a permit pool
//! - `handler`: per-request dispatch

mod admission;
mod core;
mod handler;
mod types;

#[cfg(test)]
mod tests;

pub use self::core::Simulator;
pub use types::{AggregateDispatchError, DispatchError, SimulatorError, UnexpectedRequests};
