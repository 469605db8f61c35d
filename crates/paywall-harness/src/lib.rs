//! Deterministic simulation harness for the paywall checkout.
//!
//! Scriptable implementations of every collaborator the orchestrator talks
//! to, a reference model for emitter buffering, and an oracle-checked
//! scenario builder. Scenarios run on a paused tokio clock, so timeouts and
//! delayed lookups resolve instantly and in a reproducible order.

#![forbid(unsafe_code)]
#![warn(missing_docs)]

pub mod model;
pub mod scenario;
pub mod sim_capability;
pub mod sim_chain;
pub mod sim_driver;
pub mod sim_env;
pub mod sim_transport;

use std::sync::{Mutex, MutexGuard, PoisonError};

pub use model::{EmitterModel, Operation};
pub use sim_capability::{SimCallbackProvider, SimCapability};
pub use sim_chain::SimChain;
pub use sim_driver::{DriverLog, SimDriver};
pub use sim_env::SimEnv;
pub use sim_transport::{Posted, SimTransport};

/// Origin the simulated checkout application is served from.
pub const CHECKOUT_ORIGIN: &str = "https://app.unlock-protocol.com";

/// Network id scenarios register by default.
pub const DEFAULT_NETWORK: u64 = 4;

/// Lock a shared sim state. A panicking test thread must not hide the state
/// from the oracle, so poisoning is ignored.
pub(crate) fn lock<T>(mutex: &Mutex<T>) -> MutexGuard<'_, T> {
    mutex.lock().unwrap_or_else(PoisonError::into_inner)
}
