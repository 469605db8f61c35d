//! Host-side paywall orchestration
//!
//! Ties the surface connection, the capability bridge and key status
//! aggregation together behind the operations a host page calls, and turns
//! their outcomes into page events. Platform I/O lives behind [`Driver`], so
//! the same orchestrator runs in a browser binding and in deterministic
//! simulation.
//!
//! # Components
//!
//! - [`Paywall`]: The orchestrator and its event loop
//! - [`StatusTracker`]: Lock status state machine with stale-check guard
//! - [`UnlockPolicy`]: Optimistic or pessimistic handling of purchases
//! - [`PageEvent`]: Events published to the host application
//! - [`Driver`]: Trait for platform-specific page operations
//! - [`storage`]: Page-local user cache

mod driver;
mod error;
mod event;
mod paywall;
mod policy;
mod settings;
mod state;
pub mod storage;

pub use driver::Driver;
pub use error::PaywallError;
pub use event::PageEvent;
pub use paywall::{Collaborators, Paywall};
pub use policy::UnlockPolicy;
pub use settings::PaywallSettings;
pub use state::{LockStatus, StatusTracker, Transition};
pub use storage::{MemoryStorage, Storage, StorageError};
