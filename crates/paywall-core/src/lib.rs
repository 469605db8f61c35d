//! Paywall checkout protocol core
//!
//! The pieces that let a host page and an embedded checkout surface talk to
//! each other, plus the key status logic the host uses to decide whether the
//! page is unlocked.
//!
//! # Architecture
//!
//! Everything here runs on a single cooperative event loop. Components never
//! spawn threads and never block: message handling is synchronous, and the
//! operations that wait on an external collaborator (a forwarded capability
//! call, a per-lock key lookup) are returned as `'static` futures for the
//! caller to drive alongside everything else it has in flight.
//!
//! Time is supplied through [`env::Environment`] so tests run on a paused,
//! deterministic clock.
//!
//! # Components
//!
//! - [`channel`]: Origin-checked, typed transport between two contexts
//! - [`emitter`]: Ready gate, FIFO send buffer and handler table
//! - [`connection`]: The single connection to the embedded surface
//! - [`keys`]: Key status derivation and precedence
//! - [`aggregator`]: Concurrent, failure-isolated key lookups across locks
//! - [`provider`]: Forwarding of method calls and events to the host capability
//! - [`mod@env`]: Environment abstraction (time)
//! - [`transport`]: Transport abstraction (cross-context posting)
//! - [`error`]: Error types

pub mod aggregator;
pub mod channel;
pub mod connection;
pub mod emitter;
pub mod env;
pub mod error;
pub mod keys;
pub mod provider;
pub mod transport;
