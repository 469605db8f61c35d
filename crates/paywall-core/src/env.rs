//! Environment abstraction.
//!
//! Protocol code never reads the clock directly. Production uses
//! [`SystemEnv`]; the simulation harness supplies an environment driven by
//! tokio's paused clock.

use std::{
    future::Future,
    time::{Duration, Instant, SystemTime, UNIX_EPOCH},
};

/// Source of time for protocol logic.
pub trait Environment: Clone + Send + Sync + 'static {
    /// Monotonic now.
    fn now(&self) -> Instant;

    /// Wall clock in seconds since the unix epoch. Key expirations are
    /// compared against this.
    fn unix_time(&self) -> u64;

    /// Sleep for `duration`.
    fn sleep(&self, duration: Duration) -> impl Future<Output = ()> + Send;
}

/// Environment backed by the system clock and tokio timers.
#[derive(Debug, Clone, Copy, Default)]
pub struct SystemEnv;

impl Environment for SystemEnv {
    fn now(&self) -> Instant {
        Instant::now()
    }

    fn unix_time(&self) -> u64 {
        SystemTime::now().duration_since(UNIX_EPOCH).map_or(0, |elapsed| elapsed.as_secs())
    }

    fn sleep(&self, duration: Duration) -> impl Future<Output = ()> + Send {
        tokio::time::sleep(duration)
    }
}
