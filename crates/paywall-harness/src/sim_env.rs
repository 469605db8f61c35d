//! Simulated environment.
//!
//! Monotonic time follows tokio's clock, so under a paused runtime it only
//! moves when the runtime auto-advances or a test calls
//! `tokio::time::advance`. Wall-clock time is a settable counter used for key
//! expirations.

use std::{
    future::Future,
    sync::{
        Arc,
        atomic::{AtomicU64, Ordering},
    },
    time::{Duration, Instant},
};

use paywall_core::env::Environment;

/// Wall-clock start for new environments, unix seconds.
pub const DEFAULT_UNIX_TIME: u64 = 1_700_000_000;

/// Environment for simulation. Clones share the wall clock.
#[derive(Debug, Clone)]
pub struct SimEnv {
    unix_time: Arc<AtomicU64>,
}

impl SimEnv {
    /// Environment whose wall clock reads `unix_time`.
    pub fn at(unix_time: u64) -> Self {
        Self { unix_time: Arc::new(AtomicU64::new(unix_time)) }
    }

    /// Move the wall clock to `unix_time`.
    pub fn set_unix_time(&self, unix_time: u64) {
        self.unix_time.store(unix_time, Ordering::SeqCst);
    }
}

impl Default for SimEnv {
    fn default() -> Self {
        Self::at(DEFAULT_UNIX_TIME)
    }
}

impl Environment for SimEnv {
    fn now(&self) -> Instant {
        tokio::time::Instant::now().into_std()
    }

    fn unix_time(&self) -> u64 {
        self.unix_time.load(Ordering::SeqCst)
    }

    fn sleep(&self, duration: Duration) -> impl Future<Output = ()> + Send {
        tokio::time::sleep(duration)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test(start_paused = true)]
    async fn time_only_moves_when_advanced() {
        let env = SimEnv::default();
        let start = env.now();
        tokio::time::advance(Duration::from_secs(5)).await;
        assert_eq!(env.now() - start, Duration::from_secs(5));
    }

    #[test]
    fn clones_share_wall_clock() {
        let env = SimEnv::default();
        let view = env.clone();
        env.set_unix_time(42);
        assert_eq!(view.unix_time(), 42);
    }
}
