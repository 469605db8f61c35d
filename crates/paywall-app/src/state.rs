//! Page lock status.
//!
//! ```text
//! ┌─────────┐  begin_check   ┌─────────┐  finish_check(locks)  ┌──────────┐
//! │ Unknown │<───────────────│  any    │──────────────────────>│ Unlocked │
//! └─────────┘                └─────────┘  finish_check([])     ├──────────┤
//!      │                                 ─────────────────────>│  Locked  │
//!      └──────── on_transaction (optimistic) ─────────────────>└──────────┘
//! ```
//!
//! Status is derived, not authoritative. Each key check carries a
//! generation; a check that finishes after a newer check began, or after an
//! optimistic unlock, is discarded so the page always reflects the latest
//! decision.

use paywall_proto::{PaywallConfig, TransactionInfo};
use serde::{Deserialize, Serialize};

use crate::policy::UnlockPolicy;

/// Page-level lock status.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum LockStatus {
    /// No decision yet, or a key check is in flight
    #[default]
    Unknown,
    /// No configured lock is unlocked
    Locked,
    /// At least one configured lock is unlocked
    Unlocked,
}

impl LockStatus {
    /// Wire name.
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Unknown => "unknown",
            Self::Locked => "locked",
            Self::Unlocked => "unlocked",
        }
    }
}

/// A decided status change, published as a page event.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Transition {
    /// New status
    pub state: LockStatus,
    /// Unlocked locks, empty when locked
    pub locks: Vec<String>,
}

/// Tracks the page's lock status across key checks.
#[derive(Debug, Clone, Default)]
pub struct StatusTracker {
    status: LockStatus,
    generation: u64,
    unlocked: Vec<String>,
}

impl StatusTracker {
    /// Current status.
    pub fn status(&self) -> LockStatus {
        self.status
    }

    /// Locks behind the current `Unlocked` status.
    pub fn unlocked(&self) -> &[String] {
        &self.unlocked
    }

    /// Start a key check. Status becomes `Unknown` until it finishes.
    pub fn begin_check(&mut self) -> u64 {
        self.generation += 1;
        self.status = LockStatus::Unknown;
        self.generation
    }

    /// Finish the key check `generation` with its unlocked locks.
    ///
    /// Returns `None` if a newer decision superseded it.
    pub fn finish_check(&mut self, generation: u64, unlocked: Vec<String>) -> Option<Transition> {
        if generation != self.generation {
            tracing::debug!(generation, current = self.generation, "discarding stale key check");
            return None;
        }
        Some(if unlocked.is_empty() { self.lock() } else { self.unlock(unlocked) })
    }

    /// Apply a submitted purchase under `config`'s policy.
    pub fn on_transaction(
        &mut self,
        config: &PaywallConfig,
        transaction: &TransactionInfo,
    ) -> Option<Transition> {
        let lock = UnlockPolicy::of(config).unlock_on_transaction(config, transaction)?;
        Some(self.unlock(vec![lock]))
    }

    /// Lock the page. Supersedes in-flight checks.
    pub fn lock(&mut self) -> Transition {
        self.generation += 1;
        self.status = LockStatus::Locked;
        self.unlocked.clear();
        Transition { state: LockStatus::Locked, locks: Vec::new() }
    }

    /// Unlock the page for `locks`. Supersedes in-flight checks.
    pub fn unlock(&mut self, locks: Vec<String>) -> Transition {
        self.generation += 1;
        self.status = LockStatus::Unlocked;
        self.unlocked.clone_from(&locks);
        Transition { state: LockStatus::Unlocked, locks }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn check_decides_locked_or_unlocked() {
        let mut tracker = StatusTracker::default();
        assert_eq!(tracker.status(), LockStatus::Unknown);

        let generation = tracker.begin_check();
        let transition = tracker.finish_check(generation, vec![]).unwrap();
        assert_eq!(transition.state, LockStatus::Locked);

        let generation = tracker.begin_check();
        assert_eq!(tracker.status(), LockStatus::Unknown);
        let transition = tracker.finish_check(generation, vec!["0xA".into()]).unwrap();
        assert_eq!(
            transition,
            Transition { state: LockStatus::Unlocked, locks: vec!["0xA".into()] }
        );
        assert_eq!(tracker.unlocked(), ["0xA".to_string()]);
    }

    #[test]
    fn older_check_is_discarded() {
        let mut tracker = StatusTracker::default();
        let first = tracker.begin_check();
        let second = tracker.begin_check();

        assert!(tracker.finish_check(first, vec!["0xA".into()]).is_none());
        assert_eq!(tracker.finish_check(second, vec![]).unwrap().state, LockStatus::Locked);
    }

    #[test]
    fn optimistic_unlock_supersedes_in_flight_check() {
        let config = PaywallConfig::default().with_lock("0xLock1", 4);
        let mut tracker = StatusTracker::default();
        let generation = tracker.begin_check();

        let transition =
            tracker.on_transaction(&config, &TransactionInfo::new("0xabc", "0xLock1")).unwrap();
        assert_eq!(transition.locks, vec!["0xLock1".to_string()]);

        assert!(tracker.finish_check(generation, vec![]).is_none());
        assert_eq!(tracker.status(), LockStatus::Unlocked);
    }

    #[test]
    fn pessimistic_transaction_leaves_status_alone() {
        let config = PaywallConfig::default().with_lock("0xLock1", 4).with_pessimistic(true);
        let mut tracker = StatusTracker::default();
        tracker.lock();

        let tx = TransactionInfo::new("0xabc", "0xLock1");
        assert!(tracker.on_transaction(&config, &tx).is_none());
        assert_eq!(tracker.status(), LockStatus::Locked);
    }
}
