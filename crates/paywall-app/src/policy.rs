//! Unlock policy for submitted purchases.
//!
//! The `pessimistic` flag is consulted here and nowhere else.

use paywall_proto::{PaywallConfig, TransactionInfo};

/// How a submitted purchase affects the page.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum UnlockPolicy {
    /// Unlock as soon as the purchase transaction is submitted
    Optimistic,
    /// Wait for a key check to report a valid key
    Pessimistic,
}

impl UnlockPolicy {
    /// Policy configured by `config`.
    pub fn of(config: &PaywallConfig) -> Self {
        if config.pessimistic { Self::Pessimistic } else { Self::Optimistic }
    }

    /// Lock to unlock immediately for `transaction`, if any.
    ///
    /// Only an optimistic policy unlocks, and only when the transaction
    /// carries both a hash and a lock configured on this page.
    pub fn unlock_on_transaction(
        self,
        config: &PaywallConfig,
        transaction: &TransactionInfo,
    ) -> Option<String> {
        if self == Self::Pessimistic {
            return None;
        }
        let (hash, lock) = transaction.hash_and_lock()?;
        if !config.locks.contains_key(lock) {
            tracing::debug!(lock, hash, "transaction for unconfigured lock, not unlocking");
            return None;
        }
        Some(lock.to_string())
    }
}
