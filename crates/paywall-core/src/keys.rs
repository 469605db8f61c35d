//! Key status derivation.
//!
//! A [`Key`] is recomputed from a raw [`KeyRecord`] on every lookup and never
//! mutated in place. Its status comes from the newest purchase transaction,
//! falling back to the key's expiration when there is none.

use serde::{Deserialize, Serialize};

/// Status of a user's key on one lock, in precedence order.
///
/// Within one purchase attempt status only moves forward along
/// `None -> Submitted -> Pending -> Confirming -> Valid`; expiration and
/// failed transactions reset it.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Default, Serialize, Deserialize,
)]
#[serde(rename_all = "lowercase")]
pub enum KeyStatus {
    /// No key
    #[default]
    None,
    /// Key existed and ran out
    Expired,
    /// Purchase transaction handed to the wallet
    Submitted,
    /// Purchase transaction broadcast, not mined
    Pending,
    /// Mined, waiting for confirmations
    Confirming,
    /// Confirmed and unexpired
    Valid,
}

/// Highest status of a set of keys, `None` for an empty set.
pub fn highest_status(statuses: impl IntoIterator<Item = KeyStatus>) -> KeyStatus {
    statuses.into_iter().max().unwrap_or_default()
}

/// Lifecycle of a purchase transaction.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum TransactionStatus {
    /// Handed to the wallet
    Submitted,
    /// Broadcast, not mined
    Pending,
    /// Included in a block
    Mined,
    /// Reverted or dropped
    Failed,
}

/// A purchase transaction touching a key.
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct KeyTransaction {
    /// Transaction hash
    pub hash: String,
    /// Status, if known
    #[serde(default)]
    pub status: Option<TransactionStatus>,
    /// Confirmations so far
    #[serde(default)]
    pub confirmations: u32,
    /// Block it was mined in
    #[serde(default)]
    pub block_number: Option<u64>,
}

/// Raw key data returned by the chain query service.
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct KeyRecord {
    /// Lock address
    pub lock: String,
    /// Key owner
    pub owner: String,
    /// Expiration, unix seconds. Zero when the user never held a key.
    #[serde(default)]
    pub expiration: u64,
    /// Purchase transactions for this key, any order
    #[serde(default)]
    pub transactions: Vec<KeyTransaction>,
}

/// A key with its derived status.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Key {
    /// Lock address
    pub lock: String,
    /// Key owner
    pub owner: String,
    /// Derived status
    pub status: KeyStatus,
    /// Confirmations of the newest transaction
    pub confirmations: u32,
    /// Expiration, unix seconds
    pub expiration: u64,
    /// Transactions, newest first
    pub transactions: Vec<KeyTransaction>,
}

impl Key {
    /// Derive a key from `record`, with `required_confirmations` for the
    /// lock's network, at wall-clock time `now` (unix seconds).
    pub fn derive(record: KeyRecord, required_confirmations: u32, now: u64) -> Self {
        let KeyRecord { lock, owner, expiration, mut transactions } = record;

        // Unmined first, then by descending block.
        transactions.sort_by(|a, b| match (a.block_number, b.block_number) {
            (None, None) => std::cmp::Ordering::Equal,
            (None, Some(_)) => std::cmp::Ordering::Less,
            (Some(_), None) => std::cmp::Ordering::Greater,
            (Some(a), Some(b)) => b.cmp(&a),
        });

        let unexpired = expiration > now;
        let newest = transactions.first();
        let confirmations = newest.map_or(0, |tx| tx.confirmations);

        let status = match newest {
            None if unexpired => KeyStatus::Valid,
            None if expiration > 0 => KeyStatus::Expired,
            None => KeyStatus::None,
            Some(tx) => match tx.status {
                None | Some(TransactionStatus::Failed) => KeyStatus::None,
                Some(TransactionStatus::Submitted) => KeyStatus::Submitted,
                Some(TransactionStatus::Pending) => KeyStatus::Pending,
                Some(TransactionStatus::Mined) if tx.confirmations < required_confirmations => {
                    KeyStatus::Confirming
                },
                Some(TransactionStatus::Mined) if unexpired => KeyStatus::Valid,
                Some(TransactionStatus::Mined) => KeyStatus::Expired,
            },
        };

        Self { lock, owner, status, confirmations, expiration, transactions }
    }

    /// Whether the key grants access.
    pub fn is_valid(&self) -> bool {
        self.status == KeyStatus::Valid
    }
}

#[cfg(test)]
mod tests {
    use proptest::prelude::*;

    use super::*;

    const NOW: u64 = 1_700_000_000;

    fn record(expiration: u64, transactions: Vec<KeyTransaction>) -> KeyRecord {
        KeyRecord { lock: "0xLock".into(), owner: "0xUser".into(), expiration, transactions }
    }

    fn tx(
        status: Option<TransactionStatus>,
        confirmations: u32,
        block: Option<u64>,
    ) -> KeyTransaction {
        KeyTransaction { hash: format!("0x{block:?}"), status, confirmations, block_number: block }
    }

    #[test]
    fn precedence_picks_highest() {
        let statuses = [KeyStatus::None, KeyStatus::Confirming, KeyStatus::Expired];
        assert_eq!(highest_status(statuses), KeyStatus::Confirming);
        assert_eq!(highest_status([]), KeyStatus::None);
    }

    #[test]
    fn no_transactions_uses_expiration() {
        assert_eq!(Key::derive(record(NOW + 100, vec![]), 1, NOW).status, KeyStatus::Valid);
        assert_eq!(Key::derive(record(NOW, vec![]), 1, NOW).status, KeyStatus::Expired);
        assert_eq!(Key::derive(record(NOW - 100, vec![]), 1, NOW).status, KeyStatus::Expired);
        assert_eq!(Key::derive(record(0, vec![]), 1, NOW).status, KeyStatus::None);
    }

    #[test]
    fn newest_transaction_decides() {
        let cases = [
            (tx(None, 0, None), KeyStatus::None),
            (tx(Some(TransactionStatus::Failed), 0, Some(5)), KeyStatus::None),
            (tx(Some(TransactionStatus::Submitted), 0, None), KeyStatus::Submitted),
            (tx(Some(TransactionStatus::Pending), 0, None), KeyStatus::Pending),
            (tx(Some(TransactionStatus::Mined), 0, Some(5)), KeyStatus::Confirming),
            (tx(Some(TransactionStatus::Mined), 1, Some(5)), KeyStatus::Valid),
        ];
        for (transaction, expected) in cases {
            let key = Key::derive(record(NOW + 10_000, vec![transaction.clone()]), 1, NOW);
            assert_eq!(key.status, expected, "{transaction:?}");
        }
    }

    #[test]
    fn confirmed_but_past_expiration_is_expired() {
        let mined = vec![tx(Some(TransactionStatus::Mined), 1, Some(5))];
        let key = Key::derive(record(1, mined), 1, NOW);
        assert_eq!(key.status, KeyStatus::Expired);
    }

    #[test]
    fn network_confirmation_requirement_applies() {
        let mined = vec![tx(Some(TransactionStatus::Mined), 3, Some(5))];
        let strict = Key::derive(record(NOW + 1, mined.clone()), 12, NOW);
        assert_eq!(strict.status, KeyStatus::Confirming);
        assert_eq!(Key::derive(record(NOW + 1, mined), 3, NOW).status, KeyStatus::Valid);
    }

    #[test]
    fn unmined_transactions_sort_before_mined_ones() {
        let key = Key::derive(
            record(
                NOW + 1000,
                vec![
                    tx(Some(TransactionStatus::Mined), 120, Some(2)),
                    tx(Some(TransactionStatus::Mined), 200, Some(1)),
                    tx(Some(TransactionStatus::Pending), 0, None),
                ],
            ),
            1,
            NOW,
        );
        assert_eq!(key.status, KeyStatus::Pending);
        let blocks: Vec<_> = key.transactions.iter().map(|t| t.block_number).collect();
        assert_eq!(blocks, vec![None, Some(2), Some(1)]);
    }

    #[test]
    fn newest_mined_block_wins() {
        let key = Key::derive(
            record(
                NOW + 1000,
                vec![
                    tx(Some(TransactionStatus::Failed), 0, Some(1)),
                    tx(Some(TransactionStatus::Mined), 120, Some(2)),
                ],
            ),
            1,
            NOW,
        );
        assert!(key.is_valid());
        assert_eq!(key.confirmations, 120);
    }

    fn any_status() -> impl Strategy<Value = KeyStatus> {
        prop_oneof![
            Just(KeyStatus::None),
            Just(KeyStatus::Expired),
            Just(KeyStatus::Submitted),
            Just(KeyStatus::Pending),
            Just(KeyStatus::Confirming),
            Just(KeyStatus::Valid),
        ]
    }

    proptest! {
        #[test]
        fn highest_status_dominates_every_member(
            statuses in prop::collection::vec(any_status(), 1..8)
        ) {
            let highest = highest_status(statuses.iter().copied());
            prop_assert!(statuses.contains(&highest));
            prop_assert!(statuses.iter().all(|status| *status <= highest));
        }
    }
}
