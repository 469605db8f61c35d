//! Checkout lifecycle payloads.

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

/// Authenticated user, as reported by the surface.
///
/// Also the shape cached in page-local storage between reloads.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct UserInfo {
    /// Account address of the user
    pub address: String,
}

/// A purchase transaction submitted from the checkout.
///
/// Both fields are optional on the wire; optimistic unlocking only considers
/// notifications that carry both.
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct TransactionInfo {
    /// Transaction hash
    pub hash: Option<String>,
    /// Address of the lock being purchased
    pub lock: Option<String>,
}

impl TransactionInfo {
    /// Notification for `hash` on `lock`.
    pub fn new(hash: impl Into<String>, lock: impl Into<String>) -> Self {
        Self { hash: Some(hash.into()), lock: Some(lock.into()) }
    }

    /// Hash and lock, if both are present.
    pub fn hash_and_lock(&self) -> Option<(&str, &str)> {
        Some((self.hash.as_deref()?, self.lock.as_deref()?))
    }
}

/// Purchaser metadata collected by the checkout form.
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Metadata(pub BTreeMap<String, String>);

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn transaction_info_tolerates_missing_fields() {
        let info: TransactionInfo = serde_json::from_str(r#"{"hash":"0xabc"}"#).unwrap();
        assert_eq!(info.hash.as_deref(), Some("0xabc"));
        assert!(info.hash_and_lock().is_none());
    }

    #[test]
    fn transaction_info_ignores_extra_fields() {
        let info: TransactionInfo =
            serde_json::from_str(r#"{"hash":"0xabc","lock":"0xLock1","network":4}"#).unwrap();
        assert_eq!(info.hash_and_lock(), Some(("0xabc", "0xLock1")));
    }
}
