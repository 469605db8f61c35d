//! Page-level events dispatched to the host application.

use paywall_proto::{Metadata, TransactionInfo, UserInfo};
use serde_json::{Map, Value};

use crate::state::{LockStatus, Transition};

/// Event the orchestrator publishes to the host page.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PageEvent {
    /// The surface authenticated a user
    Authenticated(UserInfo),
    /// Lock status decided
    Status {
        /// New status
        state: LockStatus,
        /// Unlocked locks; present only when unlocked
        locks: Option<Vec<String>>,
    },
    /// The surface submitted a purchase
    TransactionSent(TransactionInfo),
    /// The checkout was dismissed
    CloseModal,
    /// Purchaser metadata collected by the surface
    Metadata(Metadata),
}

impl PageEvent {
    /// Event name on the host page.
    pub fn name(&self) -> &'static str {
        match self {
            Self::Authenticated(_) => "unlockProtocol.authenticated",
            Self::Status { .. } => "unlockProtocol.status",
            Self::TransactionSent(_) => "unlockProtocol.transactionSent",
            Self::CloseModal => "unlockProtocol.closeModal",
            Self::Metadata(_) => "unlockProtocol.metadata",
        }
    }

    /// Event detail object.
    pub fn detail(&self) -> Value {
        let mut detail = Map::new();
        match self {
            Self::Authenticated(info) => {
                detail.insert("address".into(), info.address.clone().into());
            },
            Self::Status { state, locks } => {
                detail.insert("state".into(), state.as_str().into());
                if let Some(locks) = locks {
                    detail.insert("locks".into(), locks.clone().into());
                }
            },
            Self::TransactionSent(tx) => {
                detail.insert("hash".into(), tx.hash.clone().into());
                detail.insert("lock".into(), tx.lock.clone().into());
            },
            Self::CloseModal => {},
            Self::Metadata(metadata) => {
                for (field, value) in &metadata.0 {
                    detail.insert(field.clone(), value.clone().into());
                }
            },
        }
        Value::Object(detail)
    }
}

impl From<Transition> for PageEvent {
    fn from(transition: Transition) -> Self {
        let locks = (transition.state == LockStatus::Unlocked).then_some(transition.locks);
        Self::Status { state: transition.state, locks }
    }
}
