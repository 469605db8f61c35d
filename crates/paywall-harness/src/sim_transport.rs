//! Recording transport.

use std::sync::{
    Arc, Mutex,
    atomic::{AtomicBool, Ordering},
};

use paywall_core::{error::TransportError, transport::Transport};
use paywall_proto::Message;

use crate::lock;

/// One post made through the transport.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Posted {
    /// Origin the post was addressed to
    pub target_origin: String,
    /// Encoded envelope
    pub data: String,
}

/// Transport that records every post. Clones share the record.
#[derive(Debug, Clone, Default)]
pub struct SimTransport {
    posted: Arc<Mutex<Vec<Posted>>>,
    refusing: Arc<AtomicBool>,
}

impl SimTransport {
    /// Everything posted so far.
    pub fn posted(&self) -> Vec<Posted> {
        lock(&self.posted).clone()
    }

    /// Posted envelopes, decoded. Undecodable posts are skipped.
    pub fn messages(&self) -> Vec<Message> {
        lock(&self.posted)
            .iter()
            .filter_map(|posted| Message::decode(posted.data.as_bytes()).ok())
            .collect()
    }

    /// Make subsequent posts fail.
    pub fn refuse(&self, refusing: bool) {
        self.refusing.store(refusing, Ordering::SeqCst);
    }
}

impl Transport for SimTransport {
    fn post(&mut self, data: String, target_origin: &str) -> Result<(), TransportError> {
        if self.refusing.load(Ordering::SeqCst) {
            return Err(TransportError("surface detached".to_string()));
        }
        lock(&self.posted).push(Posted { target_origin: target_origin.to_string(), data });
        Ok(())
    }
}
