//! Scriptable chain query service.

use std::{
    collections::{HashMap, HashSet},
    sync::{Arc, Mutex},
    time::Duration,
};

use async_trait::async_trait;
use paywall_core::{
    aggregator::ChainQuery,
    error::ChainQueryError,
    keys::{KeyRecord, KeyTransaction},
};
use paywall_proto::NetworkConfig;

use crate::lock;

#[derive(Debug, Default)]
struct ChainState {
    keys: HashMap<(String, String), KeyRecord>,
    failing: HashSet<String>,
    delays: HashMap<String, Duration>,
    lookups: Vec<(String, String, u64)>,
}

/// Chain query service answering from scripted key records. Clones share
/// the script.
///
/// Owners with no record hold no key: the answer is an empty record with a
/// zero expiration.
#[derive(Debug, Clone, Default)]
pub struct SimChain {
    state: Arc<Mutex<ChainState>>,
}

impl SimChain {
    /// Give `owner` a key on `lock` expiring at `expiration`.
    pub fn grant(&self, lock_address: &str, owner: &str, expiration: u64) {
        self.record(KeyRecord {
            lock: lock_address.to_string(),
            owner: owner.to_string(),
            expiration,
            transactions: Vec::new(),
        });
    }

    /// Give `owner` a key on `lock` whose purchase is still `transaction`.
    pub fn purchase(&self, lock_address: &str, owner: &str, transaction: KeyTransaction) {
        self.record(KeyRecord {
            lock: lock_address.to_string(),
            owner: owner.to_string(),
            expiration: 0,
            transactions: vec![transaction],
        });
    }

    /// Answer lookups for `record`'s lock and owner with `record`.
    pub fn record(&self, record: KeyRecord) {
        let key = (record.lock.clone(), record.owner.clone());
        lock(&self.state).keys.insert(key, record);
    }

    /// Fail every lookup on `lock`.
    pub fn fail(&self, lock_address: &str) {
        lock(&self.state).failing.insert(lock_address.to_string());
    }

    /// Answer lookups on `lock` only after `delay`.
    pub fn delay(&self, lock_address: &str, delay: Duration) {
        lock(&self.state).delays.insert(lock_address.to_string(), delay);
    }

    /// Lookups served so far as `(lock, owner, network)`.
    pub fn lookups(&self) -> Vec<(String, String, u64)> {
        lock(&self.state).lookups.clone()
    }
}

#[async_trait]
impl ChainQuery for SimChain {
    async fn key_for(
        &self,
        lock_address: &str,
        owner: &str,
        network: u64,
        _config: &NetworkConfig,
    ) -> Result<KeyRecord, ChainQueryError> {
        let (outcome, delay) = {
            let mut state = lock(&self.state);
            state.lookups.push((lock_address.to_string(), owner.to_string(), network));
            let outcome = if state.failing.contains(lock_address) {
                Err(ChainQueryError::Query(format!("lookup on {lock_address} failed")))
            } else {
                let key = (lock_address.to_string(), owner.to_string());
                Ok(state.keys.get(&key).cloned().unwrap_or_else(|| KeyRecord {
                    lock: lock_address.to_string(),
                    owner: owner.to_string(),
                    ..KeyRecord::default()
                }))
            };
            (outcome, state.delays.get(lock_address).copied())
        };

        if let Some(delay) = delay {
            tokio::time::sleep(delay).await;
        }
        outcome
    }
}
