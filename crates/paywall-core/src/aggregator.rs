//! Key status aggregation across locks.
//!
//! One independent lookup per configured lock, all in flight at once, with
//! no ordering between them. A failed lookup is isolated to its lock: it is
//! logged and counted as "not unlocked", and never fails the aggregate.

use std::sync::Arc;

use async_trait::async_trait;
use futures::future::{BoxFuture, FutureExt, join_all};
use paywall_proto::{NetworkConfig, NetworkConfigs, PaywallConfig};

use crate::{
    env::Environment,
    error::ChainQueryError,
    keys::{self, Key, KeyRecord, KeyStatus},
};

/// Chain query service answering per-lock key lookups.
#[async_trait]
pub trait ChainQuery: Send + Sync {
    /// Fetch `owner`'s key on `lock` deployed on `network`.
    async fn key_for(
        &self,
        lock: &str,
        owner: &str,
        network: u64,
        config: &NetworkConfig,
    ) -> Result<KeyRecord, ChainQueryError>;
}

/// Outcome of one lock's lookup.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LockLookup {
    /// Lock address
    pub lock: String,
    /// Derived key, or why it could not be fetched
    pub outcome: Result<Key, ChainQueryError>,
}

impl LockLookup {
    /// Whether this lock is unlocked for the user.
    pub fn is_unlocked(&self) -> bool {
        self.outcome.as_ref().is_ok_and(Key::is_valid)
    }
}

/// Runs key lookups for every lock of a paywall config.
#[derive(Clone)]
pub struct KeyStatusAggregator<E> {
    query: Arc<dyn ChainQuery>,
    env: E,
}

impl<E: Environment> KeyStatusAggregator<E> {
    /// Aggregator over `query`.
    pub fn new(query: Arc<dyn ChainQuery>, env: E) -> Self {
        Self { query, env }
    }

    /// Look up `owner`'s key on every lock in `config`.
    ///
    /// Resolves once every lookup has settled, with one entry per lock.
    pub fn lookup_all(
        &self,
        owner: &str,
        config: &PaywallConfig,
        networks: &NetworkConfigs,
    ) -> BoxFuture<'static, Vec<LockLookup>> {
        let lookups: Vec<_> = config
            .locks
            .keys()
            .map(|lock| {
                let target = config
                    .network_for(lock)
                    .ok_or_else(|| ChainQueryError::MissingNetwork(lock.clone()))
                    .and_then(|network| {
                        networks
                            .get(&network)
                            .cloned()
                            .map(|network_config| (network, network_config))
                            .ok_or(ChainQueryError::UnknownNetwork(network))
                    });
                self.lookup(lock.clone(), owner.to_string(), target)
            })
            .collect();

        join_all(lookups).boxed()
    }

    fn lookup(
        &self,
        lock: String,
        owner: String,
        target: Result<(u64, NetworkConfig), ChainQueryError>,
    ) -> BoxFuture<'static, LockLookup> {
        let query = Arc::clone(&self.query);
        let env = self.env.clone();
        async move {
            let outcome = match target {
                Ok((network, network_config)) => query
                    .key_for(&lock, &owner, network, &network_config)
                    .await
                    .map(|record| {
                        Key::derive(record, network_config.required_confirmations, env.unix_time())
                    }),
                Err(error) => Err(error),
            };
            LockLookup { lock, outcome }
        }
        .boxed()
    }

    /// Locks `owner` holds a valid key for. Failed lookups are logged and
    /// excluded; an empty result is not an error.
    pub fn unlocked_locks(
        &self,
        owner: &str,
        config: &PaywallConfig,
        networks: &NetworkConfigs,
    ) -> BoxFuture<'static, Vec<String>> {
        self.lookup_all(owner, config, networks)
            .map(|lookups| {
                lookups
                    .into_iter()
                    .filter_map(|lookup| {
                        if let Err(error) = &lookup.outcome {
                            tracing::warn!(lock = %lookup.lock, %error, "key lookup failed");
                        }
                        lookup.is_unlocked().then_some(lookup.lock)
                    })
                    .collect()
            })
            .boxed()
    }

    /// Highest status among settled lookups. Failed lookups count as
    /// [`KeyStatus::None`].
    pub fn highest_status(&self, lookups: &[LockLookup]) -> KeyStatus {
        let statuses = lookups
            .iter()
            .map(|lookup| lookup.outcome.as_ref().map_or(KeyStatus::None, |k| k.status));
        keys::highest_status(statuses)
    }
}
