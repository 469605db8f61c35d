//! Scenario builder API.
//!
//! Provides a declarative API for constructing scenario tests that enforce
//! the Oracle Pattern.

use std::sync::Arc;

use paywall_app::{Collaborators, MemoryStorage, Paywall, PaywallSettings};
use paywall_core::provider::Capability;
use paywall_proto::{Message, NetworkConfig, NetworkConfigs, PaywallConfig};
use serde_json::{Value, json};

use crate::{
    CHECKOUT_ORIGIN, DEFAULT_NETWORK, SimCapability, SimChain, SimDriver, SimEnv,
    scenario::{OracleFn, World},
};

/// One scripted action.
#[derive(Debug, Clone)]
pub enum Step {
    /// Host calls `load_checkout_modal`, optionally replacing the config
    LoadCheckout(Option<PaywallConfig>),
    /// Host calls `shake_hands` with the default checkout URL
    ShakeHands,
    /// Host calls `get_provider`, optionally replacing the config
    GetProvider(Option<PaywallConfig>),
    /// Host calls `set_paywall_config`
    SetConfig(PaywallConfig),
    /// Surface announces readiness
    Handshake,
    /// Surface posts a message from its own origin
    Surface(Message),
    /// A message arrives from another origin
    Foreign {
        /// Sending origin
        origin: String,
        /// Message posted
        message: Message,
    },
    /// Surface posts raw data from its own origin
    Raw(String),
    /// Host installs or removes the capability
    Connect(Option<SimCapability>),
    /// Capability fires an event
    Emit {
        /// Event name
        event: String,
        /// Event arguments
        data: Value,
    },
    /// Move the wall clock
    SetUnixTime(u64),
    /// Drive in-flight work to completion
    Settle,
    /// Host tears the paywall down
    Close,
}

/// Scenario builder.
///
/// Describe the page and the script, then call `.oracle()` to get a
/// [`RunnableScenario`].
pub struct Scenario {
    name: String,
    config: PaywallConfig,
    networks: NetworkConfigs,
    settings: PaywallSettings,
    chain: SimChain,
    capability: Option<SimCapability>,
    cached_user: Option<String>,
    refuse_surface: bool,
    steps: Vec<Step>,
}

impl Scenario {
    /// Create a new scenario with the given name.
    ///
    /// The default network is registered with the simulated checkout
    /// application. No locks, no capability, no cached user.
    pub fn new(name: impl Into<String>) -> Self {
        let networks = NetworkConfigs::from([(
            DEFAULT_NETWORK,
            NetworkConfig::new("https://rpc.sim", CHECKOUT_ORIGIN),
        )]);
        Self {
            name: name.into(),
            config: PaywallConfig::default(),
            networks,
            settings: PaywallSettings::default(),
            chain: SimChain::default(),
            capability: None,
            cached_user: None,
            refuse_surface: false,
            steps: Vec::new(),
        }
    }

    /// Configure a lock on the default network.
    pub fn lock(mut self, address: &str) -> Self {
        self.config = self.config.with_lock(address, DEFAULT_NETWORK);
        self
    }

    /// Switch the paywall to pessimistic unlocking.
    pub fn pessimistic(mut self) -> Self {
        self.config = self.config.with_pessimistic(true);
        self
    }

    /// Replace the initial config.
    pub fn config(mut self, config: PaywallConfig) -> Self {
        self.config = config;
        self
    }

    /// Register a network.
    pub fn network(mut self, id: u64, network: NetworkConfig) -> Self {
        self.networks.insert(id, network);
        self
    }

    /// Runtime settings.
    pub fn settings(mut self, settings: PaywallSettings) -> Self {
        self.settings = settings;
        self
    }

    /// Chain query script. Keep a clone to script it further.
    pub fn chain(mut self, chain: SimChain) -> Self {
        self.chain = chain;
        self
    }

    /// Give `owner` a key on `lock` that expires long after the scenario.
    pub fn grant(self, lock: &str, owner: &str) -> Self {
        self.chain.grant(lock, owner, u64::MAX);
        self
    }

    /// Install a capability from the start.
    pub fn capability(mut self, capability: SimCapability) -> Self {
        self.capability = Some(capability);
        self
    }

    /// Start with `address` in the page-local user cache.
    pub fn cached_user(mut self, address: &str) -> Self {
        self.cached_user = Some(address.to_string());
        self
    }

    /// Make surface creation fail.
    pub fn refuse_surface(mut self) -> Self {
        self.refuse_surface = true;
        self
    }

    /// Append a step.
    pub fn step(mut self, step: Step) -> Self {
        self.steps.push(step);
        self
    }

    /// Load the checkout with the current config.
    pub fn load_checkout(self) -> Self {
        self.step(Step::LoadCheckout(None))
    }

    /// Surface announces readiness.
    pub fn handshake(self) -> Self {
        self.step(Step::Handshake)
    }

    /// Surface posts `message`.
    pub fn surface(self, message: Message) -> Self {
        self.step(Step::Surface(message))
    }

    /// Drive in-flight work to completion.
    pub fn settle(self) -> Self {
        self.step(Step::Settle)
    }

    /// Set the oracle function and return a runnable scenario.
    ///
    /// The oracle is mandatory - you cannot run a scenario without
    /// verification.
    pub fn oracle(self, oracle: OracleFn) -> RunnableScenario {
        RunnableScenario { scenario: self, oracle }
    }

    async fn execute(self) -> World {
        let env = SimEnv::default();
        let driver = if self.refuse_surface { SimDriver::refusing() } else { SimDriver::default() };

        let storage = match &self.cached_user {
            Some(address) => MemoryStorage::with_entries([(
                self.settings.storage_key.clone(),
                json!({ "address": address }).to_string(),
            )]),
            None => MemoryStorage::default(),
        };

        let capability =
            self.capability.clone().map(|c| -> Arc<dyn Capability> { Arc::new(c) });
        let paywall = Paywall::new(
            self.config,
            self.networks,
            Collaborators {
                driver: driver.clone(),
                env: env.clone(),
                chain: Arc::new(self.chain.clone()),
                storage: Box::new(storage),
                capability,
            },
            self.settings,
        );

        let mut world = World::new(paywall, driver, self.chain, self.capability, env);
        for (index, step) in self.steps.into_iter().enumerate() {
            tracing::debug!(scenario = %self.name, index, ?step, "applying step");
            world.apply(step).await;
        }
        world
    }
}

/// A scenario with an oracle function that can be executed.
pub struct RunnableScenario {
    scenario: Scenario,
    oracle: OracleFn,
}

impl RunnableScenario {
    /// Execute the scenario on a paused current-thread runtime, then run the
    /// oracle against the final world.
    pub fn run(self) -> Result<(), String> {
        let name = self.scenario.name.clone();
        let runtime = tokio::runtime::Builder::new_current_thread()
            .enable_time()
            .start_paused(true)
            .build()
            .map_err(|e| format!("Scenario '{name}': cannot build runtime: {e}"))?;

        let world = runtime.block_on(self.scenario.execute());
        (self.oracle)(&world).map_err(|e| format!("Scenario '{name}': {e}"))
    }
}
