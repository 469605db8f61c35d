//! The paywall orchestrator.
//!
//! # Architecture
//!
//! [`Paywall`] owns the page's single surface connection and everything that
//! reacts to it. It runs on one cooperative event loop and never blocks:
//!
//! ```text
//!  RawEvent ──> ChildConnection ──> handler table ──> inbox ──> handle()
//!                                                                 │
//!         ┌───────────────────────────────┬───────────────────────┤
//!         ▼                               ▼                       ▼
//!   ProviderBridge                 KeyStatusAggregator       StatusTracker
//!   (call futures, listeners)      (key check futures)       (page events)
//!         │                               │
//!         └──────────── tasks ────────────┘
//! ```
//!
//! Work that waits on a collaborator (a forwarded call, a key check, an
//! enable request) is pushed onto a task set as a `'static` future. The host
//! drives the loop with [`Paywall::run`] or, in tests, [`Paywall::run_until_idle`].
//! Completing tasks only ever sends to the surface or publishes page events.
//!
//! # Buffering
//!
//! Two buffers preserve send order. Sends issued before any surface exists
//! are held by the orchestrator and handed to the connection when it is
//! created; the connection's emitter then holds them until the surface's
//! handshake.

use std::{
    sync::{Arc, mpsc},
    task::Poll,
};

use futures::{
    FutureExt,
    future::{self, BoxFuture},
    stream::{BoxStream, FuturesUnordered, SelectAll, Stream, StreamExt},
};
use paywall_core::{
    aggregator::{ChainQuery, KeyStatusAggregator},
    connection::{self, ChildConnection, ConnectionState},
    emitter::{HandlerError, Subscription},
    env::Environment,
    error::CapabilityError,
    provider::{BridgeConfig, CallOutcome, Capability, ListenerEvent, ProviderBridge},
    transport::RawEvent,
};
use paywall_proto::{
    ConfigError, Message, MessageKind, NetworkConfigs, PaywallConfig, TransactionInfo, UserInfo,
};

use crate::{
    driver::Driver,
    error::PaywallError,
    event::PageEvent,
    settings::PaywallSettings,
    state::{LockStatus, StatusTracker, Transition},
    storage::{self, Storage},
};

/// Inbound kinds the orchestrator registers handlers for.
const HANDLED_KINDS: [MessageKind; 8] = [
    MessageKind::CloseModal,
    MessageKind::UserInfo,
    MessageKind::MethodCall,
    MessageKind::OnEvent,
    MessageKind::OffEvent,
    MessageKind::Enable,
    MessageKind::Metadata,
    MessageKind::TransactionInfo,
];

/// External collaborators handed to [`Paywall::new`].
pub struct Collaborators<D, E> {
    /// Host page operations
    pub driver: D,
    /// Time source
    pub env: E,
    /// Chain query service for key lookups
    pub chain: Arc<dyn ChainQuery>,
    /// Page-local storage
    pub storage: Box<dyn Storage>,
    /// Signing/query capability, if the host has one
    pub capability: Option<Arc<dyn Capability>>,
}

enum Completion {
    Call(CallOutcome),
    Enable(Result<Vec<String>, CapabilityError>),
    KeyCheck { generation: u64, unlocked: Vec<String> },
}

enum Wake {
    Task(Completion),
    Listener(ListenerEvent),
    Inbound(Option<RawEvent>),
}

/// Paywall orchestrator for one host page.
pub struct Paywall<D: Driver, E: Environment> {
    driver: D,
    env: E,
    settings: PaywallSettings,
    connection: ChildConnection<D::Transport>,
    handlers: Vec<Subscription>,
    inbox_tx: mpsc::Sender<Message>,
    inbox: mpsc::Receiver<Message>,
    bridge: ProviderBridge<E>,
    aggregator: KeyStatusAggregator<E>,
    storage: Box<dyn Storage>,
    config: PaywallConfig,
    networks: NetworkConfigs,
    user: Option<String>,
    tracker: StatusTracker,
    call_buffer: Vec<Message>,
    tasks: FuturesUnordered<BoxFuture<'static, Completion>>,
    listeners: SelectAll<BoxStream<'static, ListenerEvent>>,
}

impl<D: Driver, E: Environment> Paywall<D, E> {
    /// Paywall for `config` over `networks`.
    ///
    /// Restores the cached user: with one, a key check starts; without one
    /// the page is locked.
    pub fn new(
        config: PaywallConfig,
        networks: NetworkConfigs,
        collaborators: Collaborators<D, E>,
        settings: PaywallSettings,
    ) -> Self {
        let Collaborators { driver, env, chain, storage, capability } = collaborators;

        let mut bridge =
            ProviderBridge::new(env.clone(), BridgeConfig { call_timeout: settings.call_timeout });
        bridge.set_capability(capability);
        let config = config.with_provider_info(bridge.capability_info().as_ref());
        let (inbox_tx, inbox) = mpsc::channel();

        let mut paywall = Self {
            driver,
            aggregator: KeyStatusAggregator::new(chain, env.clone()),
            env,
            settings,
            connection: ChildConnection::new(),
            handlers: Vec::new(),
            inbox_tx,
            inbox,
            bridge,
            storage,
            config,
            networks,
            user: None,
            tracker: StatusTracker::default(),
            call_buffer: Vec::new(),
            tasks: FuturesUnordered::new(),
            listeners: SelectAll::new(),
        };
        paywall.load_cache();
        paywall
    }

    fn load_cache(&mut self) {
        match storage::load_user(&*self.storage, &self.settings.storage_key) {
            Ok(Some(user)) => {
                tracing::debug!(address = %user.address, "restored cached user");
                self.user = Some(user.address);
                self.check_keys_and_lock();
            },
            Ok(None) => self.lock_page(),
            Err(error) => {
                tracing::warn!(%error, "ignoring unreadable user cache");
                self.lock_page();
            },
        }
    }

    /// Install or replace the signing capability.
    ///
    /// Listeners on the old capability are torn down, and the provider
    /// metadata in the active config is re-derived.
    pub fn connect(&mut self, capability: Option<Arc<dyn Capability>>) {
        self.bridge.set_capability(capability);
        self.config =
            self.config.clone().with_provider_info(self.bridge.capability_info().as_ref());
        if self.connection.state() != ConnectionState::Unconnected {
            self.send_or_buffer(Message::SetConfig(self.config.clone()));
        }
    }

    /// Connect the surface so it can proxy calls to the host capability,
    /// applying `config` first if given. Returns the installed capability.
    pub fn get_provider(
        &mut self,
        url: Option<&str>,
        config: Option<PaywallConfig>,
    ) -> Result<Option<Arc<dyn Capability>>, PaywallError> {
        if let Some(config) = config {
            self.set_paywall_config(config)?;
        }
        self.shake_hands(url)?;
        Ok(self.bridge.capability())
    }

    /// Show the checkout, creating the surface on first use.
    ///
    /// # Errors
    ///
    /// - `PaywallError::Configuration` if the config is invalid; nothing is shown
    /// - `PaywallError::Surface` or `PaywallError::Connection` if the surface
    ///   cannot be created
    pub fn load_checkout_modal(
        &mut self,
        config: Option<PaywallConfig>,
        url: Option<&str>,
    ) -> Result<(), PaywallError> {
        match config {
            Some(config) => self.set_paywall_config(config)?,
            None => {
                if let Err(error) = self.config.validate(&self.networks) {
                    tracing::error!(%error, "paywall config invalid, not loading checkout");
                    return Err(error.into());
                }
                self.send_or_buffer(Message::SetConfig(self.config.clone()));
            },
        }
        self.shake_hands(url)?;
        self.driver.show_modal();
        Ok(())
    }

    /// Replace the active config, re-check keys and push it to the surface.
    ///
    /// # Errors
    ///
    /// `PaywallError::Configuration` if `config` is invalid; the active
    /// config is kept.
    pub fn set_paywall_config(&mut self, config: PaywallConfig) -> Result<(), PaywallError> {
        if let Err(error) = config.validate(&self.networks) {
            tracing::error!(%error, "rejecting paywall config");
            return Err(error.into());
        }
        self.config = config.with_provider_info(self.bridge.capability_info().as_ref());
        self.check_keys_and_lock();
        self.send_or_buffer(Message::SetConfig(self.config.clone()));
        Ok(())
    }

    /// Address of the authenticated user, if any.
    pub fn get_user_account_address(&self) -> Option<&str> {
        self.user.as_deref()
    }

    /// Current page lock status.
    pub fn get_state(&self) -> LockStatus {
        self.tracker.status()
    }

    /// Active config, with provider metadata.
    pub fn config(&self) -> &PaywallConfig {
        &self.config
    }

    /// Host driver.
    pub fn driver(&self) -> &D {
        &self.driver
    }

    /// Surface connection state.
    pub fn connection_state(&self) -> ConnectionState {
        self.connection.state()
    }

    /// Forwarded calls awaiting the capability.
    pub fn pending_calls(&self) -> usize {
        self.bridge.pending().count()
    }

    /// Events the surface is listening to.
    pub fn listening(&self) -> Vec<String> {
        let mut events: Vec<_> = self.bridge.listeners().map(str::to_string).collect();
        events.sort_unstable();
        events
    }

    fn checkout_url(&self, url: Option<&str>) -> Result<String, ConfigError> {
        if let Some(url) = url {
            return Ok(url.to_string());
        }
        self.config
            .default_network()
            .and_then(|network| self.networks.get(&network))
            .map(|network| self.settings.checkout_url(&network.unlock_app_url))
            .ok_or(ConfigError::NoCheckoutUrl)
    }

    /// Create the surface connection if there is none, attach the handler
    /// table and hand over calls buffered before it existed.
    ///
    /// Idempotent: a live connection is reused.
    pub fn shake_hands(&mut self, url: Option<&str>) -> Result<(), PaywallError> {
        if self.connection.state() != ConnectionState::Unconnected {
            tracing::debug!(url = ?self.connection.url(), "reusing surface connection");
            return Ok(());
        }

        let url = self.checkout_url(url)?;
        connection::surface_origin(&url)?;
        let transport =
            self.driver.open_surface(&url).map_err(|e| PaywallError::Surface(e.to_string()))?;
        self.connection.open(&url, transport, self.env.now())?;

        for kind in HANDLED_KINDS {
            let inbox = self.inbox_tx.clone();
            let subscription = self.connection.on(kind, move |message| {
                inbox.send(message.clone()).map_err(HandlerError::from)
            })?;
            self.handlers.push(subscription);
        }

        let buffered = std::mem::take(&mut self.call_buffer);
        tracing::info!(%url, buffered = buffered.len(), "checkout surface created");
        for message in buffered {
            self.connection.send(message)?;
        }
        Ok(())
    }

    /// Start a key check for the current user. No-op without a user.
    pub fn check_keys_and_lock(&mut self) {
        let Some(user) = self.user.as_deref() else {
            tracing::debug!("no user, skipping key check");
            return;
        };
        let generation = self.tracker.begin_check();
        let check = self
            .aggregator
            .unlocked_locks(user, &self.config, &self.networks)
            .map(move |unlocked| Completion::KeyCheck { generation, unlocked });
        self.tasks.push(check.boxed());
    }

    /// Handle one inbound event from the platform.
    pub fn receive(&mut self, event: &RawEvent) {
        self.connection.receive(event, self.env.now());
        self.drain_inbox();
    }

    /// Drive in-flight work until nothing is left to complete. Listener
    /// events already delivered are handled; live listeners are not awaited.
    pub async fn run_until_idle(&mut self) {
        loop {
            self.drain_inbox();
            while let Some(Some(event)) = self.listeners.next().now_or_never() {
                self.on_listener_event(event);
            }
            match self.tasks.next().await {
                Some(done) => self.complete(done),
                None => break,
            }
        }
    }

    /// Event loop: handle `inbound` events, completed tasks and listener
    /// events as they arrive, until `inbound` ends.
    pub async fn run<S>(&mut self, mut inbound: S)
    where
        S: Stream<Item = RawEvent> + Unpin,
    {
        loop {
            self.drain_inbox();
            let wake = future::poll_fn(|cx| {
                if let Poll::Ready(Some(done)) = self.tasks.poll_next_unpin(cx) {
                    return Poll::Ready(Wake::Task(done));
                }
                if let Poll::Ready(Some(event)) = self.listeners.poll_next_unpin(cx) {
                    return Poll::Ready(Wake::Listener(event));
                }
                inbound.poll_next_unpin(cx).map(Wake::Inbound)
            })
            .await;

            match wake {
                Wake::Task(done) => self.complete(done),
                Wake::Listener(event) => self.on_listener_event(event),
                Wake::Inbound(Some(event)) => self.receive(&event),
                Wake::Inbound(None) => break,
            }
        }
    }

    /// Tear down: revoke listeners and handlers, abandon in-flight calls,
    /// close the surface connection.
    pub fn close(&mut self) {
        self.bridge.unsubscribe_all();
        let cancelled = self.bridge.cancel_pending();
        self.tasks = FuturesUnordered::new();
        self.listeners = SelectAll::new();
        for subscription in self.handlers.drain(..) {
            self.connection.off(subscription);
        }
        self.connection.close();
        self.call_buffer.clear();
        self.driver.hide_modal();
        tracing::info!(cancelled, "paywall closed");
    }

    fn drain_inbox(&mut self) {
        while let Ok(message) = self.inbox.try_recv() {
            self.handle(message);
        }
    }

    fn handle(&mut self, message: Message) {
        match message {
            Message::CloseModal => {
                self.driver.hide_modal();
                self.dispatch(PageEvent::CloseModal);
            },
            Message::UserInfo(info) => self.on_user_info(info),
            Message::MethodCall(call) => {
                let call = self.bridge.begin_call(call).map(Completion::Call);
                self.tasks.push(call.boxed());
            },
            Message::OnEvent(event) => {
                if let Some(listener) = self.bridge.subscribe(&event) {
                    self.listeners.push(listener);
                }
            },
            Message::OffEvent(event) => {
                if !self.bridge.unsubscribe(&event) {
                    tracing::debug!(%event, "offEvent for event without listener");
                }
            },
            Message::Enable => {
                let enable = self.bridge.begin_enable().map(Completion::Enable);
                self.tasks.push(enable.boxed());
            },
            Message::Metadata(metadata) => self.dispatch(PageEvent::Metadata(metadata)),
            Message::TransactionInfo(transaction) => self.on_transaction(transaction),
            other => tracing::debug!(kind = %other.kind(), "ignoring message"),
        }
    }

    fn on_user_info(&mut self, info: UserInfo) {
        self.user = Some(info.address.clone());
        let key = &self.settings.storage_key;
        if let Err(error) = storage::store_user(&mut *self.storage, key, &info) {
            tracing::warn!(%error, "failed to cache user info");
        }
        self.dispatch(PageEvent::Authenticated(info));
        self.check_keys_and_lock();
    }

    fn on_transaction(&mut self, transaction: TransactionInfo) {
        self.dispatch(PageEvent::TransactionSent(transaction.clone()));
        if let Some(transition) = self.tracker.on_transaction(&self.config, &transaction) {
            self.publish(transition);
        }
    }

    fn on_listener_event(&mut self, event: ListenerEvent) {
        match event {
            ListenerEvent::Fired(notification) => {
                let message = self.bridge.notification(notification);
                self.send_or_buffer(message);
            },
            ListenerEvent::Closed { event, listener } => {
                self.bridge.listener_closed(&event, listener);
            },
        }
    }

    fn complete(&mut self, done: Completion) {
        match done {
            Completion::Call(outcome) => {
                if let Some(reply) = self.bridge.complete_call(outcome) {
                    self.send_or_buffer(reply);
                }
            },
            Completion::Enable(result) => {
                let reply = self.bridge.complete_enable(result);
                self.send_or_buffer(reply);
            },
            Completion::KeyCheck { generation, unlocked } => {
                if let Some(transition) = self.tracker.finish_check(generation, unlocked) {
                    self.publish(transition);
                }
            },
        }
    }

    fn lock_page(&mut self) {
        let transition = self.tracker.lock();
        self.publish(transition);
    }

    fn publish(&mut self, transition: Transition) {
        tracing::info!(state = transition.state.as_str(), locks = ?transition.locks, "lock status");
        self.dispatch(PageEvent::from(transition));
    }

    fn dispatch(&mut self, event: PageEvent) {
        tracing::debug!(event = event.name(), "dispatching page event");
        self.driver.dispatch_event(&event);
    }

    fn send_or_buffer(&mut self, message: Message) {
        if self.connection.state() == ConnectionState::Unconnected {
            self.call_buffer.push(message);
            return;
        }
        if let Err(error) = self.connection.send(message) {
            tracing::warn!(%error, "failed to send to surface");
        }
    }
}

#[cfg(test)]
mod tests {
    use std::sync::Mutex;

    use async_trait::async_trait;
    use paywall_core::{
        env::SystemEnv,
        error::{ChainQueryError, TransportError},
        keys::KeyRecord,
        transport::Transport,
    };
    use paywall_proto::{MethodCall, NetworkConfig};
    use serde_json::{Value, json};

    use super::*;
    use crate::storage::MemoryStorage;

    const APP: &str = "https://app.unlock-protocol.com";

    #[derive(Clone, Default)]
    struct Outbox(Arc<Mutex<Vec<String>>>);

    impl Outbox {
        fn messages(&self) -> Vec<Message> {
            let posted = self.0.lock().unwrap();
            posted.iter().map(|data| Message::decode(data.as_bytes()).unwrap()).collect()
        }
    }

    impl Transport for Outbox {
        fn post(&mut self, data: String, _target_origin: &str) -> Result<(), TransportError> {
            self.0.lock().unwrap().push(data);
            Ok(())
        }
    }

    #[derive(Default)]
    struct FakeDriver {
        outbox: Outbox,
        opened: Vec<String>,
        visible: bool,
        events: Vec<PageEvent>,
    }

    impl Driver for FakeDriver {
        type Transport = Outbox;
        type Error = TransportError;

        fn open_surface(&mut self, url: &str) -> Result<Outbox, TransportError> {
            self.opened.push(url.to_string());
            Ok(self.outbox.clone())
        }

        fn show_modal(&mut self) {
            self.visible = true;
        }

        fn hide_modal(&mut self) {
            self.visible = false;
        }

        fn dispatch_event(&mut self, event: &PageEvent) {
            self.events.push(event.clone());
        }
    }

    struct ValidKeys;

    #[async_trait]
    impl ChainQuery for ValidKeys {
        async fn key_for(
            &self,
            lock: &str,
            owner: &str,
            _network: u64,
            _config: &NetworkConfig,
        ) -> Result<KeyRecord, ChainQueryError> {
            Ok(KeyRecord {
                lock: lock.to_string(),
                owner: owner.to_string(),
                expiration: u64::MAX,
                transactions: Vec::new(),
            })
        }
    }

    struct Accounts;

    #[async_trait]
    impl Capability for Accounts {
        async fn request(&self, call: &MethodCall) -> Result<Value, CapabilityError> {
            assert_eq!(call.method, "eth_accounts");
            Ok(json!(["0xUser"]))
        }
    }

    fn paywall(storage: MemoryStorage) -> Paywall<FakeDriver, SystemEnv> {
        let networks = NetworkConfigs::from([(4, NetworkConfig::new("https://rpc.test", APP))]);
        Paywall::new(
            PaywallConfig::default().with_lock("0xLock1", 4),
            networks,
            Collaborators {
                driver: FakeDriver::default(),
                env: SystemEnv,
                chain: Arc::new(ValidKeys),
                storage: Box::new(storage),
                capability: Some(Arc::new(Accounts)),
            },
            PaywallSettings::default(),
        )
    }

    fn surface(message: &Message) -> RawEvent {
        RawEvent::new(APP, message.encode().unwrap())
    }

    #[test]
    fn starts_locked_without_cached_user() {
        let paywall = paywall(MemoryStorage::default());
        assert_eq!(paywall.get_state(), LockStatus::Locked);
        assert_eq!(paywall.get_user_account_address(), None);
        assert_eq!(
            paywall.driver().events,
            vec![PageEvent::Status { state: LockStatus::Locked, locks: None }]
        );
    }

    #[test]
    fn config_sent_before_surface_is_delivered_after_handshake() {
        let mut paywall = paywall(MemoryStorage::default());
        paywall.load_checkout_modal(None, None).unwrap();

        assert_eq!(paywall.driver().opened, vec![format!("{APP}/checkout")]);
        assert!(paywall.driver().visible);
        assert_eq!(paywall.connection_state(), ConnectionState::Connecting);
        assert!(paywall.driver().outbox.messages().is_empty());

        paywall.receive(&surface(&Message::Handshake));
        assert_eq!(paywall.connection_state(), ConnectionState::Ready);
        let sent = paywall.driver().outbox.messages();
        assert_eq!(sent.len(), 1);
        assert!(matches!(
            &sent[0],
            Message::SetConfig(config) if config.use_delegated_provider == Some(true)
        ));
    }

    #[test]
    fn invalid_config_does_not_open_surface() {
        let mut paywall = paywall(MemoryStorage::default());
        let result = paywall.load_checkout_modal(Some(PaywallConfig::default()), None);
        assert!(matches!(result, Err(PaywallError::Configuration(_))));
        assert!(paywall.driver().opened.is_empty());
        assert!(!paywall.driver().visible);
    }

    #[tokio::test]
    async fn user_info_with_valid_key_unlocks() {
        let cache = MemoryStorage::default();
        let mut paywall = paywall(cache.clone());
        paywall.shake_hands(None).unwrap();

        let user = UserInfo { address: "0xUser".into() };
        paywall.receive(&surface(&Message::UserInfo(user.clone())));
        assert_eq!(paywall.get_state(), LockStatus::Unknown);

        paywall.run_until_idle().await;
        assert_eq!(paywall.get_state(), LockStatus::Unlocked);
        assert_eq!(paywall.get_user_account_address(), Some("0xUser"));
        assert!(paywall.driver().events.contains(&PageEvent::Authenticated(user.clone())));
        assert_eq!(
            paywall.driver().events.last(),
            Some(&PageEvent::Status {
                state: LockStatus::Unlocked,
                locks: Some(vec!["0xLock1".to_string()]),
            })
        );
        assert_eq!(
            storage::load_user(&cache, &PaywallSettings::default().storage_key).unwrap(),
            Some(user)
        );
    }

    #[tokio::test]
    async fn cached_user_triggers_key_check() {
        let storage = MemoryStorage::with_entries([(
            PaywallSettings::default().storage_key,
            r#"{"address":"0xUser"}"#.to_string(),
        )]);
        let mut paywall = paywall(storage);
        assert_eq!(paywall.get_state(), LockStatus::Unknown);
        assert_eq!(paywall.get_user_account_address(), Some("0xUser"));

        paywall.run_until_idle().await;
        assert_eq!(paywall.get_state(), LockStatus::Unlocked);
    }

    #[tokio::test]
    async fn method_call_is_resolved_after_handshake() {
        let mut paywall = paywall(MemoryStorage::default());
        paywall.shake_hands(None).unwrap();
        paywall.receive(&surface(&Message::Handshake));

        let call = MethodCall::new("eth_accounts", None, Some(1));
        paywall.receive(&surface(&Message::MethodCall(call)));
        assert_eq!(paywall.pending_calls(), 1);

        paywall.run_until_idle().await;
        assert_eq!(paywall.pending_calls(), 0);
        let sent = paywall.driver().outbox.messages();
        assert_eq!(sent.len(), 1);
        match &sent[0] {
            Message::ResolveMethodCall(result) => {
                assert_eq!(result.id(), Some(1));
                assert_eq!(result.response().map(|r| &r.result), Some(&json!(["0xUser"])));
            },
            other => panic!("expected resolveMethodCall, got {other:?}"),
        }
    }

    #[test]
    fn close_modal_hides_and_dispatches() {
        let mut paywall = paywall(MemoryStorage::default());
        paywall.load_checkout_modal(None, None).unwrap();
        paywall.receive(&surface(&Message::CloseModal));

        assert!(!paywall.driver().visible);
        assert_eq!(paywall.driver().events.last(), Some(&PageEvent::CloseModal));
    }

    #[test]
    fn close_tears_down_connection() {
        let mut paywall = paywall(MemoryStorage::default());
        paywall.load_checkout_modal(None, None).unwrap();
        paywall.receive(&surface(&Message::Handshake));
        paywall.close();

        assert_eq!(paywall.connection_state(), ConnectionState::Unconnected);
        assert!(!paywall.driver().visible);

        // A later surface message has nowhere to go.
        paywall.receive(&surface(&Message::CloseModal));
        assert_ne!(paywall.driver().events.last(), Some(&PageEvent::CloseModal));
    }
}
