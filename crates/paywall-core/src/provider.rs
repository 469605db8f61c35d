//! Forwarding of surface method calls and events to the host capability.
//!
//! The embedded surface has no wallet of its own. It sends EIP-1193 style
//! method calls over the channel; the host forwards them to whatever signing
//! or query capability it was given and answers with exactly one
//! `resolveMethodCall` per call.
//!
//! # Protocol Flow
//!
//! ```text
//! Surface                     ProviderBridge                   Capability
//!    │  methodCall {id}              │                              │
//!    │──────────────────────────────>│ begin_call ─── request ─────>│
//!    │                               │   (pending: CallId)          │
//!    │                               │<──────────── result ─────────│
//!    │  resolveMethodCall {id, ..}   │ complete_call                │
//!    │<──────────────────────────────│   (pending consumed)         │
//! ```
//!
//! Payload validation happens at decode: a malformed call never becomes a
//! [`MethodCall`], so it never reaches the bridge and is never answered.
//!
//! # Enabling
//!
//! The first call forwarded to a capability enables it first. A refused
//! enable answers that call with the refusal. An explicit `enable` that
//! succeeds counts too. Replacing the capability starts over.
//!
//! # Timeouts
//!
//! A forwarded call is bounded by [`BridgeConfig::call_timeout`]. When the
//! capability does not answer in time the call completes with
//! [`CapabilityError::Timeout`], which still yields one response.
//!
//! # Event listeners
//!
//! `onEvent` subscriptions are held per event name. Subscribing twice to the
//! same event keeps the first listener. Listeners end when revoked with
//! [`ProviderBridge::unsubscribe`], when the capability is replaced, or when
//! the capability's stream ends.

use std::{
    collections::HashMap,
    fmt,
    sync::{
        Arc,
        atomic::{AtomicBool, Ordering},
    },
    time::{Duration, Instant},
};

use async_trait::async_trait;
use futures::{
    channel::oneshot,
    future::{self, BoxFuture, Either, FutureExt},
    stream::{self, AbortHandle, BoxStream, StreamExt},
};
use paywall_proto::{
    EnableResult, EventNotification, Message, MethodCall, MethodCallResult, ProviderInfo,
    RequestId,
};
use serde_json::Value;

use crate::{env::Environment, error::CapabilityError};

/// Request-style signing/query capability supplied by the host.
#[async_trait]
pub trait Capability: Send + Sync {
    /// Descriptor injected into the paywall config.
    fn info(&self) -> ProviderInfo {
        ProviderInfo::default()
    }

    /// Ask the user to connect; returns the exposed accounts.
    async fn enable(&self) -> Result<Vec<String>, CapabilityError> {
        Ok(Vec::new())
    }

    /// Execute one method call.
    async fn request(&self, call: &MethodCall) -> Result<Value, CapabilityError>;

    /// Stream of payloads for a named event.
    fn subscribe(&self, event: &str) -> Result<BoxStream<'static, Value>, CapabilityError> {
        Err(CapabilityError::Unsupported(event.to_string()))
    }
}

/// Completion callback handed to a [`SendAsync`] capability.
pub type Callback = Box<dyn FnOnce(Result<Value, CapabilityError>) + Send>;

/// Callback-style capability (`sendAsync(payload, callback)`).
pub trait SendAsync: Send + Sync {
    /// Execute `call` and invoke `callback` once with the outcome.
    fn send_async(&self, call: &MethodCall, callback: Callback);

    /// Descriptor injected into the paywall config.
    fn info(&self) -> ProviderInfo {
        ProviderInfo::default()
    }
}

/// Adapts a [`SendAsync`] capability to [`Capability`].
///
/// A callback dropped without being invoked completes the call with
/// [`CapabilityError::Dropped`].
#[derive(Debug)]
pub struct CallbackCapability<S>(pub S);

#[async_trait]
impl<S: SendAsync> Capability for CallbackCapability<S> {
    fn info(&self) -> ProviderInfo {
        self.0.info()
    }

    async fn request(&self, call: &MethodCall) -> Result<Value, CapabilityError> {
        let (tx, rx) = oneshot::channel();
        self.0.send_async(
            call,
            Box::new(move |result| {
                // Receiver gone means the call already completed.
                let _ = tx.send(result);
            }),
        );
        rx.await.unwrap_or(Err(CapabilityError::Dropped))
    }
}

/// Bridge-local identity of a forwarded call. Never reused.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct CallId(u64);

impl fmt::Display for CallId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "call-{}", self.0)
    }
}

/// An outstanding forwarded call.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PendingCall {
    /// Bridge-local identity
    pub call_id: CallId,
    /// JSON-RPC id the surface used, echoed in the response
    pub request_id: Option<RequestId>,
    /// Method name, for logs
    pub method: String,
    /// When the call was forwarded
    pub created_at: Instant,
}

/// Settled capability call, to be handed back to [`ProviderBridge::complete_call`].
#[derive(Debug)]
pub struct CallOutcome {
    /// Call this outcome belongs to
    pub call_id: CallId,
    /// Capability result
    pub result: Result<Value, CapabilityError>,
}

/// Item of a listener stream returned by [`ProviderBridge::subscribe`].
#[derive(Debug, Clone, PartialEq)]
pub enum ListenerEvent {
    /// The capability fired the event
    Fired(EventNotification),
    /// The listener ended
    Closed {
        /// Event name
        event: String,
        /// Listener identity, for [`ProviderBridge::listener_closed`]
        listener: u64,
    },
}

/// Bridge tunables.
#[derive(Debug, Clone)]
pub struct BridgeConfig {
    /// Bound on a forwarded call; `None` waits forever
    pub call_timeout: Option<Duration>,
}

impl Default for BridgeConfig {
    fn default() -> Self {
        Self { call_timeout: Some(Duration::from_secs(60)) }
    }
}

/// Forwards surface requests to the installed capability.
pub struct ProviderBridge<E> {
    capability: Option<Arc<dyn Capability>>,
    enabled: Arc<AtomicBool>,
    env: E,
    config: BridgeConfig,
    pending: HashMap<CallId, PendingCall>,
    next_call: u64,
    listeners: HashMap<String, (u64, AbortHandle)>,
    next_listener: u64,
}

impl<E: Environment> ProviderBridge<E> {
    /// Bridge with no capability installed.
    pub fn new(env: E, config: BridgeConfig) -> Self {
        Self {
            capability: None,
            enabled: Arc::new(AtomicBool::new(false)),
            env,
            config,
            pending: HashMap::new(),
            next_call: 0,
            listeners: HashMap::new(),
            next_listener: 0,
        }
    }

    /// Install or remove the capability. Live event listeners belong to the
    /// old capability and are torn down; in-flight calls run to completion.
    pub fn set_capability(&mut self, capability: Option<Arc<dyn Capability>>) {
        self.unsubscribe_all();
        self.capability = capability;
        self.enabled = Arc::new(AtomicBool::new(false));
    }

    /// The installed capability.
    pub fn capability(&self) -> Option<Arc<dyn Capability>> {
        self.capability.clone()
    }

    /// Descriptor of the installed capability.
    pub fn capability_info(&self) -> Option<ProviderInfo> {
        self.capability.as_ref().map(|capability| capability.info())
    }

    /// Outstanding calls.
    pub fn pending(&self) -> impl Iterator<Item = &PendingCall> {
        self.pending.values()
    }

    /// Events with a live listener.
    pub fn listeners(&self) -> impl Iterator<Item = &str> {
        self.listeners.keys().map(String::as_str)
    }

    /// Forward `call` and register it as pending.
    ///
    /// The returned future never fails: capability errors, a missing
    /// capability and timeouts all settle into the [`CallOutcome`].
    pub fn begin_call(&mut self, call: MethodCall) -> BoxFuture<'static, CallOutcome> {
        let call_id = CallId(self.next_call);
        self.next_call += 1;
        self.pending.insert(
            call_id,
            PendingCall {
                call_id,
                request_id: call.id,
                method: call.method.clone(),
                created_at: self.env.now(),
            },
        );
        tracing::debug!(%call_id, method = %call.method, id = ?call.id, "forwarding method call");

        let Some(capability) = self.capability.clone() else {
            let outcome = CallOutcome { call_id, result: Err(CapabilityError::Unavailable) };
            return future::ready(outcome).boxed();
        };
        let timeout = self.config.call_timeout;
        let env = self.env.clone();
        let enabled = Arc::clone(&self.enabled);

        async move {
            let request = std::pin::pin!(enable_then_request(capability, enabled, call));
            let result = match timeout {
                None => request.await,
                Some(limit) => {
                    let timer = std::pin::pin!(env.sleep(limit));
                    match future::select(request, timer).await {
                        Either::Left((result, _)) => result,
                        Either::Right(((), _)) => Err(CapabilityError::Timeout(limit)),
                    }
                },
            };
            CallOutcome { call_id, result }
        }
        .boxed()
    }

    /// Consume the pending call for `outcome` and build its response.
    ///
    /// Returns `None` if the call was already answered.
    pub fn complete_call(&mut self, outcome: CallOutcome) -> Option<Message> {
        let Some(pending) = self.pending.remove(&outcome.call_id) else {
            tracing::debug!(call_id = %outcome.call_id, "outcome for unknown call, dropping");
            return None;
        };
        let elapsed = self.env.now().saturating_duration_since(pending.created_at);

        let result = match outcome.result {
            Ok(value) => MethodCallResult::success(pending.request_id, value),
            Err(error) => {
                tracing::info!(
                    call_id = %pending.call_id,
                    method = %pending.method,
                    %error,
                    "capability call failed"
                );
                MethodCallResult::failure(pending.request_id, error.to_failure())
            },
        };
        tracing::debug!(call_id = %pending.call_id, ?elapsed, "method call resolved");
        Some(Message::ResolveMethodCall(result))
    }

    /// Forget every outstanding call. Their outcomes will be ignored.
    pub fn cancel_pending(&mut self) -> usize {
        let cancelled = self.pending.len();
        self.pending.clear();
        cancelled
    }

    /// Ask the capability to enable itself.
    pub fn begin_enable(&self) -> BoxFuture<'static, Result<Vec<String>, CapabilityError>> {
        let Some(capability) = self.capability.clone() else {
            return future::ready(Err(CapabilityError::Unavailable)).boxed();
        };
        let enabled = Arc::clone(&self.enabled);
        async move {
            let result = capability.enable().await;
            if result.is_ok() {
                enabled.store(true, Ordering::Release);
            }
            result
        }
        .boxed()
    }

    /// Build the `resolveOnEnable` answer for an enable outcome.
    pub fn complete_enable(&self, result: Result<Vec<String>, CapabilityError>) -> Message {
        let answer = match result {
            Ok(accounts) => EnableResult { accounts, error: None },
            Err(error) => EnableResult { accounts: Vec::new(), error: Some(error.to_failure()) },
        };
        Message::ResolveOnEnable(answer)
    }

    /// Start listening for `event`.
    ///
    /// Returns `None` when a listener for `event` already exists or the
    /// capability cannot provide one. The stream ends with
    /// [`ListenerEvent::Closed`].
    pub fn subscribe(&mut self, event: &str) -> Option<BoxStream<'static, ListenerEvent>> {
        if self.listeners.contains_key(event) {
            tracing::debug!(event, "already listening");
            return None;
        }
        let Some(capability) = self.capability.as_ref() else {
            tracing::warn!(event, "no capability to subscribe on");
            return None;
        };
        let source = match capability.subscribe(event) {
            Ok(source) => source,
            Err(error) => {
                tracing::warn!(event, %error, "capability refused subscription");
                return None;
            },
        };

        let listener = self.next_listener;
        self.next_listener += 1;
        let (source, handle) = stream::abortable(source);
        self.listeners.insert(event.to_string(), (listener, handle));
        tracing::debug!(event, listener, "listener registered");

        let name = event.to_string();
        let fired = source.map(move |data| {
            ListenerEvent::Fired(EventNotification { event: name.clone(), data: Some(data) })
        });
        let closed = ListenerEvent::Closed { event: event.to_string(), listener };
        Some(fired.chain(stream::once(future::ready(closed))).boxed())
    }

    /// Revoke the listener for `event`. Returns `false` if there was none.
    pub fn unsubscribe(&mut self, event: &str) -> bool {
        match self.listeners.remove(event) {
            Some((listener, handle)) => {
                handle.abort();
                tracing::debug!(event, listener, "listener revoked");
                true
            },
            None => false,
        }
    }

    /// Revoke every listener.
    pub fn unsubscribe_all(&mut self) {
        for (event, (listener, handle)) in self.listeners.drain() {
            handle.abort();
            tracing::debug!(%event, listener, "listener revoked");
        }
    }

    /// Forget a listener whose stream ended. Ignored if `event` has since
    /// been re-subscribed under a new listener.
    pub fn listener_closed(&mut self, event: &str, listener: u64) {
        if self.listeners.get(event).is_some_and(|(current, _)| *current == listener) {
            self.listeners.remove(event);
        }
    }

    /// Response for a fired event.
    pub fn notification(&self, event: EventNotification) -> Message {
        Message::ResolveOnEvent(event)
    }
}

impl<E> fmt::Debug for ProviderBridge<E> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ProviderBridge")
            .field("capability", &self.capability.is_some())
            .field("pending", &self.pending.len())
            .field("listeners", &self.listeners.len())
            .field("config", &self.config)
            .finish_non_exhaustive()
    }
}

async fn enable_then_request(
    capability: Arc<dyn Capability>,
    enabled: Arc<AtomicBool>,
    call: MethodCall,
) -> Result<Value, CapabilityError> {
    if !enabled.load(Ordering::Acquire) {
        let accounts = capability.enable().await?;
        tracing::debug!(accounts = accounts.len(), "capability enabled for first call");
        enabled.store(true, Ordering::Release);
    }
    capability.request(&call).await
}
