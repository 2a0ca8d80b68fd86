//! Push channel manager.
//!
//! Owns the single logical connection to the push transport, the
//! topic registry multiplexed over it, and the reconnect policy.

use std::collections::HashMap;
use std::fmt;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError, Weak};
use std::time::Duration;

use tokio::sync::{mpsc, watch};
use tokio::task::JoinHandle;
use tracing::{debug, info, warn};

use super::config::ChannelConfig;
use super::error::WsError;
use super::messages::PushMessage;
use super::transport::{PushTransport, TransportEvent, WireId};
use crate::types::Topic;

/// Connection lifecycle.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub enum ConnectionState {
    /// No connection.
    #[default]
    Disconnected,
    /// A connect attempt is in flight.
    Connecting,
    /// Connected.
    Connected,
}

impl fmt::Display for ConnectionState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Disconnected => write!(f, "disconnected"),
            Self::Connecting => write!(f, "connecting"),
            Self::Connected => write!(f, "connected"),
        }
    }
}

/// Bounded counter of automatic reconnect attempts.
///
/// Attempt `n` waits `n × base_delay`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ReconnectBudget {
    attempts: u32,
    max_attempts: u32,
    base_delay: Duration,
}

impl ReconnectBudget {
    /// Creates an unused budget.
    #[must_use]
    pub const fn new(base_delay: Duration, max_attempts: u32) -> Self {
        Self {
            attempts: 0,
            max_attempts,
            base_delay,
        }
    }

    /// Consumes one attempt and returns its delay, or `None` once exhausted.
    pub fn next_delay(&mut self) -> Option<Duration> {
        if self.is_exhausted() {
            return None;
        }

        self.attempts += 1;
        Some(self.base_delay.saturating_mul(self.attempts))
    }

    /// Resets the counter.
    pub fn reset(&mut self) {
        self.attempts = 0;
    }

    /// Returns the attempts consumed so far.
    #[must_use]
    pub const fn attempts(&self) -> u32 {
        self.attempts
    }

    /// Returns true when no automatic attempt remains.
    #[must_use]
    pub const fn is_exhausted(&self) -> bool {
        self.attempts >= self.max_attempts
    }
}

/// Handle to a topic registration.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct SubscriptionHandle {
    id: u64,
    topic: Topic,
}

impl SubscriptionHandle {
    /// Returns the registration id.
    #[must_use]
    pub const fn id(&self) -> u64 {
        self.id
    }

    /// Returns the subscribed topic.
    #[must_use]
    pub const fn topic(&self) -> &Topic {
        &self.topic
    }
}

/// Receives decoded messages for a topic.
pub type MessageListener = Arc<dyn Fn(PushMessage) + Send + Sync>;

/// Receives connection-state notifications.
pub type ConnectionObserver = Arc<dyn Fn(ConnectionState) + Send + Sync>;

struct Registration {
    handle: SubscriptionHandle,
    wire_id: WireId,
    listener: MessageListener,
}

struct Inner {
    state: ConnectionState,
    budget: ReconnectBudget,
    registrations: HashMap<Topic, Registration>,
    observer: Option<ConnectionObserver>,
    reconnect_task: Option<JoinHandle<()>>,
    reader_task: Option<JoinHandle<()>>,
    // Bumped on every connect and disconnect; stale tasks compare against it.
    epoch: u64,
    leases: usize,
    // Set by the first lease; an unleased manager reconnects on its own.
    leased: bool,
}

impl Inner {
    /// True once every view that leased the channel has gone.
    fn abandoned(&self) -> bool {
        self.leased && self.leases == 0
    }
}

struct Shared {
    transport: Arc<dyn PushTransport>,
    config: ChannelConfig,
    inner: Mutex<Inner>,
    state_tx: watch::Sender<ConnectionState>,
    next_handle: AtomicU64,
}

/// Manages the push connection and topic subscriptions.
///
/// Cloning is cheap; clones share the same connection.
#[derive(Clone)]
pub struct ChannelManager {
    shared: Arc<Shared>,
}

impl fmt::Debug for ChannelManager {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let inner = self.shared.lock();
        f.debug_struct("ChannelManager")
            .field("state", &inner.state)
            .field("attempts", &inner.budget.attempts())
            .field("topics", &inner.registrations.len())
            .finish()
    }
}

/// A view's claim on the channel.
///
/// When the last lease is dropped, any pending reconnect is cancelled.
#[derive(Debug)]
pub struct ChannelLease {
    shared: Weak<Shared>,
}

impl Drop for ChannelLease {
    fn drop(&mut self) {
        if let Some(shared) = self.shared.upgrade() {
            shared.release();
        }
    }
}

impl ChannelManager {
    /// Creates a manager over a transport.
    ///
    /// # Errors
    ///
    /// Returns an error if the configuration is invalid.
    pub fn new(transport: Arc<dyn PushTransport>, config: ChannelConfig) -> Result<Self, WsError> {
        config.validate()?;

        let (state_tx, _) = watch::channel(ConnectionState::Disconnected);
        let budget = ReconnectBudget::new(config.reconnect_delay, config.max_reconnect_attempts);

        Ok(Self {
            shared: Arc::new(Shared {
                transport,
                config,
                inner: Mutex::new(Inner {
                    state: ConnectionState::Disconnected,
                    budget,
                    registrations: HashMap::new(),
                    observer: None,
                    reconnect_task: None,
                    reader_task: None,
                    epoch: 0,
                    leases: 0,
                    leased: false,
                }),
                state_tx,
                next_handle: AtomicU64::new(1),
            }),
        })
    }

    /// Returns the configuration.
    #[must_use]
    pub fn config(&self) -> &ChannelConfig {
        &self.shared.config
    }

    /// Returns the current connection state.
    #[must_use]
    pub fn state(&self) -> ConnectionState {
        self.shared.lock().state
    }

    /// Returns true if connected.
    #[must_use]
    pub fn is_connected(&self) -> bool {
        self.state() == ConnectionState::Connected
    }

    /// Returns a receiver that tracks every state change.
    #[must_use]
    pub fn watch_state(&self) -> watch::Receiver<ConnectionState> {
        self.shared.state_tx.subscribe()
    }

    /// Sets the single connection observer, replacing any previous one.
    pub fn set_on_connection_change(&self, observer: impl Fn(ConnectionState) + Send + Sync + 'static) {
        self.shared.lock().observer = Some(Arc::new(observer));
    }

    /// Returns the reconnect attempts consumed since the last success.
    #[must_use]
    pub fn reconnect_attempts(&self) -> u32 {
        self.shared.lock().budget.attempts()
    }

    /// Returns true if automatic reconnection has given up.
    #[must_use]
    pub fn is_reconnect_exhausted(&self) -> bool {
        self.shared.lock().budget.is_exhausted()
    }

    /// Registers interest in the channel.
    #[must_use]
    pub fn retain(&self) -> ChannelLease {
        {
            let mut inner = self.shared.lock();
            inner.leases += 1;
            inner.leased = true;
        }
        ChannelLease {
            shared: Arc::downgrade(&self.shared),
        }
    }

    /// Connects to the push transport.
    ///
    /// Returns immediately if already connected. If another attempt is in
    /// flight, waits for it instead of opening a second connection. An
    /// explicit call cancels any pending reconnect timer and, when the
    /// reconnect budget is exhausted, starts a fresh cycle.
    ///
    /// # Errors
    ///
    /// Returns the transport error if the attempt fails. A reconnect is
    /// scheduled in that case.
    pub async fn connect(&self) -> Result<(), WsError> {
        let pending = {
            let mut inner = self.shared.lock();
            match inner.state {
                ConnectionState::Connected => {
                    debug!("push channel already connected");
                    return Ok(());
                }
                ConnectionState::Connecting => None,
                ConnectionState::Disconnected => {
                    if let Some(task) = inner.reconnect_task.take() {
                        task.abort();
                    }
                    if inner.budget.is_exhausted() {
                        info!("starting a new reconnect cycle");
                        inner.budget.reset();
                    }
                    Some(self.shared.begin_attempt(&mut inner))
                }
            }
        };

        match pending {
            Some(epoch) => self.shared.attempt(epoch).await,
            None => self.wait_for_attempt().await,
        }
    }

    async fn wait_for_attempt(&self) -> Result<(), WsError> {
        let mut state_rx = self.watch_state();
        let settled = state_rx
            .wait_for(|state| *state != ConnectionState::Connecting)
            .await
            .map(|state| *state)
            .map_err(|_| WsError::Closed)?;

        match settled {
            ConnectionState::Connected => Ok(()),
            _ => Err(WsError::Connection(
                "concurrent connect attempt failed".to_string(),
            )),
        }
    }

    /// Subscribes a listener to a topic.
    ///
    /// Returns `None` when not connected; callers fall back to polling.
    /// Subscribing to a topic that already has a registration returns the
    /// existing handle and keeps the existing listener.
    pub fn subscribe(
        &self,
        topic: Topic,
        listener: impl Fn(PushMessage) + Send + Sync + 'static,
    ) -> Option<SubscriptionHandle> {
        let mut inner = self.shared.lock();

        if inner.state != ConnectionState::Connected {
            warn!(%topic, state = %inner.state, "push channel not connected, subscription skipped");
            return None;
        }

        if let Some(existing) = inner.registrations.get(&topic) {
            debug!(%topic, "already subscribed");
            return Some(existing.handle.clone());
        }

        let wire_id = match self.shared.transport.subscribe(&topic) {
            Ok(wire_id) => wire_id,
            Err(e) => {
                warn!(%topic, error = %e, "wire subscription failed");
                return None;
            }
        };

        let handle = SubscriptionHandle {
            id: self.shared.next_handle.fetch_add(1, Ordering::Relaxed),
            topic: topic.clone(),
        };

        inner.registrations.insert(
            topic.clone(),
            Registration {
                handle: handle.clone(),
                wire_id,
                listener: Arc::new(listener),
            },
        );
        info!(%topic, "subscribed");

        Some(handle)
    }

    /// Removes a topic registration. No-op if absent.
    pub fn unsubscribe(&self, topic: &Topic) {
        let removed = self.shared.lock().registrations.remove(topic);

        if let Some(registration) = removed {
            self.shared.release_wire(&registration);
            info!(%topic, "unsubscribed");
        }
    }

    /// Removes every topic registration.
    pub fn unsubscribe_all(&self) {
        let drained: Vec<Registration> = self
            .shared
            .lock()
            .registrations
            .drain()
            .map(|(_, registration)| registration)
            .collect();

        for registration in &drained {
            self.shared.release_wire(registration);
        }

        if !drained.is_empty() {
            info!(count = drained.len(), "unsubscribed from all topics");
        }
    }

    /// Returns the handle registered for a topic.
    #[must_use]
    pub fn subscription(&self, topic: &Topic) -> Option<SubscriptionHandle> {
        self.shared
            .lock()
            .registrations
            .get(topic)
            .map(|r| r.handle.clone())
    }

    /// Returns the registered topics.
    #[must_use]
    pub fn subscriptions(&self) -> Vec<Topic> {
        self.shared.lock().registrations.keys().cloned().collect()
    }

    /// Publishes a payload through the transport.
    ///
    /// # Errors
    ///
    /// Returns `WsError::NotConnected` when not connected, or the transport
    /// error.
    pub fn send(&self, destination: &str, body: impl Into<String>) -> Result<(), WsError> {
        if self.state() != ConnectionState::Connected {
            return Err(WsError::NotConnected);
        }

        self.shared.transport.send(destination, body.into())
    }

    /// Unsubscribes everything, closes the transport and stops reconnecting.
    pub async fn disconnect(&self) {
        let (reader, reconnect) = {
            let mut inner = self.shared.lock();
            inner.epoch += 1;
            (inner.reader_task.take(), inner.reconnect_task.take())
        };

        if let Some(task) = reconnect {
            task.abort();
        }
        if let Some(task) = reader {
            task.abort();
        }

        self.unsubscribe_all();
        self.shared.transport.close().await;

        self.shared.lock().state = ConnectionState::Disconnected;
        info!("push channel disconnected");
        self.shared.notify(ConnectionState::Disconnected);
    }
}

impl Shared {
    fn lock(&self) -> MutexGuard<'_, Inner> {
        self.inner.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Publishes a state change to the watch channel and the observer.
    fn notify(&self, state: ConnectionState) {
        self.state_tx.send_replace(state);

        let observer = self.lock().observer.clone();
        if let Some(observer) = observer {
            observer(state);
        }
    }

    fn release_wire(&self, registration: &Registration) {
        if let Err(e) = self.transport.unsubscribe(&registration.wire_id) {
            debug!(topic = %registration.handle.topic, error = %e, "wire unsubscribe failed");
        }
    }

    fn release(&self) {
        let mut inner = self.lock();
        inner.leases = inner.leases.saturating_sub(1);

        if inner.leases == 0 {
            if let Some(task) = inner.reconnect_task.take() {
                task.abort();
                debug!("no views left, pending reconnect cancelled");
            }
        }
    }

    /// Claims the connection for one attempt and returns its epoch.
    ///
    /// Must run in the same critical section that saw `Disconnected`.
    fn begin_attempt(&self, inner: &mut Inner) -> u64 {
        inner.state = ConnectionState::Connecting;
        // Published under the lock so concurrent callers never see a
        // stale Disconnected while the attempt is in flight.
        self.state_tx.send_replace(ConnectionState::Connecting);
        inner.epoch
    }

    /// Runs one connect attempt claimed by [`Shared::begin_attempt`].
    async fn attempt(self: &Arc<Self>, epoch: u64) -> Result<(), WsError> {
        match self.transport.connect().await {
            Ok(events) => {
                let stale = {
                    let mut inner = self.lock();
                    if inner.epoch == epoch {
                        inner.epoch += 1;
                        inner.state = ConnectionState::Connected;
                        inner.budget.reset();
                        inner.reader_task = Some(tokio::spawn(read_events(
                            Arc::downgrade(self),
                            events,
                            inner.epoch,
                        )));
                        false
                    } else {
                        true
                    }
                };

                if stale {
                    debug!("connect finished after disconnect, closing");
                    self.transport.close().await;
                    return Err(WsError::Closed);
                }

                info!("push channel connected");
                self.notify(ConnectionState::Connected);
                Ok(())
            }
            Err(e) => {
                warn!(error = %e, "push channel connect failed");
                if self.lock().epoch == epoch {
                    self.fail();
                }
                Err(e)
            }
        }
    }

    /// Failure path shared by connect errors and dropped connections.
    fn fail(self: &Arc<Self>) {
        {
            let mut inner = self.lock();
            inner.state = ConnectionState::Disconnected;
            inner.reader_task = None;
            // Wire subscriptions die with the connection.
            inner.registrations.clear();

            if inner.abandoned() {
                debug!("no views left, not reconnecting");
                if let Some(task) = inner.reconnect_task.take() {
                    task.abort();
                }
            } else if let Some(delay) = inner.budget.next_delay() {
                info!(
                    attempt = inner.budget.attempts(),
                    ?delay,
                    "scheduling reconnect"
                );
                let task = tokio::spawn(reconnect_after(Arc::downgrade(self), delay));
                if let Some(previous) = inner.reconnect_task.replace(task) {
                    previous.abort();
                }
            } else {
                warn!(
                    attempts = inner.budget.attempts(),
                    "reconnect budget exhausted, waiting for an explicit connect"
                );
            }
        }

        self.notify(ConnectionState::Disconnected);
    }

    /// Hands a payload to the topic's listener.
    fn dispatch(&self, topic: &Topic, payload: &str) {
        let listener = match self.lock().registrations.get(topic) {
            Some(registration) => Arc::clone(&registration.listener),
            None => {
                debug!(%topic, "no listener for topic, dropping payload");
                return;
            }
        };

        match PushMessage::decode(payload) {
            Ok(msg) if msg.is_unknown() => debug!(%topic, "ignoring unknown message type"),
            Ok(msg) => listener(msg),
            Err(e) => warn!(%topic, error = %e, "dropping malformed payload"),
        }
    }

    fn connection_lost(self: &Arc<Self>, epoch: u64, reason: &str) {
        let current = {
            let inner = self.lock();
            inner.epoch == epoch && inner.state == ConnectionState::Connected
        };

        if current {
            warn!(%reason, "push channel connection lost");
            self.fail();
        }
    }
}

/// Delivers transport events for one connection.
async fn read_events(
    shared: Weak<Shared>,
    mut events: mpsc::UnboundedReceiver<TransportEvent>,
    epoch: u64,
) {
    while let Some(event) = events.recv().await {
        let Some(shared) = shared.upgrade() else {
            return;
        };

        match event {
            TransportEvent::Message { topic, payload } => shared.dispatch(&topic, &payload),
            TransportEvent::Closed { reason } => {
                shared.connection_lost(epoch, &reason);
                return;
            }
        }
    }

    if let Some(shared) = shared.upgrade() {
        shared.connection_lost(epoch, "event stream ended");
    }
}

/// Waits out a reconnect delay, then tries again.
async fn reconnect_after(shared: Weak<Shared>, delay: Duration) {
    tokio::time::sleep(delay).await;

    let Some(shared) = shared.upgrade() else {
        return;
    };

    let epoch = {
        let mut inner = shared.lock();
        // Detach: this task is now the attempt, not the pending timer.
        inner.reconnect_task = None;
        if inner.state != ConnectionState::Disconnected {
            return;
        }
        if inner.abandoned() {
            debug!("no views left, reconnect skipped");
            return;
        }
        shared.begin_attempt(&mut inner)
    };

    debug!("reconnecting");
    let _ = shared.attempt(epoch).await;
}
