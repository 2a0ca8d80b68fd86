//! Per-auction view synchronizer.
//!
//! Each view runs one task that owns its snapshot store, poll timer,
//! countdown timer, flash deadline and in-flight fetches. The task relies
//! on push delivery while the channel is connected and re-fetches on a
//! fixed interval otherwise, never both at once.

use std::fmt;
use std::sync::Arc;

use rust_decimal::Decimal;
use tokio::sync::{broadcast, mpsc, watch};
use tokio::task::{JoinError, JoinHandle, JoinSet};
use tokio::time::{interval_at, Instant, Interval, MissedTickBehavior};
use tracing::{debug, info, warn};

use super::clock::{Clock, SystemClock};
use super::config::SyncConfig;
use super::countdown::Countdown;
use super::error::{BidError, SyncError};
use super::store::SnapshotStore;
use crate::client::{AuctionApi, ClientError};
use crate::types::{AuctionId, AuctionSnapshot, BidReceipt, Topic};
use crate::ws::{ChannelLease, ChannelManager, ConnectionState, PushMessage, SubscriptionHandle};

/// How a view currently receives updates.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum SyncMode {
    /// Updates arrive over the push channel.
    Push,
    /// Updates are re-fetched on a timer.
    Poll,
}

impl fmt::Display for SyncMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Push => write!(f, "push"),
            Self::Poll => write!(f, "poll"),
        }
    }
}

/// Notifications a view publishes to its UI layer.
#[derive(Debug, Clone, PartialEq)]
pub enum ViewEvent {
    /// The snapshot changed.
    SnapshotUpdated(Arc<AuctionSnapshot>),
    /// The price just changed.
    Flash {
        /// New price.
        price: Decimal,
    },
    /// The flash expired.
    FlashCleared,
    /// The view switched between push and poll.
    ModeChanged(SyncMode),
    /// Countdown recomputed.
    Countdown(Countdown),
    /// Bidding closed.
    Closed {
        /// Final price.
        final_price: Decimal,
    },
    /// The end time passed without a closure message.
    Expired,
}

enum Command {
    Connected(bool),
    Push(PushMessage),
    Refresh,
    Shutdown,
}

enum Mode {
    Awaiting,
    Push(SubscriptionHandle),
    Poll(Interval),
}

/// Handle to a running view.
///
/// Dropping the handle stops the view without waiting; prefer
/// [`teardown`](Self::teardown).
pub struct ViewSynchronizer {
    id: AuctionId,
    channel: ChannelManager,
    api: Arc<dyn AuctionApi>,
    commands: mpsc::UnboundedSender<Command>,
    snapshot: watch::Receiver<Arc<AuctionSnapshot>>,
    countdown: watch::Receiver<Countdown>,
    mode: watch::Receiver<Option<SyncMode>>,
    flashing: watch::Receiver<bool>,
    events: broadcast::Sender<ViewEvent>,
    task: Option<JoinHandle<()>>,
}

impl fmt::Debug for ViewSynchronizer {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ViewSynchronizer")
            .field("id", &self.id)
            .field("mode", &*self.mode.borrow())
            .field("running", &self.task.is_some())
            .finish_non_exhaustive()
    }
}

impl ViewSynchronizer {
    /// Loads the auction and starts synchronizing it.
    ///
    /// # Errors
    ///
    /// Returns `SyncError::NotFound` or `SyncError::Unavailable` if the
    /// initial fetch fails. The view is not started in that case.
    pub async fn start(
        id: AuctionId,
        channel: ChannelManager,
        api: Arc<dyn AuctionApi>,
        config: SyncConfig,
    ) -> Result<Self, SyncError> {
        Self::start_with_clock(id, channel, api, config, Arc::new(SystemClock)).await
    }

    /// Like [`start`](Self::start) with an explicit wall clock.
    ///
    /// # Errors
    ///
    /// See [`start`](Self::start).
    pub async fn start_with_clock(
        id: AuctionId,
        channel: ChannelManager,
        api: Arc<dyn AuctionApi>,
        config: SyncConfig,
        clock: Arc<dyn Clock>,
    ) -> Result<Self, SyncError> {
        config.validate()?;

        let snapshot = api
            .fetch_auction(&id)
            .await
            .map_err(|e| SyncError::from_fetch(&id, e))?;
        info!(auction = %id, title = %snapshot.title(), price = %snapshot.current_price, "auction loaded");

        let store = SnapshotStore::new(snapshot);
        let initial = Countdown::derive(store.current().end_time, clock.now());

        let (commands_tx, commands_rx) = mpsc::unbounded_channel();
        let (countdown_tx, countdown_rx) = watch::channel(initial);
        let (mode_tx, mode_rx) = watch::channel(None);
        let (flash_tx, flash_rx) = watch::channel(false);
        let (events, _) = broadcast::channel(config.event_capacity);

        let mut countdown_timer = interval_at(
            Instant::now() + config.countdown_interval,
            config.countdown_interval,
        );
        countdown_timer.set_missed_tick_behavior(MissedTickBehavior::Skip);

        let snapshot_rx = store.subscribe();
        let task = SyncTask {
            id: id.clone(),
            topic: Topic::auction(&id),
            channel: channel.clone(),
            api: Arc::clone(&api),
            clock,
            config,
            store,
            mode: Mode::Awaiting,
            countdown_timer: Some(countdown_timer),
            fetches: JoinSet::new(),
            flash_until: None,
            commands: commands_rx,
            inbox: commands_tx.clone(),
            state_rx: channel.watch_state(),
            events: events.clone(),
            countdown_tx,
            mode_tx,
            flash_tx,
            _lease: channel.retain(),
        };

        Ok(Self {
            id,
            channel,
            api,
            commands: commands_tx,
            snapshot: snapshot_rx,
            countdown: countdown_rx,
            mode: mode_rx,
            flashing: flash_rx,
            events,
            task: Some(tokio::spawn(task.run())),
        })
    }

    /// Returns the auction id.
    #[must_use]
    pub fn id(&self) -> &AuctionId {
        &self.id
    }

    /// Returns the current snapshot.
    #[must_use]
    pub fn snapshot(&self) -> Arc<AuctionSnapshot> {
        Arc::clone(&self.snapshot.borrow())
    }

    /// Returns a receiver that observes every snapshot update.
    #[must_use]
    pub fn watch_snapshot(&self) -> watch::Receiver<Arc<AuctionSnapshot>> {
        self.snapshot.clone()
    }

    /// Returns the latest countdown.
    #[must_use]
    pub fn countdown(&self) -> Countdown {
        *self.countdown.borrow()
    }

    /// Returns the shared push channel.
    #[must_use]
    pub fn channel(&self) -> &ChannelManager {
        &self.channel
    }

    /// Returns the current mode, or `None` before the first connect outcome.
    #[must_use]
    pub fn sync_mode(&self) -> Option<SyncMode> {
        *self.mode.borrow()
    }

    /// Returns true while a price flash is showing.
    #[must_use]
    pub fn is_flashing(&self) -> bool {
        *self.flashing.borrow()
    }

    /// Subscribes to view events.
    #[must_use]
    pub fn events(&self) -> broadcast::Receiver<ViewEvent> {
        self.events.subscribe()
    }

    /// Places a bid.
    ///
    /// The amount must be positive and strictly above the current price, and
    /// the auction must still be active; otherwise the bid is rejected
    /// without a network call. An accepted bid is reflected by the push echo
    /// in push mode, or by an immediate re-fetch otherwise.
    ///
    /// # Errors
    ///
    /// Returns a local validation error or `BidError::Rejected` with the
    /// server's answer. Sync state is unaffected by a rejection.
    pub async fn place_bid(&self, amount: Decimal) -> Result<BidReceipt, BidError> {
        let current = self.snapshot();

        if amount <= Decimal::ZERO {
            return Err(BidError::InvalidAmount(amount.to_string()));
        }

        if !current.active {
            return Err(BidError::Closed);
        }

        if amount <= current.current_price {
            return Err(BidError::TooLow {
                current: current.current_price,
                amount,
            });
        }

        let receipt = self.api.place_bid(&self.id, amount).await?;
        info!(auction = %self.id, amount = %receipt.amount, "bid accepted");

        // The echo only arrives if this view holds the subscription.
        if self.sync_mode() != Some(SyncMode::Push)
            && self.commands.send(Command::Refresh).is_err()
        {
            debug!(auction = %self.id, "view stopped, skipping refresh");
        }

        Ok(receipt)
    }

    /// Stops the view and waits for its task to finish.
    ///
    /// Releases the subscription and stops every timer and fetch.
    pub async fn teardown(mut self) {
        let Some(task) = self.task.take() else {
            return;
        };

        let _ = self.commands.send(Command::Shutdown);

        if let Err(e) = task.await {
            if e.is_panic() {
                warn!(auction = %self.id, error = %e, "view task panicked");
            }
        }
    }
}

impl Drop for ViewSynchronizer {
    fn drop(&mut self) {
        if let Some(task) = self.task.take() {
            task.abort();
        }
    }
}

/// The view's event loop.
struct SyncTask {
    id: AuctionId,
    topic: Topic,
    channel: ChannelManager,
    api: Arc<dyn AuctionApi>,
    clock: Arc<dyn Clock>,
    config: SyncConfig,
    store: SnapshotStore,
    mode: Mode,
    countdown_timer: Option<Interval>,
    fetches: JoinSet<Result<AuctionSnapshot, ClientError>>,
    flash_until: Option<Instant>,
    commands: mpsc::UnboundedReceiver<Command>,
    inbox: mpsc::UnboundedSender<Command>,
    state_rx: watch::Receiver<ConnectionState>,
    events: broadcast::Sender<ViewEvent>,
    countdown_tx: watch::Sender<Countdown>,
    mode_tx: watch::Sender<Option<SyncMode>>,
    flash_tx: watch::Sender<bool>,
    _lease: ChannelLease,
}

impl SyncTask {
    async fn run(mut self) {
        self.spawn_connect();

        loop {
            tokio::select! {
                command = self.commands.recv() => match command {
                    Some(Command::Shutdown) | None => break,
                    Some(command) => self.handle(command),
                },
                changed = self.state_rx.changed() => {
                    if changed.is_err() {
                        break;
                    }
                    if !matches!(self.mode, Mode::Awaiting) {
                        self.reconcile();
                    }
                }
                () = poll_tick(&mut self.mode) => self.spawn_fetch(),
                () = countdown_tick(&mut self.countdown_timer) => self.tick_countdown(),
                Some(joined) = self.fetches.join_next(), if !self.fetches.is_empty() => {
                    self.apply_fetch(joined);
                }
                () = flash_expiry(self.flash_until) => self.clear_flash(),
            }
        }

        self.shutdown();
    }

    fn handle(&mut self, command: Command) {
        match command {
            Command::Connected(ok) => {
                debug!(auction = %self.id, connected = ok, "connect outcome");
                self.reconcile();
            }
            Command::Push(msg) => self.apply_push(msg),
            Command::Refresh => self.spawn_fetch(),
            Command::Shutdown => {}
        }
    }

    /// Starts the initial connect without blocking the loop.
    fn spawn_connect(&self) {
        let channel = self.channel.clone();
        let inbox = self.inbox.clone();
        let id = self.id.clone();

        tokio::spawn(async move {
            let outcome = channel.connect().await;
            if let Err(e) = &outcome {
                warn!(auction = %id, error = %e, "push unavailable, falling back to polling");
            }
            let _ = inbox.send(Command::Connected(outcome.is_ok()));
        });
    }

    /// Picks the mode that matches the connection state.
    fn reconcile(&mut self) {
        let connected = self.channel.state() == ConnectionState::Connected;

        let next = match (&self.mode, connected) {
            // A drop and reconnect between two observations clears the
            // registry without a visible Disconnected.
            (Mode::Push(handle), true) => (self.channel.subscription(&self.topic).as_ref()
                != Some(handle))
            .then_some(SyncMode::Push),
            (Mode::Poll(_), false) => None,
            (_, true) => Some(SyncMode::Push),
            (_, false) => Some(SyncMode::Poll),
        };

        match next {
            Some(SyncMode::Push) => self.enter_push(),
            Some(SyncMode::Poll) => self.enter_poll(),
            None => {}
        }
    }

    fn enter_push(&mut self) {
        // The poll timer and its fetches stop before the subscription exists.
        self.mode = Mode::Awaiting;
        self.fetches = JoinSet::new();

        let inbox = self.inbox.clone();
        let handle = self.channel.subscribe(self.topic.clone(), move |msg| {
            let _ = inbox.send(Command::Push(msg));
        });

        match handle {
            Some(handle) => {
                self.mode = Mode::Push(handle);
                self.set_mode(SyncMode::Push);
            }
            None => self.enter_poll(),
        }
    }

    fn enter_poll(&mut self) {
        self.release_subscription();

        let interval = self.config.poll_interval;
        let mut timer = interval_at(Instant::now() + interval, interval);
        timer.set_missed_tick_behavior(MissedTickBehavior::Delay);
        self.mode = Mode::Poll(timer);
        self.set_mode(SyncMode::Poll);
    }

    fn set_mode(&self, mode: SyncMode) {
        let changed = self.mode_tx.send_if_modified(|current| {
            if *current == Some(mode) {
                false
            } else {
                *current = Some(mode);
                true
            }
        });

        if changed {
            info!(auction = %self.id, %mode, "sync mode changed");
            self.emit(ViewEvent::ModeChanged(mode));
        }
    }

    /// Drops the topic subscription if this view still owns it.
    fn release_subscription(&mut self) {
        if let Mode::Push(handle) = std::mem::replace(&mut self.mode, Mode::Awaiting) {
            if self.channel.subscription(&self.topic).as_ref() == Some(&handle) {
                self.channel.unsubscribe(&self.topic);
            }
        }
    }

    fn apply_push(&mut self, msg: PushMessage) {
        if !matches!(self.mode, Mode::Push(_)) {
            debug!(auction = %self.id, "not in push mode, dropping message");
            return;
        }

        match msg {
            PushMessage::PriceUpdate {
                current_price,
                auction_id,
                ..
            } => {
                if auction_id.is_some_and(|other| other != self.id) {
                    return;
                }
                if self.store.apply_price(current_price) {
                    debug!(auction = %self.id, price = %current_price, "price pushed");
                    self.emit(ViewEvent::SnapshotUpdated(self.store.current()));
                    self.flash(current_price);
                }
            }
            PushMessage::Closed {
                final_price,
                auction_id,
                ..
            } => {
                if auction_id.is_some_and(|other| other != self.id) {
                    return;
                }
                if self.store.close(final_price) {
                    info!(auction = %self.id, %final_price, "auction closed");
                    self.emit(ViewEvent::SnapshotUpdated(self.store.current()));
                    self.emit(ViewEvent::Closed { final_price });
                }
            }
            PushMessage::AuctionCreated { .. } | PushMessage::Unknown => {}
        }
    }

    fn spawn_fetch(&mut self) {
        let api = Arc::clone(&self.api);
        let id = self.id.clone();
        self.fetches.spawn(async move { api.fetch_auction(&id).await });
    }

    fn apply_fetch(&mut self, joined: Result<Result<AuctionSnapshot, ClientError>, JoinError>) {
        let snapshot = match joined {
            Ok(Ok(snapshot)) => snapshot,
            Ok(Err(e)) => {
                warn!(auction = %self.id, error = %e, "poll failed, keeping previous snapshot");
                return;
            }
            Err(e) => {
                debug!(auction = %self.id, error = %e, "fetch task ended early");
                return;
            }
        };

        let was_closed = self.store.is_closed();
        let price_changed = self.store.replace(snapshot);
        let current = self.store.current();
        self.emit(ViewEvent::SnapshotUpdated(Arc::clone(&current)));

        if was_closed {
            return;
        }

        if price_changed {
            self.flash(current.current_price);
        }

        if self.store.is_closed() {
            info!(auction = %self.id, final_price = %current.current_price, "auction closed");
            self.emit(ViewEvent::Closed {
                final_price: current.current_price,
            });
        }
    }

    fn tick_countdown(&mut self) {
        let countdown = Countdown::derive(self.store.current().end_time, self.clock.now());
        self.countdown_tx.send_replace(countdown);
        self.emit(ViewEvent::Countdown(countdown));

        if !countdown.is_ended() {
            return;
        }

        self.countdown_timer = None;
        if self.store.expire() {
            info!(auction = %self.id, "auction expired");
            self.emit(ViewEvent::SnapshotUpdated(self.store.current()));
            self.emit(ViewEvent::Expired);
        }
    }

    fn flash(&mut self, price: Decimal) {
        self.flash_until = Some(Instant::now() + self.config.flash_duration);
        self.flash_tx.send_replace(true);
        self.emit(ViewEvent::Flash { price });
    }

    fn clear_flash(&mut self) {
        self.flash_until = None;
        self.flash_tx.send_replace(false);
        self.emit(ViewEvent::FlashCleared);
    }

    fn emit(&self, event: ViewEvent) {
        let _ = self.events.send(event);
    }

    fn shutdown(&mut self) {
        self.release_subscription();
        self.countdown_timer = None;
        self.fetches = JoinSet::new();
        self.flash_until = None;
        info!(auction = %self.id, "view stopped");
    }
}

impl Drop for SyncTask {
    fn drop(&mut self) {
        self.release_subscription();
    }
}

async fn poll_tick(mode: &mut Mode) {
    match mode {
        Mode::Poll(timer) => {
            timer.tick().await;
        }
        _ => std::future::pending().await,
    }
}

async fn countdown_tick(timer: &mut Option<Interval>) {
    match timer {
        Some(timer) => {
            timer.tick().await;
        }
        None => std::future::pending().await,
    }
}

async fn flash_expiry(deadline: Option<Instant>) {
    match deadline {
        Some(deadline) => tokio::time::sleep_until(deadline).await,
        None => std::future::pending().await,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::sync::RuntimeClock;
    use crate::testing::{MockApi, MockTransport};
    use crate::ws::ChannelConfig;
    use chrono::Utc;
    use rust_decimal_macros::dec;
    use std::time::Duration;
    use tokio::sync::broadcast::error::TryRecvError;

    const AUCTION: u64 = 7;

    fn channel(transport: &MockTransport) -> ChannelManager {
        ChannelManager::new(Arc::new(transport.clone()), ChannelConfig::default()).expect("channel")
    }

    async fn start(transport: &MockTransport, api: &MockApi) -> ViewSynchronizer {
        ViewSynchronizer::start_with_clock(
            AuctionId::from(AUCTION),
            channel(transport),
            Arc::new(api.clone()),
            SyncConfig::default(),
            Arc::new(RuntimeClock::new()),
        )
        .await
        .expect("view")
    }

    fn topic() -> Topic {
        Topic::auction(&AuctionId::from(AUCTION))
    }

    async fn settle() {
        tokio::time::sleep(Duration::from_millis(1)).await;
    }

    fn drain(rx: &mut broadcast::Receiver<ViewEvent>) -> Vec<ViewEvent> {
        let mut events = Vec::new();
        while let Ok(event) = rx.try_recv() {
            events.push(event);
        }
        events
    }

    fn flashes(events: &[ViewEvent]) -> usize {
        events
            .iter()
            .filter(|e| matches!(e, ViewEvent::Flash { .. }))
            .count()
    }

    #[tokio::test(start_paused = true)]
    async fn test_start_not_found() {
        let transport = MockTransport::new();
        let api = MockApi::new(None);

        let result = ViewSynchronizer::start(
            AuctionId::from(AUCTION),
            channel(&transport),
            Arc::new(api),
            SyncConfig::default(),
        )
        .await;

        assert!(matches!(result, Err(SyncError::NotFound(_))));
        assert_eq!(transport.connect_attempts(), 0);
    }

    #[tokio::test(start_paused = true)]
    async fn test_start_unavailable() {
        let transport = MockTransport::new();
        let api = MockApi::live(AUCTION, dec!(100));
        api.set_unavailable(true);

        let result = ViewSynchronizer::start(
            AuctionId::from(AUCTION),
            channel(&transport),
            Arc::new(api),
            SyncConfig::default(),
        )
        .await;

        assert!(matches!(result, Err(SyncError::Unavailable { .. })));
    }

    #[tokio::test(start_paused = true)]
    async fn test_no_mode_before_connect_outcome() {
        let transport = MockTransport::new();
        transport.set_connect_latency(Duration::from_millis(500));
        let api = MockApi::live(AUCTION, dec!(100));

        let view = start(&transport, &api).await;
        settle().await;
        assert_eq!(view.sync_mode(), None);

        tokio::time::sleep(Duration::from_millis(600)).await;
        assert_eq!(view.sync_mode(), Some(SyncMode::Push));
    }

    #[tokio::test(start_paused = true)]
    async fn test_push_price_update_flashes_once() {
        let transport = MockTransport::new();
        let api = MockApi::new(Some(
            AuctionSnapshot::new(AuctionId::from(AUCTION), dec!(100), dec!(80), true)
                .with_end_time(Utc::now() + chrono::Duration::seconds(3_600)),
        ));

        let view = start(&transport, &api).await;
        let mut events = view.events();
        settle().await;

        assert_eq!(view.sync_mode(), Some(SyncMode::Push));
        assert_eq!(transport.wire_subscriptions(), 1);

        transport.deliver(&topic(), r#"{"type":"PRICE_UPDATE","currentPrice":120}"#);
        settle().await;

        assert_eq!(view.snapshot().current_price, dec!(120));
        assert!(view.is_flashing());
        let seen = drain(&mut events);
        assert_eq!(flashes(&seen), 1);
        assert!(seen.contains(&ViewEvent::Flash { price: dec!(120) }));

        tokio::time::sleep(Duration::from_millis(2_100)).await;
        assert!(!view.is_flashing());
        assert!(drain(&mut events).contains(&ViewEvent::FlashCleared));
        assert_eq!(api.fetches(), 1);

        view.teardown().await;
    }

    #[tokio::test(start_paused = true)]
    async fn test_push_same_price_does_not_flash() {
        let transport = MockTransport::new();
        let api = MockApi::live(AUCTION, dec!(100));

        let view = start(&transport, &api).await;
        let mut events = view.events();
        settle().await;

        transport.deliver(&topic(), r#"{"type":"BID_PLACED","currentPrice":100}"#);
        settle().await;

        assert_eq!(flashes(&drain(&mut events)), 0);
    }

    #[tokio::test(start_paused = true)]
    async fn test_push_for_other_auction_ignored() {
        let transport = MockTransport::new();
        let api = MockApi::live(AUCTION, dec!(100));

        let view = start(&transport, &api).await;
        settle().await;

        transport.deliver(
            &topic(),
            r#"{"type":"PRICE_UPDATE","currentPrice":500,"auctionId":8}"#,
        );
        settle().await;

        assert_eq!(view.snapshot().current_price, dec!(100));
    }

    #[tokio::test(start_paused = true)]
    async fn test_closed_is_terminal() {
        let transport = MockTransport::new();
        let api = MockApi::live(AUCTION, dec!(100));

        let view = start(&transport, &api).await;
        let mut events = view.events();
        settle().await;

        transport.deliver(&topic(), r#"{"type":"CLOSED","finalPrice":130}"#);
        transport.deliver(&topic(), r#"{"type":"PRICE_UPDATE","currentPrice":200}"#);
        transport.deliver(&topic(), r#"{"type":"AUCTION_CLOSED","finalPrice":140}"#);
        settle().await;

        let snapshot = view.snapshot();
        assert!(!snapshot.active);
        assert_eq!(snapshot.current_price, dec!(130));

        let seen = drain(&mut events);
        let closed: Vec<_> = seen
            .iter()
            .filter(|e| matches!(e, ViewEvent::Closed { .. }))
            .collect();
        assert_eq!(closed, vec![&ViewEvent::Closed { final_price: dec!(130) }]);
        assert_eq!(flashes(&seen), 0);

        assert!(matches!(view.place_bid(dec!(500)).await, Err(BidError::Closed)));
        assert!(api.bids().is_empty());
    }

    #[tokio::test(start_paused = true)]
    async fn test_connect_failure_falls_back_to_polling() {
        let transport = MockTransport::new();
        transport.fail_next_connects(usize::MAX);
        let api = MockApi::live(AUCTION, dec!(100));

        let view = start(&transport, &api).await;
        let mut events = view.events();
        settle().await;

        assert_eq!(view.sync_mode(), Some(SyncMode::Poll));
        assert!(view.channel.subscription(&topic()).is_none());

        api.set_price(dec!(150));
        tokio::time::sleep(Duration::from_millis(3_000)).await;
        assert_eq!(view.snapshot().current_price, dec!(150));
        assert_eq!(flashes(&drain(&mut events)), 1);

        tokio::time::sleep(Duration::from_millis(3_000)).await;
        assert_eq!(api.fetches(), 3);
        assert_eq!(flashes(&drain(&mut events)), 0);

        view.teardown().await;
    }

    #[tokio::test(start_paused = true)]
    async fn test_poll_failure_keeps_snapshot() {
        let transport = MockTransport::new();
        transport.fail_next_connects(usize::MAX);
        let api = MockApi::live(AUCTION, dec!(100));

        let view = start(&transport, &api).await;
        settle().await;

        api.set_unavailable(true);
        tokio::time::sleep(Duration::from_millis(3_100)).await;

        assert_eq!(api.fetches(), 2);
        assert_eq!(view.snapshot().current_price, dec!(100));
        assert_eq!(view.sync_mode(), Some(SyncMode::Poll));
    }

    #[tokio::test(start_paused = true)]
    async fn test_poll_sees_server_closure() {
        let transport = MockTransport::new();
        transport.fail_next_connects(usize::MAX);
        let api = MockApi::live(AUCTION, dec!(100));

        let view = start(&transport, &api).await;
        let mut events = view.events();
        settle().await;

        api.set_snapshot(AuctionSnapshot::new(AuctionId::from(AUCTION), dec!(110), dec!(100), false));
        tokio::time::sleep(Duration::from_millis(3_100)).await;

        assert!(!view.snapshot().active);
        assert!(drain(&mut events).contains(&ViewEvent::Closed { final_price: dec!(110) }));
    }

    #[tokio::test(start_paused = true)]
    async fn test_modes_are_exclusive_across_reconnect() {
        let transport = MockTransport::new();
        transport.fail_next_connects(1);
        let api = MockApi::live(AUCTION, dec!(100));

        let view = start(&transport, &api).await;
        let mut events = view.events();
        settle().await;
        assert_eq!(view.sync_mode(), Some(SyncMode::Poll));
        assert!(view.channel.subscription(&topic()).is_none());

        // Reconnect succeeds after the first delay.
        tokio::time::sleep(Duration::from_millis(3_000)).await;
        assert_eq!(view.sync_mode(), Some(SyncMode::Push));
        assert!(view.channel.subscription(&topic()).is_some());

        let fetches = api.fetches();
        tokio::time::sleep(Duration::from_secs(30)).await;
        assert_eq!(api.fetches(), fetches);

        transport.drop_connection("server restart");
        settle().await;
        assert_eq!(view.sync_mode(), Some(SyncMode::Poll));
        assert!(view.channel.subscription(&topic()).is_none());

        let modes: Vec<_> = drain(&mut events)
            .into_iter()
            .filter_map(|e| match e {
                ViewEvent::ModeChanged(mode) => Some(mode),
                _ => None,
            })
            .collect();
        assert_eq!(modes, vec![SyncMode::Poll, SyncMode::Push, SyncMode::Poll]);

        view.teardown().await;
    }

    #[tokio::test(start_paused = true)]
    async fn test_poll_fetch_in_flight_discarded_on_switch_to_push() {
        let transport = MockTransport::new();
        transport.fail_next_connects(1);
        let api = MockApi::live(AUCTION, dec!(100));

        let view = start(&transport, &api).await;
        let mut events = view.events();
        settle().await;
        assert_eq!(view.sync_mode(), Some(SyncMode::Poll));

        // The poll tick at 3s starts a fetch that answers at 5s; the
        // reconnect at 3s completes at 4s.
        transport.set_connect_latency(Duration::from_millis(1_000));
        api.set_fetch_latency(Duration::from_millis(2_000));
        api.set_price(dec!(150));

        tokio::time::sleep(Duration::from_millis(3_500)).await;
        assert_eq!(api.fetches(), 2);
        assert_eq!(view.sync_mode(), Some(SyncMode::Poll));

        tokio::time::sleep(Duration::from_millis(1_000)).await;
        assert_eq!(view.sync_mode(), Some(SyncMode::Push));

        tokio::time::sleep(Duration::from_millis(2_000)).await;
        assert_eq!(view.snapshot().current_price, dec!(100));
        assert_eq!(api.fetches(), 2);

        let seen = drain(&mut events);
        assert_eq!(flashes(&seen), 0);
        assert!(!seen.iter().any(|e| matches!(e, ViewEvent::SnapshotUpdated(_))));

        view.teardown().await;
    }

    #[tokio::test(start_paused = true)]
    async fn test_countdown_reaches_ended_at_end_time() {
        let transport = MockTransport::new();
        let start_wall = Utc::now();
        let api = MockApi::new(Some(
            AuctionSnapshot::new(AuctionId::from(AUCTION), dec!(100), dec!(100), true)
                .with_end_time(start_wall + chrono::Duration::seconds(5)),
        ));

        let view = ViewSynchronizer::start_with_clock(
            AuctionId::from(AUCTION),
            channel(&transport),
            Arc::new(api.clone()),
            SyncConfig::default(),
            Arc::new(RuntimeClock::starting_at(start_wall)),
        )
        .await
        .expect("view");
        let mut events = view.events();
        assert_eq!(view.countdown(), Countdown::Remaining(Duration::from_secs(5)));

        for left in (1..=4).rev() {
            tokio::time::sleep(Duration::from_millis(if left == 4 { 1_500 } else { 1_000 })).await;
            assert_eq!(view.countdown(), Countdown::Remaining(Duration::from_secs(left)));
            assert!(view.snapshot().active);
        }

        tokio::time::sleep(Duration::from_millis(1_000)).await;
        assert_eq!(view.countdown(), Countdown::Ended);
        assert!(!view.snapshot().active);

        let seen = drain(&mut events);
        assert!(seen.contains(&ViewEvent::Expired));
        assert!(seen.contains(&ViewEvent::Countdown(Countdown::Ended)));
    }

    #[tokio::test(start_paused = true)]
    async fn test_countdown_unknown_without_end_time() {
        let transport = MockTransport::new();
        let api = MockApi::live(AUCTION, dec!(100));

        let view = start(&transport, &api).await;
        tokio::time::sleep(Duration::from_millis(2_500)).await;

        assert_eq!(view.countdown(), Countdown::Unknown);
        assert!(view.snapshot().active);
    }

    #[tokio::test(start_paused = true)]
    async fn test_bid_too_low_rejected_locally() {
        let transport = MockTransport::new();
        let api = MockApi::live(AUCTION, dec!(100));

        let view = start(&transport, &api).await;
        settle().await;

        let result = view.place_bid(dec!(90)).await;
        assert!(matches!(
            result,
            Err(BidError::TooLow { current, amount }) if current == dec!(100) && amount == dec!(90)
        ));
        assert!(matches!(view.place_bid(dec!(100)).await, Err(BidError::TooLow { .. })));
        assert!(matches!(view.place_bid(dec!(-5)).await, Err(BidError::InvalidAmount(_))));
        assert!(api.bids().is_empty());
    }

    #[tokio::test(start_paused = true)]
    async fn test_bid_while_connected_waits_for_push() {
        let transport = MockTransport::new();
        let api = MockApi::live(AUCTION, dec!(100));

        let view = start(&transport, &api).await;
        settle().await;

        let receipt = view.place_bid(dec!(110)).await.expect("bid");
        assert_eq!(receipt.amount, dec!(110));
        settle().await;

        assert_eq!(api.fetches(), 1);
        assert_eq!(view.snapshot().current_price, dec!(100));
    }

    #[tokio::test(start_paused = true)]
    async fn test_bid_while_disconnected_refetches() {
        let transport = MockTransport::new();
        transport.fail_next_connects(usize::MAX);
        let api = MockApi::live(AUCTION, dec!(100));

        let view = start(&transport, &api).await;
        settle().await;

        view.place_bid(dec!(110)).await.expect("bid");
        settle().await;

        assert_eq!(api.fetches(), 2);
        assert_eq!(view.snapshot().current_price, dec!(110));
    }

    #[tokio::test(start_paused = true)]
    async fn test_bid_refetches_when_connected_without_subscription() {
        let transport = MockTransport::new();
        transport.refuse_subscribes();
        let api = MockApi::live(AUCTION, dec!(100));

        let view = start(&transport, &api).await;
        settle().await;
        assert!(view.channel().is_connected());
        assert_eq!(view.sync_mode(), Some(SyncMode::Poll));

        view.place_bid(dec!(110)).await.expect("bid");
        settle().await;

        assert_eq!(api.fetches(), 2);
        assert_eq!(view.snapshot().current_price, dec!(110));
    }

    #[tokio::test(start_paused = true)]
    async fn test_bid_rejected_by_server() {
        let transport = MockTransport::new();
        let api = MockApi::live(AUCTION, dec!(100));
        api.reject_bids();

        let view = start(&transport, &api).await;
        settle().await;

        let result = view.place_bid(dec!(120)).await;
        assert!(matches!(result, Err(BidError::Rejected(ClientError::Rejected { status: 409, .. }))));
        assert_eq!(view.snapshot().current_price, dec!(100));
        assert_eq!(view.sync_mode(), Some(SyncMode::Push));
    }

    #[tokio::test(start_paused = true)]
    async fn test_teardown_mid_reconnect_delay_stops_everything() {
        let transport = MockTransport::new();
        transport.fail_next_connects(usize::MAX);
        let api = MockApi::live(AUCTION, dec!(100));

        let view = start(&transport, &api).await;
        let mut events = view.events();
        tokio::time::sleep(Duration::from_millis(1_500)).await;

        assert_eq!(transport.connect_attempts(), 1);
        assert_eq!(view.sync_mode(), Some(SyncMode::Poll));
        drain(&mut events);

        view.teardown().await;
        tokio::time::sleep(Duration::from_secs(60)).await;

        assert_eq!(transport.connect_attempts(), 1);
        assert_eq!(api.fetches(), 1);
        assert_eq!(events.try_recv(), Err(TryRecvError::Closed));
    }

    #[tokio::test(start_paused = true)]
    async fn test_teardown_during_connect_attempt_stops_reconnecting() {
        let transport = MockTransport::new();
        transport.fail_next_connects(usize::MAX);
        transport.set_connect_latency(Duration::from_millis(500));
        let api = MockApi::live(AUCTION, dec!(100));

        let view = start(&transport, &api).await;
        tokio::time::sleep(Duration::from_millis(100)).await;
        assert_eq!(transport.connect_attempts(), 1);

        view.teardown().await;
        tokio::time::sleep(Duration::from_secs(120)).await;

        assert_eq!(transport.connect_attempts(), 1);
    }

    #[tokio::test(start_paused = true)]
    async fn test_teardown_releases_subscription() {
        let transport = MockTransport::new();
        let api = MockApi::live(AUCTION, dec!(100));
        let channel = channel(&transport);

        let view = ViewSynchronizer::start(
            AuctionId::from(AUCTION),
            channel.clone(),
            Arc::new(api),
            SyncConfig::default(),
        )
        .await
        .expect("view");
        settle().await;
        assert!(channel.subscription(&topic()).is_some());

        view.teardown().await;
        assert!(channel.subscription(&topic()).is_none());
        assert!(channel.is_connected());
    }

    #[tokio::test(start_paused = true)]
    async fn test_drop_releases_subscription() {
        let transport = MockTransport::new();
        let api = MockApi::live(AUCTION, dec!(100));
        let channel = channel(&transport);

        let view = ViewSynchronizer::start(
            AuctionId::from(AUCTION),
            channel.clone(),
            Arc::new(api),
            SyncConfig::default(),
        )
        .await
        .expect("view");
        settle().await;

        drop(view);
        settle().await;
        assert!(channel.subscription(&topic()).is_none());
    }
}
