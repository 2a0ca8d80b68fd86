//! In-memory doubles for the push transport and the REST API.

use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use std::time::Duration;

use async_trait::async_trait;
use rust_decimal::Decimal;
use tokio::sync::mpsc;
use tokio::time::Instant;

use crate::client::{AuctionApi, ClientError};
use crate::types::{AuctionId, AuctionSnapshot, BidReceipt, Topic};
use crate::ws::{PushTransport, TransportEvent, WireId, WsError};

fn lock<T>(mutex: &Mutex<T>) -> MutexGuard<'_, T> {
    mutex.lock().unwrap_or_else(PoisonError::into_inner)
}

#[derive(Default)]
struct TransportState {
    failures_left: usize,
    refuse_subscribes: bool,
    latency: Duration,
    connect_times: Vec<Instant>,
    events: Option<mpsc::UnboundedSender<TransportEvent>>,
    subscribed: Vec<Topic>,
    unsubscribed: usize,
    sent: Vec<(String, String)>,
    next_id: u64,
}

/// Scripted push transport.
#[derive(Clone, Default)]
pub(crate) struct MockTransport {
    state: Arc<Mutex<TransportState>>,
}

impl MockTransport {
    pub(crate) fn new() -> Self {
        Self::default()
    }

    /// Makes the next `n` connect attempts fail.
    pub(crate) fn fail_next_connects(&self, n: usize) {
        lock(&self.state).failures_left = n;
    }

    /// Makes every wire subscribe fail while connects still succeed.
    pub(crate) fn refuse_subscribes(&self) {
        lock(&self.state).refuse_subscribes = true;
    }

    pub(crate) fn set_connect_latency(&self, latency: Duration) {
        lock(&self.state).latency = latency;
    }

    pub(crate) fn connect_attempts(&self) -> usize {
        lock(&self.state).connect_times.len()
    }

    pub(crate) fn connect_times(&self) -> Vec<Instant> {
        lock(&self.state).connect_times.clone()
    }

    pub(crate) fn wire_subscriptions(&self) -> usize {
        lock(&self.state).subscribed.len()
    }

    pub(crate) fn wire_unsubscriptions(&self) -> usize {
        lock(&self.state).unsubscribed
    }

    pub(crate) fn sent(&self) -> Vec<(String, String)> {
        lock(&self.state).sent.clone()
    }

    /// Publishes a payload as if the server sent it.
    pub(crate) fn deliver(&self, topic: &Topic, payload: &str) {
        if let Some(events) = &lock(&self.state).events {
            let _ = events.send(TransportEvent::Message {
                topic: topic.clone(),
                payload: payload.to_string(),
            });
        }
    }

    /// Simulates the server dropping the connection.
    pub(crate) fn drop_connection(&self, reason: &str) {
        if let Some(events) = lock(&self.state).events.take() {
            let _ = events.send(TransportEvent::Closed {
                reason: reason.to_string(),
            });
        }
    }
}

#[async_trait]
impl PushTransport for MockTransport {
    async fn connect(&self) -> Result<mpsc::UnboundedReceiver<TransportEvent>, WsError> {
        let latency = {
            let mut state = lock(&self.state);
            state.connect_times.push(Instant::now());
            state.latency
        };

        if !latency.is_zero() {
            tokio::time::sleep(latency).await;
        }

        let mut state = lock(&self.state);
        if state.failures_left > 0 {
            state.failures_left -= 1;
            return Err(WsError::Connection("connection refused".to_string()));
        }

        let (tx, rx) = mpsc::unbounded_channel();
        state.events = Some(tx);
        Ok(rx)
    }

    fn subscribe(&self, topic: &Topic) -> Result<WireId, WsError> {
        let mut state = lock(&self.state);
        if state.events.is_none() {
            return Err(WsError::NotConnected);
        }
        if state.refuse_subscribes {
            return Err(WsError::Subscribe(format!("{} refused", topic)));
        }
        state.next_id += 1;
        state.subscribed.push(topic.clone());
        Ok(format!("mock-{}", state.next_id))
    }

    fn unsubscribe(&self, _id: &WireId) -> Result<(), WsError> {
        lock(&self.state).unsubscribed += 1;
        Ok(())
    }

    fn send(&self, destination: &str, body: String) -> Result<(), WsError> {
        lock(&self.state).sent.push((destination.to_string(), body));
        Ok(())
    }

    async fn close(&self) {
        lock(&self.state).events = None;
    }
}

struct ApiState {
    snapshot: Option<AuctionSnapshot>,
    unavailable: bool,
    latency: Duration,
    fetches: usize,
    bids: Vec<Decimal>,
    reject_bids: bool,
}

/// Canned REST API.
#[derive(Clone)]
pub(crate) struct MockApi {
    state: Arc<Mutex<ApiState>>,
}

impl MockApi {
    /// Serves `snapshot` until changed. `None` answers 404.
    pub(crate) fn new(snapshot: Option<AuctionSnapshot>) -> Self {
        Self {
            state: Arc::new(Mutex::new(ApiState {
                snapshot,
                unavailable: false,
                latency: Duration::ZERO,
                fetches: 0,
                bids: Vec::new(),
                reject_bids: false,
            })),
        }
    }

    /// Serves an active auction at `price`.
    pub(crate) fn live(id: u64, price: Decimal) -> Self {
        Self::new(Some(AuctionSnapshot::new(AuctionId::from(id), price, price, true)))
    }

    pub(crate) fn set_snapshot(&self, snapshot: AuctionSnapshot) {
        lock(&self.state).snapshot = Some(snapshot);
    }

    pub(crate) fn set_price(&self, price: Decimal) {
        if let Some(snapshot) = lock(&self.state).snapshot.as_mut() {
            snapshot.current_price = price;
        }
    }

    pub(crate) fn set_unavailable(&self, unavailable: bool) {
        lock(&self.state).unavailable = unavailable;
    }

    /// Delays every fetch answer. The snapshot is read when the answer
    /// goes out, not when the request arrives.
    pub(crate) fn set_fetch_latency(&self, latency: Duration) {
        lock(&self.state).latency = latency;
    }

    pub(crate) fn reject_bids(&self) {
        lock(&self.state).reject_bids = true;
    }

    pub(crate) fn fetches(&self) -> usize {
        lock(&self.state).fetches
    }

    pub(crate) fn bids(&self) -> Vec<Decimal> {
        lock(&self.state).bids.clone()
    }
}

#[async_trait]
impl AuctionApi for MockApi {
    async fn fetch_auction(&self, id: &AuctionId) -> Result<AuctionSnapshot, ClientError> {
        let latency = {
            let mut state = lock(&self.state);
            state.fetches += 1;
            state.latency
        };

        if !latency.is_zero() {
            tokio::time::sleep(latency).await;
        }

        let state = lock(&self.state);
        if state.unavailable {
            return Err(ClientError::Unavailable {
                status: 503,
                message: "maintenance".to_string(),
            });
        }

        state
            .snapshot
            .clone()
            .ok_or_else(|| ClientError::NotFound(format!("auction {}", id)))
    }

    async fn place_bid(&self, _id: &AuctionId, amount: Decimal) -> Result<BidReceipt, ClientError> {
        let mut state = lock(&self.state);
        state.bids.push(amount);

        if state.reject_bids {
            return Err(ClientError::Rejected {
                status: 409,
                message: "bid too low".to_string(),
            });
        }

        if let Some(snapshot) = state.snapshot.as_mut() {
            snapshot.current_price = amount;
        }

        Ok(BidReceipt {
            amount,
            bid_time: None,
            extra: serde_json::Map::new(),
        })
    }
}
