//! Snapshot store.
//!
//! Holds the auction a view renders from. Every update publishes a new
//! immutable snapshot; readers hold `watch` receivers.

use std::sync::Arc;

use rust_decimal::Decimal;
use tokio::sync::watch;
use tracing::{debug, warn};

use crate::types::AuctionSnapshot;

/// Single source of truth for one displayed auction.
///
/// Once closed (by a closure message, an inactive fetch or expiry) the
/// snapshot stays inactive and price pushes are ignored.
#[derive(Debug)]
pub struct SnapshotStore {
    tx: watch::Sender<Arc<AuctionSnapshot>>,
    closed: bool,
}

impl SnapshotStore {
    /// Creates a store from an authoritative snapshot.
    #[must_use]
    pub fn new(snapshot: AuctionSnapshot) -> Self {
        let closed = !snapshot.active;
        let (tx, _) = watch::channel(Arc::new(snapshot));
        Self { tx, closed }
    }

    /// Returns the current snapshot.
    #[must_use]
    pub fn current(&self) -> Arc<AuctionSnapshot> {
        Arc::clone(&self.tx.borrow())
    }

    /// Returns a receiver that observes every update.
    #[must_use]
    pub fn subscribe(&self) -> watch::Receiver<Arc<AuctionSnapshot>> {
        self.tx.subscribe()
    }

    /// Returns true once bidding is over.
    #[must_use]
    pub const fn is_closed(&self) -> bool {
        self.closed
    }

    /// Applies a pushed price. Returns true if the price changed.
    pub fn apply_price(&mut self, price: Decimal) -> bool {
        if self.closed {
            debug!(%price, "auction closed, ignoring price update");
            return false;
        }

        if self.tx.borrow().current_price == price {
            return false;
        }

        self.update(|snapshot| snapshot.current_price = price);
        true
    }

    /// Records closure with the final price. Returns false if already closed.
    pub fn close(&mut self, final_price: Decimal) -> bool {
        if self.closed {
            return false;
        }

        self.closed = true;
        self.update(|snapshot| {
            snapshot.active = false;
            snapshot.current_price = final_price;
        });
        true
    }

    /// Records that the end time passed. Returns false if already closed.
    pub fn expire(&mut self) -> bool {
        if self.closed {
            return false;
        }

        self.closed = true;
        self.update(|snapshot| snapshot.active = false);
        true
    }

    /// Replaces the snapshot with a fetched one. Returns true if the price
    /// changed.
    ///
    /// Fetches for another auction are ignored. A closed store stays closed
    /// whatever the fetch says.
    pub fn replace(&mut self, mut snapshot: AuctionSnapshot) -> bool {
        let previous = self.current();

        if snapshot.id != previous.id {
            warn!(expected = %previous.id, got = %snapshot.id, "ignoring snapshot for another auction");
            return false;
        }

        if self.closed {
            snapshot.active = false;
        } else if !snapshot.active {
            self.closed = true;
        }

        let changed = snapshot.current_price != previous.current_price;
        self.tx.send_replace(Arc::new(snapshot));
        changed
    }

    fn update(&self, apply: impl FnOnce(&mut AuctionSnapshot)) {
        let mut next = AuctionSnapshot::clone(&self.tx.borrow());
        apply(&mut next);
        self.tx.send_replace(Arc::new(next));
    }
}
