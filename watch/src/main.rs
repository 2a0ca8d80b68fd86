//! Auction Live watch binary.
//!
//! Follows the auctions named in `AUCTION_IDS` and logs every view event
//! until Ctrl-C.

mod config;

use std::sync::Arc;

use anyhow::Context;
use auction_live_sdk::client::{AuctionApi, AuctionClient};
use auction_live_sdk::sync::{ViewEvent, ViewSynchronizer};
use auction_live_sdk::ws::{ChannelManager, WsTransport};
use tokio::sync::broadcast::error::RecvError;
use tokio::task::JoinSet;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use crate::config::WatchConfig;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Initialize tracing
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "info,auction_live_sdk=debug".into()),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    let config = WatchConfig::from_env().context("reading configuration")?;

    tracing::info!("Starting Auction Live watch");
    tracing::info!("API URL: {}", config.api_url);
    tracing::info!("WebSocket URL: {}", config.ws_url);
    tracing::info!("Poll interval: {:?}", config.poll_interval);

    let api: Arc<dyn AuctionApi> =
        Arc::new(AuctionClient::new(config.client()).context("building API client")?);
    let transport =
        Arc::new(WsTransport::new(config.channel()).context("building push transport")?);
    let channel =
        ChannelManager::new(transport, config.channel()).context("building channel manager")?;

    channel.set_on_connection_change(|state| {
        tracing::info!(%state, "push channel state changed");
    });

    let mut views = Vec::new();
    let mut loggers = JoinSet::new();

    for id in &config.auction_ids {
        match ViewSynchronizer::start(id.clone(), channel.clone(), Arc::clone(&api), config.sync())
            .await
        {
            Ok(view) => {
                let snapshot = view.snapshot();
                tracing::info!(
                    auction = %id,
                    title = %snapshot.title(),
                    price = %snapshot.current_price,
                    ends_in = %view.countdown(),
                    "following auction"
                );
                loggers.spawn(log_events(id.to_string(), view.events()));
                views.push(view);
            }
            Err(e) => tracing::error!(auction = %id, error = %e, "cannot follow auction"),
        }
    }

    anyhow::ensure!(!views.is_empty(), "no auction could be loaded");

    tokio::signal::ctrl_c().await?;
    tracing::info!("Shutting down Auction Live watch");

    for view in views {
        view.teardown().await;
    }
    channel.disconnect().await;
    loggers.shutdown().await;

    Ok(())
}

/// Logs one view's events until the view stops.
async fn log_events(auction: String, mut events: tokio::sync::broadcast::Receiver<ViewEvent>) {
    loop {
        match events.recv().await {
            Ok(ViewEvent::SnapshotUpdated(snapshot)) => tracing::debug!(
                %auction,
                price = %snapshot.current_price,
                active = snapshot.active,
                "snapshot updated"
            ),
            Ok(ViewEvent::Flash { price }) => tracing::info!(%auction, %price, "price changed"),
            Ok(ViewEvent::FlashCleared) => {}
            Ok(ViewEvent::ModeChanged(mode)) => tracing::info!(%auction, %mode, "sync mode"),
            Ok(ViewEvent::Countdown(left)) => tracing::trace!(%auction, %left, "countdown"),
            Ok(ViewEvent::Closed { final_price }) => {
                tracing::info!(%auction, %final_price, "auction closed");
            }
            Ok(ViewEvent::Expired) => tracing::info!(%auction, "auction ended"),
            Err(RecvError::Lagged(missed)) => {
                tracing::warn!(%auction, missed, "event log fell behind");
            }
            Err(RecvError::Closed) => break,
        }
    }
}
