//! Target discovery from an external monitor list.
//!
//! The feeder fetches the complete list once per period and hands it to the
//! scheduler as a single batch.

mod uptimerobot;

pub use uptimerobot::*;

use std::time::Duration;
use thiserror::Error;
use tokio::sync::mpsc;

/// Discovery error types.
#[derive(Error, Debug)]
pub enum DiscoveryError {
    #[error("request failed: {0}")]
    Http(#[from] reqwest::Error),
    #[error("API error: {0}")]
    Api(String),
    #[error("failed to decode response: {0}")]
    Decode(#[from] serde_json::Error),
}

/// Periodically fetches all monitor URLs and forwards them as one batch.
pub struct DiscoveryFeeder {
    client: UptimeRobotClient,
    fetch_period: Duration,
    found_tx: mpsc::Sender<Vec<String>>,
}

impl DiscoveryFeeder {
    pub fn new(
        client: UptimeRobotClient,
        fetch_period: Duration,
        found_tx: mpsc::Sender<Vec<String>>,
    ) -> Self {
        Self {
            client,
            fetch_period,
            found_tx,
        }
    }

    /// Fetch immediately, then once per period, until the scheduler goes away.
    pub async fn run(self) {
        let mut interval = tokio::time::interval(self.fetch_period);
        interval.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Delay);

        loop {
            interval.tick().await;
            if !self.fetch_once().await {
                break;
            }
        }
        tracing::info!("Discovery: scheduler gone, stopping");
    }

    /// Run one fetch cycle. Returns false once the receiving side is closed.
    async fn fetch_once(&self) -> bool {
        tracing::debug!("Discovery: starting fetch");
        match self.client.fetch_all().await {
            Ok(urls) => {
                tracing::debug!("Discovery: fetched {} monitors", urls.len());
                self.found_tx.send(urls).await.is_ok()
            }
            Err(e) => {
                tracing::error!("Discovery: fetch failed: {}", e);
                !self.found_tx.is_closed()
            }
        }
    }
}
