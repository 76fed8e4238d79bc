//! PulseWatch - Endpoint Health Monitor
//!
//! Probes a catalog of URLs on a fixed cadence and exports liveness, latency
//! and certificate validity as Prometheus gauges.
//!
//! Tasks and the channels between them are all wired up here:
//!
//! ```text
//! discovery --found--> scheduler --pending--> workers --outcomes--> aggregator --> /metrics
//! ```

mod catalog;
mod config;
mod discovery;
mod limits;
mod metrics;
mod probe;
mod scheduler;
mod web;

use catalog::Catalog;
use config::MonitorConfig;
use discovery::{DiscoveryFeeder, UptimeRobotClient};
use metrics::Aggregator;
use probe::Prober;
use scheduler::Scheduler;
use web::Server;

use tokio::sync::mpsc;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

/// Capacity of the queue between workers and the aggregator.
const OUTCOME_QUEUE: usize = 1000;

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error + Send + Sync>> {
    // Initialize logging
    tracing_subscriber::registry()
        .with(tracing_subscriber::fmt::layer())
        .with(tracing_subscriber::EnvFilter::from_default_env()
            .add_directive("pulsewatch=info".parse()?))
        .init();

    // Load configuration
    let cfg = MonitorConfig::load()?;
    tracing::info!(
        "Starting PulseWatch with {} workers, poll period {:?}, timeout {:?}",
        cfg.workers,
        cfg.poll_period,
        cfg.poll_timeout
    );

    let fd_limit = 2 * cfg.workers as u64;
    if let Err(e) = limits::ensure_descriptor_limit(fd_limit) {
        tracing::error!("Failed to set file descriptor limit to {}: {}", fd_limit, e);
    }

    let catalog = match &cfg.targets_path {
        Some(path) => {
            let catalog = Catalog::load(path)?;
            tracing::info!("Loaded {} targets from {}", catalog.len(), path.display());
            catalog
        }
        None => Catalog::new(),
    };
    if catalog.is_empty() && cfg.discovery.is_none() {
        tracing::warn!("No static targets and no discovery configured; nothing will be probed");
    }

    let aggregator = Aggregator::new(cfg.env_label.as_deref())?;
    let listener = Server::bind(cfg.listen_addr).await?;
    let server = Server::new(aggregator.registry());

    let (pending_tx, pending_rx) = flume::bounded(cfg.workers);
    let (outcome_tx, outcome_rx) = mpsc::channel(OUTCOME_QUEUE);

    let prober = Prober::new(cfg.poll_timeout)?;
    scheduler::spawn_workers(cfg.workers, prober, pending_rx, outcome_tx);
    tokio::spawn(aggregator.run(outcome_rx));

    tokio::spawn(async move {
        if let Err(e) = server.serve(listener).await {
            tracing::error!("Metrics server stopped: {}", e);
        }
    });

    let mut scheduler = Scheduler::new(catalog, cfg.poll_period, pending_tx);

    if let Some(discovery) = &cfg.discovery {
        let (found_tx, found_rx) = mpsc::channel(1);
        let client = UptimeRobotClient::new(discovery.api_key.clone(), discovery.endpoint.clone())?;
        tokio::spawn(DiscoveryFeeder::new(client, discovery.fetch_period, found_tx).run());
        scheduler = scheduler.with_discovery(found_rx);
        tracing::info!(
            "Discovery enabled, fetching every {:?}",
            discovery.fetch_period
        );
    }

    scheduler.run().await;

    Ok(())
}
