//! Scheduler module: owns the catalog and drives probe cycles.
//!
//! The [`Scheduler`] is the only task that touches the [`Catalog`]. It reacts
//! to two events, a poll tick and a discovery batch, and handles them one at
//! a time, so the catalog needs no lock. Workers only ever see copies of
//! targets sent through the pending queue.

mod pool;
mod retention;

pub use pool::*;
pub use retention::*;

use crate::catalog::{Catalog, Target};

use chrono::Utc;
use std::time::Duration;
use tokio::sync::mpsc;
use tokio::time::{Instant, MissedTickBehavior};

/// Result of offering one catalog snapshot to the workers.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct DispatchReport {
    pub sent: usize,
    pub elapsed: Duration,
}

impl DispatchReport {
    /// True when sending took longer than one poll period.
    pub fn overran(&self, poll_period: Duration) -> bool {
        self.elapsed > poll_period
    }
}

/// Single-owner control loop over the target catalog.
pub struct Scheduler {
    catalog: Catalog,
    poll_period: Duration,
    pending_tx: flume::Sender<Target>,
    found_rx: Option<mpsc::Receiver<Vec<String>>>,
}

impl Scheduler {
    /// Create a scheduler that offers every target to `pending_tx` once per `poll_period`.
    pub fn new(catalog: Catalog, poll_period: Duration, pending_tx: flume::Sender<Target>) -> Self {
        Self {
            catalog,
            poll_period,
            pending_tx,
            found_rx: None,
        }
    }

    /// Accept discovery batches from `found_rx`.
    pub fn with_discovery(mut self, found_rx: mpsc::Receiver<Vec<String>>) -> Self {
        self.found_rx = Some(found_rx);
        self
    }

    /// Run the control loop. The first cycle starts immediately.
    pub async fn run(mut self) {
        tracing::info!(
            "Starting scheduler with {} targets, polling every {:?}",
            self.catalog.len(),
            self.poll_period
        );

        let mut interval = tokio::time::interval(self.poll_period);
        interval.set_missed_tick_behavior(MissedTickBehavior::Skip);

        loop {
            tokio::select! {
                _ = interval.tick() => {
                    self.dispatch_all().await;
                }
                batch = next_batch(&mut self.found_rx) => {
                    match batch {
                        Some(urls) => self.apply_batch(urls),
                        None => {
                            tracing::warn!("Scheduler: discovery feed closed");
                            self.found_rx = None;
                        }
                    }
                }
            }
        }
    }

    /// Offer a snapshot of the catalog to the workers.
    ///
    /// Sending waits while the queue is full, so a backlogged pool slows the
    /// scheduler down instead of dropping targets.
    async fn dispatch_all(&self) -> DispatchReport {
        let targets = self.catalog.snapshot();
        tracing::debug!("Scheduler: sending {} targets to pending queue", targets.len());

        let start = Instant::now();
        let mut sent = 0;
        for target in targets {
            if self.pending_tx.send_async(target).await.is_err() {
                tracing::error!("Scheduler: pending queue closed, cycle abandoned");
                break;
            }
            sent += 1;
        }

        let report = DispatchReport {
            sent,
            elapsed: start.elapsed(),
        };
        if report.overran(self.poll_period) {
            tracing::warn!(
                "Scheduler: sending {} targets took {:?}, longer than poll period {:?}",
                report.sent,
                report.elapsed,
                self.poll_period
            );
        }
        report
    }

    fn apply_batch(&mut self, urls: Vec<String>) {
        let report = apply_discovery_batch(&mut self.catalog, &urls, Utc::now());
        for url in &report.evicted {
            tracing::debug!("Scheduler: evicted expired target {}", url);
        }
        tracing::info!(
            "Scheduler: applied discovery batch of {} urls, evicted {}, catalog now {}",
            report.received,
            report.evicted.len(),
            report.catalog_size
        );
    }
}

/// Next discovery batch, or never if discovery is not configured.
async fn next_batch(found_rx: &mut Option<mpsc::Receiver<Vec<String>>>) -> Option<Vec<String>> {
    match found_rx {
        Some(rx) => rx.recv().await,
        None => std::future::pending().await,
    }
}
