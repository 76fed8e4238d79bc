//! Fixed-size pool of probe workers.

use tokio::sync::mpsc;
use tokio::task::JoinHandle;

use crate::catalog::Target;
use crate::probe::{Outcome, Prober};

/// Spawn `size` workers that pull from one pending queue.
///
/// Each worker takes one target at a time, so `size` bounds the number of
/// probes in flight. Workers exit once every pending sender is gone.
pub fn spawn_workers(
    size: usize,
    prober: Prober,
    pending_rx: flume::Receiver<Target>,
    outcome_tx: mpsc::Sender<Outcome>,
) -> Vec<JoinHandle<()>> {
    (0..size)
        .map(|id| {
            tokio::spawn(run_worker(
                id,
                prober.clone(),
                pending_rx.clone(),
                outcome_tx.clone(),
            ))
        })
        .collect()
}

async fn run_worker(
    id: usize,
    prober: Prober,
    pending_rx: flume::Receiver<Target>,
    outcome_tx: mpsc::Sender<Outcome>,
) {
    while let Ok(target) = pending_rx.recv_async().await {
        let outcome = prober.probe(&target).await;
        tracing::trace!(
            "Worker {} processed {} requested at {} (succeeded: {})",
            id,
            outcome.target,
            outcome.requested_at,
            outcome.succeeded
        );

        if outcome_tx.send(outcome).await.is_err() {
            tracing::error!("Worker {}: outcome channel closed", id);
            break;
        }
    }
    tracing::debug!("Worker {} stopped", id);
}
