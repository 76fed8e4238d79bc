//! Prometheus metrics for PulseWatch.
//!
//! The [`Aggregator`] is the only writer of the registry. It consumes probe
//! outcomes one at a time and keeps a [`MetricSet`] per target, created the
//! first time the target is seen and never removed.

use prometheus::{self, Encoder, Gauge, GaugeVec, Opts, Registry, TextEncoder};
use std::collections::hash_map::Entry;
use std::collections::HashMap;
use thiserror::Error;
use tokio::sync::mpsc;

use crate::probe::Outcome;

const NAMESPACE: &str = "pulsewatch";

/// Metrics error types.
#[derive(Error, Debug)]
pub enum MetricsError {
    #[error("{url} reported {days} certificate days but has no certificate gauge")]
    CertificateGaugeMissing { url: String, days: i64 },
    #[error("prometheus error: {0}")]
    Prometheus(#[from] prometheus::Error),
}

/// Gauges exported for one target.
#[derive(Clone)]
pub struct MetricSet {
    pub up: Gauge,
    pub response_time: Gauge,
    /// Only created for `https` targets.
    pub cert_valid_days: Option<Gauge>,
}

impl MetricSet {
    fn set(&self, outcome: &Outcome) -> Result<(), MetricsError> {
        self.up.set(if outcome.succeeded { 1.0 } else { 0.0 });
        self.response_time.set(
            outcome
                .latency
                .map(|l| l.as_millis() as f64)
                .unwrap_or(0.0),
        );

        if let Some(days) = outcome.cert_days_remaining {
            match &self.cert_valid_days {
                Some(gauge) => gauge.set(days as f64),
                None => {
                    return Err(MetricsError::CertificateGaugeMissing {
                        url: outcome.target.clone(),
                        days,
                    })
                }
            }
        }
        Ok(())
    }
}

/// Owns the registry and the per-target metric sets.
pub struct Aggregator {
    registry: Registry,
    up: GaugeVec,
    response_time: GaugeVec,
    cert_valid_days: GaugeVec,
    metric_sets: HashMap<String, MetricSet>,
}

impl Aggregator {
    /// Create the registry, attaching `env` as a label on every metric when given.
    pub fn new(env: Option<&str>) -> Result<Self, MetricsError> {
        let const_labels = env.map(|env| HashMap::from([("env".to_string(), env.to_string())]));
        let registry = Registry::new_custom(Some(NAMESPACE.to_string()), const_labels)?;

        let up = GaugeVec::new(
            Opts::new("up", "Whether the last probe returned HTTP 200 (1) or not (0)"),
            &["url"],
        )?;
        registry.register(Box::new(up.clone()))?;

        let response_time = GaugeVec::new(
            Opts::new(
                "response_time",
                "Response time of the last probe in milliseconds",
            ),
            &["url"],
        )?;
        registry.register(Box::new(response_time.clone()))?;

        let cert_valid_days = GaugeVec::new(
            Opts::new(
                "cert_valid_days",
                "Days until the target's TLS leaf certificate expires",
            ),
            &["url"],
        )?;
        registry.register(Box::new(cert_valid_days.clone()))?;

        Ok(Self {
            registry,
            up,
            response_time,
            cert_valid_days,
            metric_sets: HashMap::new(),
        })
    }

    /// Handle to the registry for the exposition endpoint.
    pub fn registry(&self) -> Registry {
        self.registry.clone()
    }

    #[cfg(test)]
    pub fn metric_set(&self, url: &str) -> Option<&MetricSet> {
        self.metric_sets.get(url)
    }

    /// Apply one outcome, creating the target's metric set if needed.
    pub fn record(&mut self, outcome: &Outcome) -> Result<(), MetricsError> {
        let set = match self.metric_sets.entry(outcome.target.clone()) {
            Entry::Occupied(entry) => entry.into_mut(),
            Entry::Vacant(entry) => {
                let set = create_metric_set(
                    &self.up,
                    &self.response_time,
                    &self.cert_valid_days,
                    entry.key(),
                )?;
                entry.insert(set)
            }
        };
        set.set(outcome)
    }

    /// Consume outcomes until every sender is gone.
    pub async fn run(mut self, mut rx: mpsc::Receiver<Outcome>) {
        while let Some(outcome) = rx.recv().await {
            if let Err(e) = self.record(&outcome) {
                tracing::error!("Failed to set metrics for {}: {}", outcome.target, e);
            }
        }
        tracing::info!("Aggregator: outcome channel closed");
    }
}

fn create_metric_set(
    up: &GaugeVec,
    response_time: &GaugeVec,
    cert_valid_days: &GaugeVec,
    url: &str,
) -> Result<MetricSet, MetricsError> {
    tracing::debug!("Registering metrics for {}", url);
    let cert_valid_days = if is_https(url) {
        Some(cert_valid_days.get_metric_with_label_values(&[url])?)
    } else {
        None
    };
    Ok(MetricSet {
        up: up.get_metric_with_label_values(&[url])?,
        response_time: response_time.get_metric_with_label_values(&[url])?,
        cert_valid_days,
    })
}

/// Encode every registered metric in the Prometheus text format.
pub fn encode(registry: &Registry) -> Result<String, prometheus::Error> {
    let encoder = TextEncoder::new();
    let metric_families = registry.gather();
    let mut buffer = Vec::new();
    encoder.encode(&metric_families, &mut buffer)?;
    String::from_utf8(buffer).map_err(|e| {
        prometheus::Error::Msg(format!("Failed to encode metrics as UTF-8: {}", e))
    })
}

fn is_https(url: &str) -> bool {
    match reqwest::Url::parse(url) {
        Ok(parsed) => parsed.scheme() == "https",
        Err(_) => url.to_ascii_lowercase().starts_with("https"),
    }
}
