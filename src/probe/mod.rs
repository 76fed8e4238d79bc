//! Probe module for endpoint monitoring.
//!
//! A probe is one HTTP(S) request against one target, reduced to an
//! [`Outcome`] holding liveness, latency and certificate validity.

mod http;
mod tls;

pub use http::*;
pub use tls::*;

#[cfg(test)]
pub(crate) use http::tests::spawn_test_server;

use chrono::{DateTime, Utc};
use std::time::Duration;
use thiserror::Error;

/// Probe error types.
#[derive(Error, Debug)]
pub enum ProbeError {
    #[error("probe timed out after {0:?}")]
    Timeout(Duration),
    #[error("network error: {0}")]
    Network(String),
    #[error("out of file descriptors: {0}")]
    DescriptorExhausted(String),
    #[error("failed to read response body: {0}")]
    Body(String),
}

/// Result of probing one target once.
#[derive(Debug, Clone, PartialEq)]
pub struct Outcome {
    pub target: String,
    pub requested_at: DateTime<Utc>,
    /// True iff the response status was exactly 200.
    pub succeeded: bool,
    /// Present whenever a response was received.
    pub latency: Option<Duration>,
    pub cert_days_remaining: Option<i64>,
}

impl Outcome {
    /// An outcome for a probe that got no usable response.
    pub fn failed(target: impl Into<String>, requested_at: DateTime<Utc>) -> Self {
        Self {
            target: target.into(),
            requested_at,
            succeeded: false,
            latency: None,
            cert_days_remaining: None,
        }
    }
}
