//! TTL eviction of discovered targets.

use chrono::{DateTime, Duration as ChronoDuration, Utc};
use std::time::Duration;

use crate::catalog::Catalog;

/// How long a discovered target survives without being rediscovered.
pub const DISCOVERY_RETENTION: Duration = Duration::from_secs(30 * 60);

/// What a discovery batch did to the catalog.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BatchReport {
    pub received: usize,
    pub evicted: Vec<String>,
    pub catalog_size: usize,
}

/// Apply one discovery batch received at `now`.
///
/// Expired discovered targets are evicted first, then every URL in the batch
/// is inserted or refreshed, so a URL present in the batch always survives.
pub fn apply_discovery_batch(
    catalog: &mut Catalog,
    urls: &[String],
    now: DateTime<Utc>,
) -> BatchReport {
    let cutoff = now - ChronoDuration::seconds(DISCOVERY_RETENTION.as_secs() as i64);
    let evicted = catalog.evict_discovered_before(cutoff);

    for url in urls {
        catalog.refresh_discovered(url, now);
    }

    BatchReport {
        received: urls.len(),
        evicted,
        catalog_size: catalog.len(),
    }
}
