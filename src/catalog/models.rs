//! Catalog model types.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// HTTP method used to probe a target.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum Method {
    #[default]
    #[serde(alias = "get")]
    Get,
    #[serde(alias = "head")]
    Head,
}

impl Method {
    pub fn as_reqwest(&self) -> reqwest::Method {
        match self {
            Method::Get => reqwest::Method::GET,
            Method::Head => reqwest::Method::HEAD,
        }
    }
}

/// A monitored endpoint.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Target {
    pub url: String,
    pub method: Method,
    /// Set only for discovered targets; TTL eviction applies to these alone.
    pub discovered_at: Option<DateTime<Utc>>,
}

impl Target {
    /// A statically configured target, never evicted.
    pub fn fixed(url: impl Into<String>, method: Method) -> Self {
        Self {
            url: url.into(),
            method,
            discovered_at: None,
        }
    }

    /// A target reported by the discovery source at `at`.
    pub fn discovered(url: impl Into<String>, at: DateTime<Utc>) -> Self {
        Self {
            url: url.into(),
            method: Method::Get,
            discovered_at: Some(at),
        }
    }

    pub fn is_static(&self) -> bool {
        self.discovered_at.is_none()
    }
}

/// One record of the static catalog file.
#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct StaticTarget {
    pub target_url: String,
    #[serde(default)]
    pub method: Method,
}

/// Layout of the static catalog file.
#[derive(Debug, Clone, Deserialize)]
pub struct StaticCatalog {
    #[serde(default)]
    pub monitors: Vec<StaticTarget>,
}
