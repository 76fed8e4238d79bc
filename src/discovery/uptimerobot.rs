//! UptimeRobot monitor listing client.

use serde::Deserialize;
use std::time::Duration;

use super::DiscoveryError;

/// Default `getMonitors` endpoint.
pub const UPTIMEROBOT_API_URL: &str = "https://api.uptimerobot.com/v2/getMonitors";

/// The API refuses pages larger than this.
const PAGE_SIZE: usize = 50;
const PAGE_DELAY: Duration = Duration::from_secs(1);
const REQUEST_TIMEOUT: Duration = Duration::from_secs(30);

#[derive(Debug, Deserialize)]
struct Pagination {
    #[serde(default)]
    offset: usize,
    total: usize,
}

#[derive(Debug, Deserialize)]
struct RemoteMonitor {
    url: String,
}

#[derive(Debug, Deserialize)]
struct GetMonitorsResponse {
    #[serde(default)]
    stat: Option<String>,
    #[serde(default)]
    error: Option<serde_json::Value>,
    pagination: Option<Pagination>,
    #[serde(default)]
    monitors: Vec<RemoteMonitor>,
}

/// Pages through every monitor of an UptimeRobot account.
#[derive(Debug, Clone)]
pub struct UptimeRobotClient {
    client: reqwest::Client,
    api_key: String,
    endpoint: String,
    page_delay: Duration,
}

impl UptimeRobotClient {
    pub fn new(
        api_key: impl Into<String>,
        endpoint: impl Into<String>,
    ) -> Result<Self, DiscoveryError> {
        let client = reqwest::Client::builder().timeout(REQUEST_TIMEOUT).build()?;

        Ok(Self {
            client,
            api_key: api_key.into(),
            endpoint: endpoint.into(),
            page_delay: PAGE_DELAY,
        })
    }

    /// Override the pause between page requests.
    pub fn with_page_delay(mut self, page_delay: Duration) -> Self {
        self.page_delay = page_delay;
        self
    }

    /// Fetch the URLs of all monitors, one page at a time.
    ///
    /// Any failing page aborts the whole fetch; partial results are dropped.
    pub async fn fetch_all(&self) -> Result<Vec<String>, DiscoveryError> {
        let mut urls = Vec::new();
        let mut offset = 0usize;

        loop {
            let page = self.fetch_page(offset).await?;
            let pagination = page
                .pagination
                .ok_or_else(|| DiscoveryError::Api("response has no pagination".to_string()))?;

            tracing::debug!(
                "Received {} (offset {}) of {} monitors from UptimeRobot",
                page.monitors.len(),
                pagination.offset,
                pagination.total
            );

            if page.monitors.is_empty() {
                if offset < pagination.total {
                    tracing::warn!(
                        "UptimeRobot returned an empty page at offset {} of {}; stopping early",
                        offset,
                        pagination.total
                    );
                }
                break;
            }

            offset += page.monitors.len();
            urls.extend(page.monitors.into_iter().map(|m| m.url));

            if offset >= pagination.total {
                break;
            }
            tokio::time::sleep(self.page_delay).await;
        }

        Ok(urls)
    }

    async fn fetch_page(&self, offset: usize) -> Result<GetMonitorsResponse, DiscoveryError> {
        let limit = PAGE_SIZE.to_string();
        let offset = offset.to_string();
        let form = [
            ("api_key", self.api_key.as_str()),
            ("format", "json"),
            ("limit", limit.as_str()),
            ("offset", offset.as_str()),
        ];

        let response = self
            .client
            .post(&self.endpoint)
            .header("cache-control", "no-cache")
            .form(&form)
            .send()
            .await?
            .error_for_status()?;

        let body = response.bytes().await?;
        let page: GetMonitorsResponse = serde_json::from_slice(&body)?;

        if page.stat.as_deref() == Some("fail") {
            let detail = page
                .error
                .map(|e| e.to_string())
                .unwrap_or_else(|| "unknown error".to_string());
            return Err(DiscoveryError::Api(detail));
        }
        Ok(page)
    }
}
