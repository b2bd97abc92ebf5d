pub mod auth;
pub mod directory;
pub mod security;
pub mod teams;
pub mod usage;

use crate::config::{ConfigManager, TenantConfig};
use crate::error::{DiagError, Result};
use reqwest::Client;
use serde::Deserialize;
use std::time::Duration;

pub const GRAPH_API_BASE: &str = "https://graph.microsoft.com/v1.0";
pub const GRAPH_API_BETA: &str = "https://graph.microsoft.com/beta";

const MAX_RETRIES: u32 = 3;
const INITIAL_BACKOFF_MS: u64 = 1000;
const MAX_BACKOFF_MS: u64 = 30000;
const JITTER_FACTOR: f64 = 0.3; // +/- 30% jitter

/// Exponential backoff with jitter for retry `attempt` (0-based)
fn calculate_backoff_with_jitter(attempt: u32) -> Duration {
    let base_backoff = INITIAL_BACKOFF_MS.saturating_mul(2u64.saturating_pow(attempt));
    let capped_backoff = base_backoff.min(MAX_BACKOFF_MS);

    let jitter_range = (capped_backoff as f64 * JITTER_FACTOR) as u64;
    let jitter = if jitter_range > 0 {
        use std::hash::{Hash, Hasher};
        let mut hasher = std::collections::hash_map::DefaultHasher::new();
        std::time::SystemTime::now().hash(&mut hasher);
        (hasher.finish() % (jitter_range * 2)) as i64 - jitter_range as i64
    } else {
        0
    };

    Duration::from_millis((capped_backoff as i64 + jitter).max(100) as u64)
}

/// Read-only Graph API client with retry support
pub struct GraphClient {
    client: Client,
    access_token: String,
    base_url: String,
    beta_url: String,
}

impl GraphClient {
    pub fn new(access_token: String) -> Self {
        Self::with_base_urls(access_token, GRAPH_API_BASE, GRAPH_API_BETA)
    }

    /// Point the client at another host, e.g. a mock server.
    /// `root` is the part before `/v1.0` and `/beta`.
    pub fn with_root(access_token: String, root: &str) -> Self {
        let root = root.trim_end_matches('/');
        Self::with_base_urls(
            access_token,
            &format!("{}/v1.0", root),
            &format!("{}/beta", root),
        )
    }

    fn with_base_urls(access_token: String, base_url: &str, beta_url: &str) -> Self {
        Self {
            client: Client::new(),
            access_token,
            base_url: base_url.to_string(),
            beta_url: beta_url.to_string(),
        }
    }

    /// Acquire a token for the tenant (cached or fresh) and build a client
    pub async fn from_tenant(config: &ConfigManager, tenant: &TenantConfig) -> Result<Self> {
        let graph_auth = auth::GraphAuth::new(config.clone());
        let access_token = graph_auth.acquire_token(tenant).await?;
        Ok(Self::new(access_token))
    }

    fn url(&self, base: &str, endpoint: &str) -> String {
        format!("{}/{}", base, endpoint.trim_start_matches('/'))
    }

    /// GET from the v1.0 endpoint
    pub async fn get<T: for<'de> Deserialize<'de>>(&self, endpoint: &str) -> Result<T> {
        self.get_url(&self.url(&self.base_url, endpoint)).await
    }

    /// GET from the beta endpoint
    pub async fn get_beta<T: for<'de> Deserialize<'de>>(&self, endpoint: &str) -> Result<T> {
        self.get_url(&self.url(&self.beta_url, endpoint)).await
    }

    /// GET an absolute URL, retrying 429, 5xx and connection failures.
    ///
    /// 429 waits for `Retry-After`; everything else uses jittered
    /// exponential backoff. Other error statuses fail immediately.
    async fn get_url<T: for<'de> Deserialize<'de>>(&self, url: &str) -> Result<T> {
        let mut last_error = None;

        for attempt in 0..MAX_RETRIES {
            tracing::debug!("GET {} (attempt {}/{})", url, attempt + 1, MAX_RETRIES);

            let response = self
                .client
                .get(url)
                .bearer_auth(&self.access_token)
                .send()
                .await;

            match response {
                Ok(resp) => {
                    let status = resp.status();

                    if status == reqwest::StatusCode::TOO_MANY_REQUESTS && attempt < MAX_RETRIES - 1
                    {
                        let retry_after = resp
                            .headers()
                            .get("Retry-After")
                            .and_then(|v| v.to_str().ok())
                            .and_then(|v| v.parse::<u64>().ok())
                            .unwrap_or(INITIAL_BACKOFF_MS / 1000);

                        tracing::warn!(
                            "Rate limited (429). Retrying in {} seconds... (attempt {}/{})",
                            retry_after,
                            attempt + 1,
                            MAX_RETRIES
                        );
                        tokio::time::sleep(Duration::from_secs(retry_after)).await;
                        continue;
                    }

                    if status.is_server_error() && attempt < MAX_RETRIES - 1 {
                        let wait_time = calculate_backoff_with_jitter(attempt);
                        tracing::warn!(
                            "Server error ({}). Retrying in {:?}... (attempt {}/{})",
                            status,
                            wait_time,
                            attempt + 1,
                            MAX_RETRIES
                        );
                        tokio::time::sleep(wait_time).await;
                        continue;
                    }

                    if !status.is_success() {
                        let error_text = resp.text().await.unwrap_or_default();
                        let enhanced_error = crate::error::enhance_graph_error(&error_text);
                        return Err(DiagError::GraphApiError(format!(
                            "HTTP {}: {}",
                            status, enhanced_error
                        )));
                    }

                    return Ok(resp.json::<T>().await?);
                }
                Err(e) => {
                    if attempt < MAX_RETRIES - 1 {
                        let wait_time = calculate_backoff_with_jitter(attempt);
                        tracing::warn!(
                            "Connection error: {}. Retrying in {:?}... (attempt {}/{})",
                            e,
                            wait_time,
                            attempt + 1,
                            MAX_RETRIES
                        );
                        tokio::time::sleep(wait_time).await;
                        last_error = Some(e);
                        continue;
                    }
                    return Err(e.into());
                }
            }
        }

        Err(last_error.map(|e| e.into()).unwrap_or_else(|| {
            DiagError::GraphApiError(format!("GET {} failed after {} retries", url, MAX_RETRIES))
        }))
    }
}

// ============================================================================
// Pagination Helpers
// ============================================================================

/// Standard OData page with `value` and `@odata.nextLink`
#[derive(Debug, Deserialize)]
pub struct PaginatedResponse<T> {
    pub value: Vec<T>,
    #[serde(rename = "@odata.nextLink")]
    pub next_link: Option<String>,
}

impl GraphClient {
    /// Fetch every page of a v1.0 collection, following `@odata.nextLink`
    ///
    /// ```ignore
    /// let users: Vec<User> = client.get_all_pages("/users").await?;
    /// ```
    pub async fn get_all_pages<T: for<'de> Deserialize<'de>>(
        &self,
        endpoint: &str,
    ) -> Result<Vec<T>> {
        self.get_pages_limited(&self.url(&self.base_url, endpoint), 0)
            .await
    }

    /// Fetch every page of a beta collection
    pub async fn get_all_pages_beta<T: for<'de> Deserialize<'de>>(
        &self,
        endpoint: &str,
    ) -> Result<Vec<T>> {
        self.get_pages_limited(&self.url(&self.beta_url, endpoint), 0)
            .await
    }

    /// Fetch at most `max_pages` pages (0 = unlimited) starting at an absolute URL
    pub async fn get_pages_limited<T: for<'de> Deserialize<'de>>(
        &self,
        url: &str,
        max_pages: usize,
    ) -> Result<Vec<T>> {
        let mut all_items: Vec<T> = Vec::new();
        let mut current_url = url.to_string();
        let mut page_count = 0;

        loop {
            let response: PaginatedResponse<T> = self.get_url(&current_url).await?;
            all_items.extend(response.value);
            page_count += 1;

            if max_pages > 0 && page_count >= max_pages {
                tracing::debug!("Stopping after {} page(s)", page_count);
                break;
            }

            match response.next_link {
                Some(next) => current_url = next,
                None => break,
            }
        }

        Ok(all_items)
    }
}
