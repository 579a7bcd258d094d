//! Upstream HTTP access.

use {
    anyhow::{Context, Result},
    async_trait::async_trait,
    reqwest::Client,
    std::time::Duration,
    url::Url,
};

/// The seam between the scheduler and the network: one fetch returns the
/// upstream's parsed JSON document.
#[async_trait]
pub trait FetchJson: Send + Sync {
    async fn fetch(&self, url: &Url) -> Result<serde_json::Value>;
}

/// reqwest-backed fetcher. The client carries the per-request deadline, so
/// exceeding it cancels only the affected fetch.
pub struct HttpFetcher {
    client: Client,
}

impl HttpFetcher {
    pub fn new(timeout: Duration) -> Result<Self> {
        let client = Client::builder()
            .timeout(timeout)
            .build()
            .context("building http client")?;
        Ok(Self { client })
    }
}

#[async_trait]
impl FetchJson for HttpFetcher {
    async fn fetch(&self, url: &Url) -> Result<serde_json::Value> {
        let response = self
            .client
            .get(url.clone())
            .send()
            .await?
            .error_for_status()?;
        response
            .json()
            .await
            .context("parsing upstream response as json")
    }
}
