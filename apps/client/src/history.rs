//! Chart backfill client for the controller's `/data` endpoints

use std::time::Duration;

use reqwest::Client;
use thermo_protocol::HistoryRecord;
use tracing::debug;
use url::Url;

use crate::error::{ClientError, ClientResult};

/// Maximum error body size kept in an error
const MAX_ERROR_BODY_SIZE: usize = 1000;

/// Polls history records, remembering the newest timestamp seen
#[derive(Debug, Clone)]
pub struct HistoryClient {
    http_client: Client,
    /// Controller base URL, always ending in `/`
    base_url: Url,
    /// Newest record time returned so far
    last_seen: Option<f64>,
}

impl HistoryClient {
    pub fn new(base_url: Url) -> ClientResult<Self> {
        let http_client = Client::builder()
            .timeout(Duration::from_secs(10))
            .connect_timeout(Duration::from_secs(5))
            .build()?;
        Ok(Self::with_client(base_url, http_client))
    }

    /// Create a client with a custom HTTP client (for testing)
    pub fn with_client(mut base_url: Url, http_client: Client) -> Self {
        if !base_url.path().ends_with('/') {
            let path = format!("{}/", base_url.path());
            base_url.set_path(&path);
        }
        Self {
            http_client,
            base_url,
            last_seen: None,
        }
    }

    pub fn base_url(&self) -> &Url {
        &self.base_url
    }

    pub fn last_seen(&self) -> Option<f64> {
        self.last_seen
    }

    /// Every record the controller holds, oldest first
    pub async fn fetch_all(&self) -> ClientResult<Vec<HistoryRecord>> {
        self.get(self.join("data")?).await
    }

    /// Records strictly newer than `since` (epoch seconds)
    pub async fn fetch_since(&self, since: f64) -> ClientResult<Vec<HistoryRecord>> {
        self.get(self.join(&format!("data/{}", since))?).await
    }

    /// Fetch what is new since the last poll
    ///
    /// The first poll fetches everything.
    pub async fn poll(&mut self) -> ClientResult<Vec<HistoryRecord>> {
        let records = match self.last_seen {
            Some(since) => self.fetch_since(since).await?,
            None => self.fetch_all().await?,
        };

        if let Some(newest) = records
            .iter()
            .map(|record| record.time)
            .filter(|time| time.is_finite())
            .reduce(f64::max)
        {
            self.last_seen = Some(self.last_seen.map_or(newest, |seen| seen.max(newest)));
        }

        debug!(count = records.len(), last_seen = ?self.last_seen, "History polled");
        Ok(records)
    }

    fn join(&self, path: &str) -> ClientResult<Url> {
        self.base_url
            .join(path)
            .map_err(|e| ClientError::InvalidUrl(format!("{}: {}", path, e)))
    }

    async fn get(&self, url: Url) -> ClientResult<Vec<HistoryRecord>> {
        let response = self.http_client.get(url).send().await?;

        if !response.status().is_success() {
            let status = response.status().as_u16();
            let mut body = response.text().await.unwrap_or_default();
            if body.len() > MAX_ERROR_BODY_SIZE {
                let cut = (0..=MAX_ERROR_BODY_SIZE)
                    .rev()
                    .find(|i| body.is_char_boundary(*i))
                    .unwrap_or(0);
                body.truncate(cut);
            }
            return Err(ClientError::HistoryStatus { status, body });
        }

        Ok(response.json().await?)
    }
}
