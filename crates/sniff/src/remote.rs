use std::time::Duration;

use exn::ResultExt;
use reqwest::StatusCode;
use reqwest::header::RANGE;
use tracing::instrument;

use crate::error::{ErrorKind, Result};
use crate::{DEFAULT_EXTENSION, detect_from_bytes, extension_from_path};

/// Sniffs remote files by fetching only their first few bytes.
#[derive(Debug, Clone)]
pub struct RangeSniffer {
    client: reqwest::Client,
    window: usize,
    read_timeout: Duration,
}

impl RangeSniffer {
    /// Build a sniffer with its own HTTP client.
    pub fn new(window: usize, connect_timeout: Duration, read_timeout: Duration) -> Result<Self> {
        let client = reqwest::Client::builder()
            .connect_timeout(connect_timeout)
            .build()
            .or_raise(|| ErrorKind::Client)?;
        Ok(Self::with_client(client, window, read_timeout))
    }

    /// Build a sniffer sharing an existing client (and its connection pool).
    #[must_use]
    pub fn with_client(client: reqwest::Client, window: usize, read_timeout: Duration) -> Self {
        Self { client, window: window.max(1), read_timeout }
    }

    #[must_use]
    pub fn window(&self) -> usize {
        self.window
    }

    /// Request the first `window` bytes of `url` and run them through
    /// [`detect_from_bytes`].
    ///
    /// Servers that ignore the `Range` header and answer `200 OK` are fine:
    /// reading stops once the window is filled and the connection is dropped.
    /// Anything else (non-success status, transport error, timeout) yields
    /// `None`.
    #[instrument(skip(self))]
    pub async fn detect_from_url_range(&self, url: &str) -> Option<&'static str> {
        match tokio::time::timeout(self.read_timeout, self.fetch_head(url)).await {
            Ok(Ok(head)) => {
                let detected = detect_from_bytes(&head);
                tracing::debug!(bytes = head.len(), ?detected, "ranged sniff complete");
                detected
            },
            Ok(Err(error)) => {
                tracing::debug!(%error, "ranged sniff failed");
                None
            },
            Err(_) => {
                tracing::debug!(timeout = ?self.read_timeout, "ranged sniff timed out");
                None
            },
        }
    }

    async fn fetch_head(&self, url: &str) -> std::result::Result<Vec<u8>, reqwest::Error> {
        let mut response = self
            .client
            .get(url)
            .header(RANGE, format!("bytes=0-{}", self.window - 1))
            .send()
            .await?;
        if !matches!(response.status(), StatusCode::OK | StatusCode::PARTIAL_CONTENT) {
            tracing::debug!(status = %response.status(), "ranged sniff rejected");
            return Ok(Vec::new());
        }
        let mut head = Vec::with_capacity(self.window);
        while head.len() < self.window {
            match response.chunk().await? {
                Some(chunk) => head.extend_from_slice(&chunk),
                None => break,
            }
        }
        head.truncate(self.window);
        Ok(head)
    }

    /// Best guess at the extension of a path or URL; never fails.
    ///
    /// Trusted extensions from the path or query win outright. Remote
    /// references with nothing to go on are sniffed over the network, and
    /// everything else falls back to [`DEFAULT_EXTENSION`].
    pub async fn extension_for_reference(&self, reference: &str) -> &'static str {
        if let Some(ext) = extension_from_path(reference) {
            return ext;
        }
        if is_http(reference)
            && let Some(ext) = self.detect_from_url_range(reference).await
        {
            return ext;
        }
        DEFAULT_EXTENSION
    }
}

fn is_http(reference: &str) -> bool {
    let lower = reference.get(..8).unwrap_or(reference).to_ascii_lowercase();
    lower.starts_with("http://") || lower.starts_with("https://")
}
