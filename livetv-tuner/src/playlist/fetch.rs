//! Playlist retrieval over HTTP or from the local filesystem.

use std::time::Duration;

use log::{debug, info};
use tokio_util::sync::CancellationToken;

use livetv_model::{TunerError, TunerSourceConfig};

use crate::media_source::DEFAULT_USER_AGENT;

/// Timeout for a whole playlist download.
const FETCH_TIMEOUT_SECS: u64 = 60;

/// Downloads playlist documents.
///
/// No retry happens here; callers decide what to do with a failed fetch.
#[derive(Debug, Clone)]
pub struct PlaylistFetcher {
    client: reqwest::Client,
}

impl PlaylistFetcher {
    /// Create a fetcher with its own HTTP client.
    pub fn new() -> Result<Self, TunerError> {
        let client = reqwest::Client::builder()
            .timeout(Duration::from_secs(FETCH_TIMEOUT_SECS))
            .build()
            .map_err(|e| TunerError::CatalogueFetch(format!("failed to build HTTP client: {}", e)))?;
        Ok(Self { client })
    }

    /// Create a fetcher around an existing HTTP client.
    pub fn with_client(client: reqwest::Client) -> Self {
        Self { client }
    }

    /// Fetch the raw playlist bytes of a source.
    ///
    /// Returns [`TunerError::Cancelled`] as soon as `cancel` fires; the
    /// partially read body is discarded.
    pub async fn fetch(
        &self,
        source: &TunerSourceConfig,
        cancel: &CancellationToken,
    ) -> Result<Vec<u8>, TunerError> {
        source.validate()?;

        tokio::select! {
            biased;
            _ = cancel.cancelled() => {
                info!("[PlaylistFetcher] Fetch of {} cancelled", source.url);
                Err(TunerError::Cancelled)
            }
            result = self.fetch_inner(source) => result,
        }
    }

    async fn fetch_inner(&self, source: &TunerSourceConfig) -> Result<Vec<u8>, TunerError> {
        let location = source.url.trim();
        if is_http_url(location) {
            self.fetch_http(location, source.user_agent().unwrap_or(DEFAULT_USER_AGENT))
                .await
        } else {
            fetch_file(location).await
        }
    }

    async fn fetch_http(&self, url: &str, user_agent: &str) -> Result<Vec<u8>, TunerError> {
        debug!("[PlaylistFetcher] GET {}", url);
        let response = self
            .client
            .get(url)
            .header(reqwest::header::USER_AGENT, user_agent)
            .send()
            .await
            .map_err(|e| TunerError::CatalogueFetch(format!("{}: {}", url, e)))?;

        let status = response.status();
        if !status.is_success() {
            return Err(TunerError::CatalogueFetch(format!(
                "{}: HTTP status {}",
                url, status
            )));
        }

        let body = response
            .bytes()
            .await
            .map_err(|e| TunerError::CatalogueFetch(format!("{}: {}", url, e)))?;
        debug!("[PlaylistFetcher] Received {} bytes from {}", body.len(), url);
        Ok(body.to_vec())
    }
}

async fn fetch_file(location: &str) -> Result<Vec<u8>, TunerError> {
    let path = local_path(location);
    debug!("[PlaylistFetcher] Reading {}", path);
    tokio::fs::read(path)
        .await
        .map_err(|e| TunerError::CatalogueFetch(format!("{}: {}", path, e)))
}

fn is_http_url(location: &str) -> bool {
    let lower = location.get(..8).unwrap_or(location).to_ascii_lowercase();
    lower.starts_with("http://") || lower.starts_with("https://")
}

fn local_path(location: &str) -> &str {
    location
        .get(..7)
        .filter(|scheme| scheme.eq_ignore_ascii_case("file://"))
        .map(|_| &location[7..])
        .unwrap_or(location)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_is_http_url() {
        assert!(is_http_url("http://example.com/a.m3u"));
        assert!(is_http_url("HTTPS://example.com/a.m3u"));
        assert!(!is_http_url("/srv/a.m3u"));
        assert!(!is_http_url("file:///srv/a.m3u"));
        assert!(!is_http_url("ht"));
    }

    #[test]
    fn test_local_path() {
        assert_eq!(local_path("file:///srv/a.m3u"), "/srv/a.m3u");
        assert_eq!(local_path("/srv/a.m3u"), "/srv/a.m3u");
    }

    #[tokio::test]
    async fn test_missing_file_is_fetch_error() {
        let fetcher = PlaylistFetcher::new().unwrap();
        let source = TunerSourceConfig::m3u("local", "/nonexistent/livetv/list.m3u");
        let result = fetcher.fetch(&source, &CancellationToken::new()).await;
        assert!(matches!(result, Err(TunerError::CatalogueFetch(_))));
    }

    #[tokio::test]
    async fn test_cancelled_fetch() {
        let fetcher = PlaylistFetcher::new().unwrap();
        let source = TunerSourceConfig::m3u("local", "/nonexistent/livetv/list.m3u");
        let cancel = CancellationToken::new();
        cancel.cancel();

        let result = fetcher.fetch(&source, &cancel).await;
        assert_eq!(result, Err(TunerError::Cancelled));
    }
}
