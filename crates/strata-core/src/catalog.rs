//! Catalog refresh notifications.
//!
//! After a table write commits, downstream catalogs are asked to re-crawl the
//! table. The request is fire-and-forget: a failure is logged and reported but
//! never undoes the data write that preceded it.

use std::time::Duration;

use async_trait::async_trait;
use reqwest::StatusCode;

use crate::error::{Error, Result};

const DEFAULT_REQUEST_TIMEOUT: Duration = Duration::from_secs(30);

/// Outcome of a crawler start request.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CrawlerStart {
    /// The crawler was started.
    Started,
    /// The crawler was already running; nothing new was started.
    AlreadyRunning,
}

/// Triggers catalog crawlers by name.
#[async_trait]
pub trait CatalogRefresher: Send + Sync {
    /// Requests a run of the crawler named `crawler`.
    async fn start_crawler(&self, crawler: &str) -> Result<CrawlerStart>;
}

/// Refresher that only logs; used when no catalog endpoint is configured.
#[derive(Debug, Clone, Copy, Default)]
pub struct LoggingRefresher;

#[async_trait]
impl CatalogRefresher for LoggingRefresher {
    async fn start_crawler(&self, crawler: &str) -> Result<CrawlerStart> {
        tracing::info!(crawler, "catalog refresh requested (no catalog endpoint configured)");
        Ok(CrawlerStart::Started)
    }
}

/// HTTP client for a crawler service.
///
/// Issues `POST {base_url}/crawlers/{name}/start`. A `409 Conflict` response
/// means the crawler is already running.
#[derive(Clone, Debug)]
pub struct HttpCrawlerClient {
    base_url: String,
    client: reqwest::Client,
}

impl HttpCrawlerClient {
    /// Creates a new client targeting the given base URL.
    #[must_use]
    pub fn new(base_url: impl Into<String>) -> Self {
        let client = reqwest::Client::builder()
            .timeout(DEFAULT_REQUEST_TIMEOUT)
            .build()
            .unwrap_or_else(|_| reqwest::Client::new());
        Self {
            base_url: base_url.into(),
            client,
        }
    }

    fn start_url(&self, crawler: &str) -> String {
        format!(
            "{}/crawlers/{crawler}/start",
            self.base_url.trim_end_matches('/')
        )
    }
}

#[async_trait]
impl CatalogRefresher for HttpCrawlerClient {
    async fn start_crawler(&self, crawler: &str) -> Result<CrawlerStart> {
        let response = self
            .client
            .post(self.start_url(crawler))
            .send()
            .await
            .map_err(|e| Error::storage_with_source("crawler start request failed", e))?;

        let status = response.status();
        if status.is_success() {
            return Ok(CrawlerStart::Started);
        }
        if status == StatusCode::CONFLICT {
            return Ok(CrawlerStart::AlreadyRunning);
        }

        let body = response.text().await.unwrap_or_default();
        Err(Error::storage(format!(
            "crawler {crawler} failed to start ({status}): {body}"
        )))
    }
}

/// Requests a crawler run, logging instead of failing.
///
/// Returns `None` when the request failed.
pub async fn refresh_catalog(
    refresher: &dyn CatalogRefresher,
    crawler: &str,
) -> Option<CrawlerStart> {
    match refresher.start_crawler(crawler).await {
        Ok(CrawlerStart::Started) => {
            tracing::info!(crawler, "crawler started");
            Some(CrawlerStart::Started)
        }
        Ok(CrawlerStart::AlreadyRunning) => {
            tracing::info!(crawler, "crawler is already running");
            Some(CrawlerStart::AlreadyRunning)
        }
        Err(error) => {
            tracing::warn!(crawler, %error, "catalog refresh failed; committed data is unaffected");
            None
        }
    }
}

#[cfg(test)]
mod tests {
    use axum::Router;
    use axum::extract::Path;
    use axum::routing::post;

    use super::*;

    async fn spawn_crawler_server(status: StatusCode) -> String {
        let app = Router::new().route(
            "/crawlers/:name/start",
            post(move |Path(_name): Path<String>| async move { (status, "") }),
        );

        let listener = tokio::net::TcpListener::bind("127.0.0.1:0")
            .await
            .expect("bind");
        let addr = listener.local_addr().expect("local addr");
        tokio::spawn(async move {
            let _ = axum::serve(listener, app).await;
        });

        format!("http://{addr}")
    }

    #[tokio::test]
    async fn started_on_success() {
        let base = spawn_crawler_server(StatusCode::OK).await;
        let client = HttpCrawlerClient::new(base);
        assert_eq!(
            client.start_crawler("dimCustomersScdCrawler").await.unwrap(),
            CrawlerStart::Started
        );
    }

    #[tokio::test]
    async fn conflict_means_already_running() {
        let base = spawn_crawler_server(StatusCode::CONFLICT).await;
        let client = HttpCrawlerClient::new(format!("{base}/"));
        assert_eq!(
            client.start_crawler("c").await.unwrap(),
            CrawlerStart::AlreadyRunning
        );
    }

    #[tokio::test]
    async fn server_error_is_swallowed_by_refresh_catalog() {
        let base = spawn_crawler_server(StatusCode::INTERNAL_SERVER_ERROR).await;
        let client = HttpCrawlerClient::new(base);
        assert!(client.start_crawler("c").await.is_err());
        assert_eq!(refresh_catalog(&client, "c").await, None);
    }

    #[tokio::test]
    async fn logging_refresher_always_starts() {
        assert_eq!(
            refresh_catalog(&LoggingRefresher, "c").await,
            Some(CrawlerStart::Started)
        );
    }
}
