// # HTTP List Fetcher
//
// This crate provides the production ListFetcher for whitelist sync.
//
// ## Behavior
//
// - One GET per source, bounded by the per-fetch timeout
// - Any non-2xx status is a failure for that source
// - The body is split into lines on `\r\n`, `\r` or `\n`
//
// Cleaning (trim, drop blanks, dedupe) happens in the reconciler, so this
// fetcher returns lines exactly as served.

use async_trait::async_trait;
use std::time::Duration;
use whitelist_core::traits::{ListFetcher, split_lines};
use whitelist_core::{Error, Result};

/// User agent sent with every request
pub const USER_AGENT: &str = concat!("whitelist-sync/", env!("CARGO_PKG_VERSION"));

/// ListFetcher over HTTP(S)
#[derive(Debug, Clone)]
pub struct HttpListFetcher {
    client: reqwest::Client,
}

impl HttpListFetcher {
    /// Create a fetcher with a default client
    pub fn new() -> Result<Self> {
        let client = reqwest::Client::builder()
            .user_agent(USER_AGENT)
            .build()
            .map_err(|e| Error::config(format!("Failed to build HTTP client: {}", e)))?;
        Ok(Self { client })
    }

    /// Create a fetcher over an existing client
    pub fn with_client(client: reqwest::Client) -> Self {
        Self { client }
    }

    fn map_error(source: &str, timeout: Duration, e: reqwest::Error) -> Error {
        if e.is_timeout() {
            Error::timeout(source, timeout)
        } else if let Some(status) = e.status() {
            Error::http_status(source, status.as_u16())
        } else {
            Error::fetch(source, e.to_string())
        }
    }
}

#[async_trait]
impl ListFetcher for HttpListFetcher {
    async fn fetch(&self, source: &str, timeout: Duration) -> Result<Vec<String>> {
        tracing::debug!("Fetching whitelist source {}", source);

        let response = self
            .client
            .get(source)
            .timeout(timeout)
            .send()
            .await
            .map_err(|e| Self::map_error(source, timeout, e))?;

        let status = response.status();
        if !status.is_success() {
            return Err(Error::http_status(source, status.as_u16()));
        }

        let body = response
            .text()
            .await
            .map_err(|e| Self::map_error(source, timeout, e))?;

        let lines = split_lines(&body);
        tracing::debug!("Fetched {} line(s) from {}", lines.len(), source);
        Ok(lines)
    }

    fn name(&self) -> &str {
        "http"
    }
}
