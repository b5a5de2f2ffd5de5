// # List Fetcher Trait
//
// Defines the interface for fetching one remote whitelist.
//
// ## Implementations
//
// - HTTP(S): `whitelist-source-http` crate
//
// ## Usage
//
// ```rust,ignore
// use whitelist_core::ListFetcher;
// use std::time::Duration;
//
// #[tokio::main]
// async fn main() -> anyhow::Result<()> {
//     let fetcher = /* ListFetcher implementation */;
//
//     let lines = fetcher
//         .fetch("https://lists.example/subscribers.txt", Duration::from_secs(10))
//         .await?;
//     println!("{} raw lines", lines.len());
//
//     Ok(())
// }
// ```

use async_trait::async_trait;
use std::time::Duration;

/// Trait for remote list fetchers
///
/// A fetcher turns one source URL into the raw lines of its body. It does
/// not clean, deduplicate or merge anything; that belongs to the
/// [`Reconciler`](crate::Reconciler).
///
/// # Failure as a value
///
/// Network errors, timeouts and non-success statuses are returned as
/// `Err`, carrying the source URL. Implementations must never panic on a
/// bad response and must not write any state.
///
/// # Timeouts
///
/// Implementations should honour `timeout`. The reconciler also wraps every
/// call in its own `tokio::time::timeout`, so a fetcher that ignores it
/// cannot stall a pass.
#[async_trait]
pub trait ListFetcher: Send + Sync {
    /// Fetch a remote list
    ///
    /// # Parameters
    ///
    /// - `source`: The list URL
    /// - `timeout`: Upper bound for the whole request
    ///
    /// # Returns
    ///
    /// - `Ok(Vec<String>)`: Raw lines of the body, see [`split_lines`]
    /// - `Err(Error)`: Network failure, timeout or non-success status
    async fn fetch(&self, source: &str, timeout: Duration) -> Result<Vec<String>, crate::Error>;

    /// Short name used in logs
    fn name(&self) -> &str {
        "fetcher"
    }
}

/// Split a response body into lines on any of `\r\n`, `\r` or `\n`
///
/// Empty lines are kept; cleaning happens later.
pub fn split_lines(body: &str) -> Vec<String> {
    let mut lines = Vec::new();
    let mut rest = body;

    while let Some(pos) = rest.find(['\r', '\n']) {
        lines.push(rest[..pos].to_string());
        let skip = if rest[pos..].starts_with("\r\n") { 2 } else { 1 };
        rest = &rest[pos + skip..];
    }
    lines.push(rest.to_string());

    lines
}
