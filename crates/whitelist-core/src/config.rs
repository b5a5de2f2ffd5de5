//! Configuration types for the whitelist system
//!
//! The plugin configuration is owned by the [`WhitelistManager`](crate::WhitelistManager),
//! mutated by operator edits or the `add` command, and saved through a
//! [`ConfigStore`](crate::ConfigStore) on every mutation.

use serde::{Deserialize, Serialize};
use std::time::Duration;

/// Lower bound applied to the refresh interval
pub const MIN_REFRESH_INTERVAL_SECS: u64 = 5;

/// Plugin configuration
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct WhitelistConfig {
    /// Links to remote lists containing SLG or SteamID64 ids, one per line
    #[serde(default)]
    pub whitelist_urls: Vec<String>,

    /// How often the whitelist is refreshed, in seconds
    ///
    /// Values below [`MIN_REFRESH_INTERVAL_SECS`] are accepted but the
    /// scheduler never waits less than that.
    #[serde(default = "default_refresh_interval_secs")]
    pub refresh_interval_secs: u64,

    /// Ids added by operators, independent of the remote lists
    #[serde(default)]
    pub manual_whitelist: Vec<String>,

    /// Timeout applied to each remote list fetch, in seconds
    #[serde(default = "default_fetch_timeout_secs")]
    pub fetch_timeout_secs: u64,

    /// Accept a successful response that contains no entries
    ///
    /// When false, an empty list is treated like a failed fetch so that a
    /// blank page cannot wipe the whitelist.
    #[serde(default)]
    pub allow_empty_sources: bool,

    /// Capacity of the event channel
    ///
    /// When full, new events are dropped (with a warning log).
    #[serde(default = "default_event_channel_capacity")]
    pub event_channel_capacity: usize,
}

impl WhitelistConfig {
    /// Create a new configuration with defaults
    pub fn new() -> Self {
        Self {
            whitelist_urls: Vec::new(),
            refresh_interval_secs: default_refresh_interval_secs(),
            manual_whitelist: Vec::new(),
            fetch_timeout_secs: default_fetch_timeout_secs(),
            allow_empty_sources: false,
            event_channel_capacity: default_event_channel_capacity(),
        }
    }

    /// Add a remote list URL
    pub fn with_url(mut self, url: impl Into<String>) -> Self {
        self.whitelist_urls.push(url.into());
        self
    }

    /// Add a manual entry
    pub fn with_manual_entry(mut self, id: impl Into<String>) -> Self {
        self.manual_whitelist.push(id.into());
        self
    }

    /// Set the refresh interval in seconds
    pub fn with_refresh_interval_secs(mut self, secs: u64) -> Self {
        self.refresh_interval_secs = secs;
        self
    }

    /// Set the per-source fetch timeout in seconds
    pub fn with_fetch_timeout_secs(mut self, secs: u64) -> Self {
        self.fetch_timeout_secs = secs;
        self
    }

    /// Interval the scheduler actually waits between passes
    pub fn effective_refresh_interval(&self) -> Duration {
        Duration::from_secs(self.refresh_interval_secs.max(MIN_REFRESH_INTERVAL_SECS))
    }

    /// Timeout applied to each source fetch
    pub fn fetch_timeout(&self) -> Duration {
        Duration::from_secs(self.fetch_timeout_secs)
    }

    /// Validate the configuration
    pub fn validate(&self) -> Result<(), crate::Error> {
        if self.fetch_timeout_secs == 0 {
            return Err(crate::Error::config("fetch_timeout_secs must be > 0"));
        }

        if self.event_channel_capacity == 0 {
            return Err(crate::Error::config("event_channel_capacity must be > 0"));
        }

        for url in &self.whitelist_urls {
            let url = url.trim();
            if url.is_empty() {
                return Err(crate::Error::config("Whitelist URL cannot be empty"));
            }
            if !url.starts_with("http://") && !url.starts_with("https://") {
                return Err(crate::Error::config(format!(
                    "Whitelist URL must use HTTP or HTTPS scheme. Got: {}",
                    url
                )));
            }
        }

        Ok(())
    }
}

impl Default for WhitelistConfig {
    fn default() -> Self {
        Self::new()
    }
}

fn default_refresh_interval_secs() -> u64 {
    300
}

fn default_fetch_timeout_secs() -> u64 {
    10
}

fn default_event_channel_capacity() -> usize {
    256
}
