//! Error types for the whitelist system
//!
//! This module defines all error types used throughout the crate.

use std::time::Duration;
use thiserror::Error;

/// Result type alias for whitelist operations
pub type Result<T> = std::result::Result<T, Error>;

/// Core error type for the whitelist system
#[derive(Error, Debug)]
pub enum Error {
    /// A remote list could not be fetched
    #[error("Failed to fetch {url}: {message}")]
    Fetch {
        /// Source URL
        url: String,
        /// Underlying cause
        message: String,
    },

    /// A remote list did not answer in time
    #[error("Fetching {url} timed out after {timeout:?}")]
    Timeout {
        /// Source URL
        url: String,
        /// Timeout that elapsed
        timeout: Duration,
    },

    /// A remote list answered with a non-success status
    #[error("Fetching {url} returned HTTP {status}")]
    HttpStatus {
        /// Source URL
        url: String,
        /// HTTP status code
        status: u16,
    },

    /// A remote list answered successfully but contained no entries
    #[error("Source {url} returned no entries")]
    EmptySource {
        /// Source URL
        url: String,
    },

    /// Whitelist store errors
    #[error("Whitelist store error: {0}")]
    WhitelistStore(String),

    /// Configuration store errors
    #[error("Config store error: {0}")]
    ConfigStore(String),

    /// User directory errors
    #[error("User directory error: {0}")]
    Directory(String),

    /// Configuration errors
    #[error("Configuration error: {0}")]
    Config(String),

    /// Invalid input
    #[error("Invalid input: {0}")]
    InvalidInput(String),

    /// Invoker lacks the required authorization level
    #[error("Permission denied: {0}")]
    PermissionDenied(String),

    /// Operation not allowed in the current lifecycle state
    #[error("Invalid state: {0}")]
    InvalidState(String),

    /// I/O errors
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// JSON serialization/deserialization errors
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    /// Generic error with context
    #[error("{0}")]
    Other(String),
}

impl Error {
    /// Create a fetch error for a source
    pub fn fetch(url: impl Into<String>, message: impl Into<String>) -> Self {
        Self::Fetch {
            url: url.into(),
            message: message.into(),
        }
    }

    /// Create a timeout error for a source
    pub fn timeout(url: impl Into<String>, timeout: Duration) -> Self {
        Self::Timeout {
            url: url.into(),
            timeout,
        }
    }

    /// Create a non-success status error for a source
    pub fn http_status(url: impl Into<String>, status: u16) -> Self {
        Self::HttpStatus {
            url: url.into(),
            status,
        }
    }

    /// Create an empty source error
    pub fn empty_source(url: impl Into<String>) -> Self {
        Self::EmptySource { url: url.into() }
    }

    /// Create a whitelist store error
    pub fn whitelist_store(msg: impl Into<String>) -> Self {
        Self::WhitelistStore(msg.into())
    }

    /// Create a config store error
    pub fn config_store(msg: impl Into<String>) -> Self {
        Self::ConfigStore(msg.into())
    }

    /// Create a user directory error
    pub fn directory(msg: impl Into<String>) -> Self {
        Self::Directory(msg.into())
    }

    /// Create a configuration error
    pub fn config(msg: impl Into<String>) -> Self {
        Self::Config(msg.into())
    }

    /// Create an invalid input error
    pub fn invalid_input(msg: impl Into<String>) -> Self {
        Self::InvalidInput(msg.into())
    }

    /// Create a permission denied error
    pub fn permission_denied(msg: impl Into<String>) -> Self {
        Self::PermissionDenied(msg.into())
    }

    /// Create an invalid state error
    pub fn invalid_state(msg: impl Into<String>) -> Self {
        Self::InvalidState(msg.into())
    }

    /// The source URL this error belongs to, if any
    pub fn source_url(&self) -> Option<&str> {
        match self {
            Self::Fetch { url, .. }
            | Self::Timeout { url, .. }
            | Self::HttpStatus { url, .. }
            | Self::EmptySource { url } => Some(url),
            _ => None,
        }
    }
}

/// Helper for converting anyhow::Error to our Error type
impl From<anyhow::Error> for Error {
    fn from(err: anyhow::Error) -> Self {
        Self::Other(err.to_string())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_source_failures_carry_url() {
        let err = Error::timeout("https://lists.example/subs.txt", Duration::from_secs(10));
        assert_eq!(err.source_url(), Some("https://lists.example/subs.txt"));
        assert_eq!(
            err.to_string(),
            "Fetching https://lists.example/subs.txt timed out after 10s"
        );

        let err = Error::whitelist_store("disk full");
        assert_eq!(err.source_url(), None);
    }
}
