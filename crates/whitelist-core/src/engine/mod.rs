//! Core whitelist engine
//!
//! ## Architecture
//!
//! ```text
//! ┌─────────────┐  tick / trigger   ┌──────────────┐
//! │  Scheduler  │──────────────────▶│  Reconciler  │
//! └─────────────┘                   └──────────────┘
//!                                          │ fan-out
//!                      ┌───────────────────┼───────────────────┐
//!                      ▼                   ▼                   ▼
//!               ┌─────────────┐     ┌─────────────┐     ┌─────────────┐
//!               │ ListFetcher │     │ ListFetcher │ ... │ ListFetcher │
//!               └─────────────┘     └─────────────┘     └─────────────┘
//!                                          │ fan-in
//!                                          ▼
//!                              merge → compare → commit?
//!                                          │
//!                                          ▼
//!                                 ┌────────────────┐
//!                                 │ WhitelistStore │
//!                                 └────────────────┘
//! ```

pub mod merge;
pub mod reconciler;
pub mod scheduler;

pub use merge::{clean, merge, same_entries};
pub use reconciler::{Reconciler, Reconciliation, RefreshOutcome, RefreshReport};
pub use scheduler::{LifecycleState, PassRunner, Scheduler};

/// Events emitted by the whitelist manager
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum WhitelistEvent {
    /// Scheduler started
    Started {
        sources_count: usize,
    },

    /// Reconciliation pass started
    PassStarted,

    /// A source could not be fetched
    SourceFailed {
        url: String,
        error: String,
    },

    /// Reconciliation pass finished
    PassCompleted {
        report: RefreshReport,
    },

    /// The whitelist was replaced but could not be persisted
    WhitelistPersistFailed {
        error: String,
    },

    /// The configuration could not be saved
    ConfigPersistFailed {
        error: String,
    },

    /// Ids were added to the manual whitelist
    ManualEntriesAdded {
        ids: Vec<String>,
        by: String,
    },

    /// Scheduler stopped
    Stopped {
        reason: String,
    },
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_event_clone_eq() {
        let event = WhitelistEvent::SourceFailed {
            url: "https://lists.example/a.txt".to_string(),
            error: "timed out".to_string(),
        };

        assert_eq!(event.clone(), event);
    }
}
