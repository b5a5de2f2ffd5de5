//! Fetch-merge-compare logic for one reconciliation pass
//!
//! ## Pass Flow
//!
//! 1. No sources configured: skip
//! 2. Fetch every source concurrently, each under its own timeout
//! 3. Clean fetched lines and manual entries
//! 4. Merge; a failed source switches to the add-only branch
//! 5. Compare with the current whitelist, ignoring order
//!
//! Committing the result is left to the caller, which holds the
//! single-flight lock around the whole sequence.

use super::merge::{clean, merge, same_entries};
use crate::error::{Error, Result};
use crate::traits::ListFetcher;
use chrono::{DateTime, Utc};
use std::sync::Arc;
use std::time::Duration;
use tokio::task::JoinSet;
use tracing::{debug, error, warn};

/// Default per-source fetch timeout
pub const DEFAULT_FETCH_TIMEOUT: Duration = Duration::from_secs(10);

/// Result of reconciling the sources against the current whitelist
#[derive(Debug)]
pub struct Reconciliation {
    /// Candidate whitelist (equal to the current one when skipped)
    pub snapshot: Vec<String>,
    /// Whether the candidate differs from the current whitelist
    pub changed: bool,
    /// True when no sources were configured
    pub skipped: bool,
    /// One entry per source that failed
    pub failures: Vec<Error>,
}

impl Reconciliation {
    /// Whether at least one source failed
    pub fn any_fetch_failed(&self) -> bool {
        !self.failures.is_empty()
    }
}

/// Fetches, merges and compares remote lists
#[derive(Clone)]
pub struct Reconciler {
    fetcher: Arc<dyn ListFetcher>,
    fetch_timeout: Duration,
    allow_empty_sources: bool,
}

impl Reconciler {
    /// Create a reconciler with the default timeout
    pub fn new(fetcher: Arc<dyn ListFetcher>) -> Self {
        Self {
            fetcher,
            fetch_timeout: DEFAULT_FETCH_TIMEOUT,
            allow_empty_sources: false,
        }
    }

    /// Set the per-source timeout
    pub fn with_fetch_timeout(mut self, timeout: Duration) -> Self {
        self.fetch_timeout = timeout;
        self
    }

    /// Accept successful responses with no entries as authoritative
    pub fn with_allow_empty_sources(mut self, allow: bool) -> Self {
        self.allow_empty_sources = allow;
        self
    }

    /// Reconcile sources and manual entries against the current whitelist
    ///
    /// # Parameters
    ///
    /// - `sources`: Remote list URLs
    /// - `manual`: Operator maintained entries
    /// - `current`: The whitelist as it is now
    pub async fn reconcile(
        &self,
        sources: &[String],
        manual: &[String],
        current: &[String],
    ) -> Reconciliation {
        if sources.is_empty() {
            debug!("No whitelist sources configured, skipping");
            return Reconciliation {
                snapshot: current.to_vec(),
                changed: false,
                skipped: true,
                failures: Vec::new(),
            };
        }

        debug!(
            "Fetching {} source(s) with {} fetcher",
            sources.len(),
            self.fetcher.name()
        );

        let mut fetched = Vec::new();
        let mut failures = Vec::new();

        for (source, result) in sources.iter().zip(self.fetch_all(sources).await) {
            match result {
                Ok(lines) => {
                    debug!("Fetched {} lines from {}", lines.len(), source);
                    fetched.extend(lines);
                }
                Err(e) => {
                    warn!("Error when fetching whitelist {}: {}", source, e);
                    failures.push(e);
                }
            }
        }

        let snapshot = merge(current, &fetched, manual, !failures.is_empty());
        // The snapshot is deduplicated, so a length mismatch means duplicates in `current`
        let changed = !same_entries(current, &snapshot) || current.len() != snapshot.len();

        Reconciliation {
            snapshot,
            changed,
            skipped: false,
            failures,
        }
    }

    /// Fetch every source concurrently and return results in source order
    async fn fetch_all(&self, sources: &[String]) -> Vec<Result<Vec<String>>> {
        let mut tasks = JoinSet::new();

        for (index, source) in sources.iter().enumerate() {
            let fetcher = Arc::clone(&self.fetcher);
            let source = source.clone();
            let timeout = self.fetch_timeout;
            let allow_empty = self.allow_empty_sources;

            tasks.spawn(async move {
                let fetch = fetcher.fetch(&source, timeout);
                let result = match tokio::time::timeout(timeout, fetch).await {
                    Ok(Ok(lines)) if !allow_empty && clean(&lines).is_empty() => {
                        Err(Error::empty_source(&source))
                    }
                    Ok(result) => result,
                    Err(_) => Err(Error::timeout(&source, timeout)),
                };
                (index, result)
            });
        }

        let mut results: Vec<Option<Result<Vec<String>>>> = sources.iter().map(|_| None).collect();

        while let Some(joined) = tasks.join_next().await {
            match joined {
                Ok((index, result)) => results[index] = Some(result),
                Err(e) => error!("Fetch task failed: {}", e),
            }
        }

        sources
            .iter()
            .zip(results)
            .map(|(source, result)| {
                result.unwrap_or_else(|| Err(Error::fetch(source, "fetch task did not complete")))
            })
            .collect()
    }
}

/// What a pass did to the whitelist
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RefreshOutcome {
    /// No sources configured
    Skipped,
    /// Entry set identical to the current whitelist
    Unchanged {
        /// Number of whitelisted entries
        count: usize,
    },
    /// Whitelist replaced
    Updated {
        /// Entries before the pass
        old_count: usize,
        /// Entries after the pass
        new_count: usize,
    },
    /// Pass could not read or replace the whitelist
    Aborted {
        /// Why the pass stopped
        reason: String,
    },
}

/// Status of a completed pass, reported to callers and logs
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RefreshReport {
    /// What happened to the whitelist
    pub outcome: RefreshOutcome,
    /// Sources that failed, with their cause
    pub failed_sources: Vec<(String, String)>,
    /// When the pass finished
    pub completed_at: DateTime<Utc>,
}

impl RefreshReport {
    /// Create a report stamped with the current time
    pub fn new(outcome: RefreshOutcome, failures: &[Error]) -> Self {
        Self {
            outcome,
            failed_sources: failures
                .iter()
                .map(|e| {
                    let url = e.source_url().unwrap_or("unknown").to_string();
                    (url, e.to_string())
                })
                .collect(),
            completed_at: Utc::now(),
        }
    }

    /// Whether the whitelist was replaced
    pub fn changed(&self) -> bool {
        matches!(self.outcome, RefreshOutcome::Updated { .. })
    }
}

impl std::fmt::Display for RefreshReport {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match &self.outcome {
            RefreshOutcome::Skipped => write!(f, "No whitelist sources configured, skipping.")?,
            RefreshOutcome::Unchanged { .. } => {
                write!(f, "Refreshed whitelist ids! No change in list.")?
            }
            RefreshOutcome::Updated {
                old_count,
                new_count,
            } => write!(
                f,
                "Refreshed whitelist ids! Old amount: {} whitelisted, New amount: {} whitelisted",
                old_count, new_count
            )?,
            RefreshOutcome::Aborted { reason } => {
                write!(f, "Whitelist refresh failed: {}", reason)?
            }
        }

        if !self.failed_sources.is_empty() {
            write!(
                f,
                " ({} source(s) failed, existing entries kept)",
                self.failed_sources.len()
            )?;
        }

        Ok(())
    }
}
