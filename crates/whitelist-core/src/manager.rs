//! Whitelist manager service
//!
//! The [`WhitelistManager`] owns the configuration, the collaborator handles
//! and the scheduler. It is constructed explicitly and shared by `Arc` with
//! whatever registers commands and lifecycle hooks.
//!
//! ## Lifecycle
//!
//! 1. Create with [`WhitelistManager::new()`] or [`WhitelistManager::load()`]
//! 2. Start the periodic loop with [`Plugin::start()`]
//! 3. Serve `refresh` and `add` requests from any task
//! 4. Stop with [`Plugin::stop()`]
//!
//! Every pass, whether it comes from the timer, a command or a config
//! change, runs under one lock, so passes never overlap.

use crate::config::WhitelistConfig;
use crate::engine::merge::clean;
use crate::engine::{
    LifecycleState, PassRunner, Reconciler, RefreshOutcome, RefreshReport, Scheduler,
    WhitelistEvent,
};
use crate::error::{Error, Result};
use crate::traits::{
    ConfigStore, DirectoryUser, IdKind, ListFetcher, Plugin, UserDirectory, WhitelistStore,
};
use async_trait::async_trait;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::{Mutex, RwLock, mpsc};
use tracing::{debug, error, info, trace, warn};

/// Result of an `add` request
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum AddOutcome {
    /// The input matched a known user
    Resolved {
        /// The matched user
        user: DirectoryUser,
        /// Ids that were not on the manual list before
        added: Vec<String>,
    },

    /// The input matched nobody and was stored as typed
    Unresolved {
        /// The trimmed input
        input: String,
        /// What the input looks like
        kind: IdKind,
        /// False if the raw input was already on the manual list
        added: bool,
    },
}

/// Whitelist reconciliation service
pub struct WhitelistManager {
    inner: Arc<ManagerInner>,
    scheduler: Scheduler,
}

struct ManagerInner {
    config: RwLock<WhitelistConfig>,
    config_store: Arc<dyn ConfigStore>,
    whitelist: Arc<dyn WhitelistStore>,
    directory: Arc<dyn UserDirectory>,
    fetcher: Arc<dyn ListFetcher>,
    pass_lock: Mutex<()>,
    last_report: std::sync::Mutex<Option<RefreshReport>>,
    event_tx: mpsc::Sender<WhitelistEvent>,
}

impl WhitelistManager {
    /// Create a new manager
    ///
    /// # Parameters
    ///
    /// - `fetcher`: Remote list fetcher
    /// - `whitelist`: The host's authoritative whitelist
    /// - `config_store`: Where configuration changes are saved
    /// - `directory`: User lookup for the `add` command
    /// - `config`: Initial configuration
    ///
    /// # Returns
    ///
    /// A tuple of (manager, event_receiver) where event_receiver yields manager events
    pub fn new(
        fetcher: Arc<dyn ListFetcher>,
        whitelist: Arc<dyn WhitelistStore>,
        config_store: Arc<dyn ConfigStore>,
        directory: Arc<dyn UserDirectory>,
        config: WhitelistConfig,
    ) -> Result<(Self, mpsc::Receiver<WhitelistEvent>)> {
        config.validate()?;

        let (tx, rx) = mpsc::channel(config.event_channel_capacity);

        let inner = ManagerInner {
            config: RwLock::new(config),
            config_store,
            whitelist,
            directory,
            fetcher,
            pass_lock: Mutex::new(()),
            last_report: std::sync::Mutex::new(None),
            event_tx: tx,
        };

        let manager = Self {
            inner: Arc::new(inner),
            scheduler: Scheduler::new(),
        };

        Ok((manager, rx))
    }

    /// Create a manager with the configuration loaded from `config_store`
    pub async fn load(
        fetcher: Arc<dyn ListFetcher>,
        whitelist: Arc<dyn WhitelistStore>,
        config_store: Arc<dyn ConfigStore>,
        directory: Arc<dyn UserDirectory>,
    ) -> Result<(Self, mpsc::Receiver<WhitelistEvent>)> {
        let config = config_store.load().await?;
        Self::new(fetcher, whitelist, config_store, directory, config)
    }

    /// Snapshot of the current configuration
    pub async fn config(&self) -> WhitelistConfig {
        self.inner.config.read().await.clone()
    }

    /// Report of the most recent pass
    pub fn last_report(&self) -> Option<RefreshReport> {
        self.inner
            .last_report
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .clone()
    }

    /// Current scheduler state
    pub fn lifecycle_state(&self) -> LifecycleState {
        self.scheduler.state()
    }

    /// Run a pass now and return its report
    ///
    /// Waits for any pass already in progress. Afterwards the periodic
    /// timer starts over from a full interval.
    pub async fn refresh(&self) -> RefreshReport {
        let report = self.inner.run_pass().await;
        if self.scheduler.state() == LifecycleState::Running {
            self.scheduler.rearm();
        }
        report
    }

    /// Wake the background loop so it runs a pass soon
    ///
    /// Does nothing while the scheduler is stopped.
    pub fn request_refresh(&self) {
        if self.scheduler.state() == LifecycleState::Running {
            self.scheduler.trigger();
        }
    }

    /// Add a player to the manual whitelist
    ///
    /// The input may be a display name, SteamID64, SLG id or account id.
    /// A known user contributes all of their whitelistable ids. Unknown input
    /// is stored as typed, on a best-effort basis.
    ///
    /// # Parameters
    ///
    /// - `invoker`: Name of whoever asked, for logs and events
    /// - `input`: The identifier as typed
    pub async fn add(&self, invoker: &str, input: &str) -> Result<AddOutcome> {
        let input = input.trim();
        if input.is_empty() {
            return Err(Error::invalid_input("Identifier cannot be empty"));
        }

        let resolution = self.inner.directory.resolve(input).await?;

        let outcome = match resolution.user {
            Some(user) => {
                let added = self
                    .inner
                    .add_manual_entries(&user.whitelist_ids(), invoker)
                    .await;
                info!(
                    "{} whitelisted {} by {} ({} new id(s))",
                    invoker,
                    user.name,
                    resolution.kind,
                    added.len()
                );
                AddOutcome::Resolved { user, added }
            }
            None => {
                let added = self
                    .inner
                    .add_manual_entries(&[input.to_string()], invoker)
                    .await;
                info!(
                    "{} added unmatched {} '{}' to the manual whitelist",
                    invoker, resolution.kind, input
                );
                AddOutcome::Unresolved {
                    input: input.to_string(),
                    kind: resolution.kind,
                    added: !added.is_empty(),
                }
            }
        };

        let changed = match &outcome {
            AddOutcome::Resolved { added, .. } => !added.is_empty(),
            AddOutcome::Unresolved { added, .. } => *added,
        };
        if changed {
            self.request_refresh();
        }

        Ok(outcome)
    }

    /// Replace the configuration as an operator edit would
    ///
    /// The new configuration is validated, saved, and followed by an
    /// immediate pass. An invalid configuration is rejected and the current
    /// one stays in effect.
    ///
    /// `event_channel_capacity` only takes effect at construction; a
    /// different value here is replaced by the running one.
    pub async fn update_config(&self, mut config: WhitelistConfig) -> Result<()> {
        config.validate()?;
        {
            let mut current = self.inner.config.write().await;
            if config.event_channel_capacity != current.event_channel_capacity {
                warn!(
                    "event_channel_capacity changes need a restart, keeping {}",
                    current.event_channel_capacity
                );
                config.event_channel_capacity = current.event_channel_capacity;
            }
            *current = config;
        }
        self.on_config_changed().await
    }

    /// Re-read the configuration from the config store and apply it
    pub async fn reload(&self) -> Result<()> {
        let config = self.inner.config_store.load().await?;
        info!(
            "Reloaded whitelist config: {} source(s), {} manual entries",
            config.whitelist_urls.len(),
            config.manual_whitelist.len()
        );
        self.update_config(config).await
    }
}

#[async_trait]
impl Plugin for WhitelistManager {
    fn name(&self) -> &str {
        "Whitelist Sync"
    }

    async fn start(&self) -> Result<()> {
        let runner: Arc<dyn PassRunner> = self.inner.clone();
        self.scheduler.start(runner).await?;

        let sources_count = self.inner.config.read().await.whitelist_urls.len();
        info!("Whitelist manager started with {} source(s)", sources_count);
        self.inner.emit_event(WhitelistEvent::Started { sources_count });
        Ok(())
    }

    async fn stop(&self) -> Result<()> {
        self.scheduler.stop().await?;
        self.inner.emit_event(WhitelistEvent::Stopped {
            reason: "Stop requested".to_string(),
        });
        Ok(())
    }

    fn status(&self) -> String {
        let sources = self
            .inner
            .config
            .try_read()
            .map(|config| format!("{} source(s)", config.whitelist_urls.len()))
            .unwrap_or_else(|_| "config busy".to_string());

        match self.last_report() {
            Some(report) => format!(
                "{} | {} | last refresh {}: {}",
                self.scheduler.state(),
                sources,
                report.completed_at.format("%Y-%m-%d %H:%M:%S UTC"),
                report
            ),
            None => format!("{} | {} | not refreshed yet", self.scheduler.state(), sources),
        }
    }

    async fn on_config_changed(&self) -> Result<()> {
        info!("Config changed, updating");
        {
            let config = self.inner.config.read().await;
            self.inner.save_config(&config).await;
        }
        self.refresh().await;
        Ok(())
    }
}

impl ManagerInner {
    /// Run one pass under the single-flight lock
    async fn run_pass(&self) -> RefreshReport {
        let _guard = self.pass_lock.lock().await;

        info!("Refreshing whitelist ids...");
        self.emit_event(WhitelistEvent::PassStarted);

        let (sources, manual, reconciler) = {
            let config = self.config.read().await;
            let reconciler = Reconciler::new(Arc::clone(&self.fetcher))
                .with_fetch_timeout(config.fetch_timeout())
                .with_allow_empty_sources(config.allow_empty_sources);
            (
                config.whitelist_urls.clone(),
                config.manual_whitelist.clone(),
                reconciler,
            )
        };

        let report = self.reconcile_and_commit(&reconciler, &sources, &manual).await;

        match report.outcome {
            RefreshOutcome::Aborted { .. } => error!("{}", report),
            _ => info!("{}", report),
        }

        *self.last_report.lock().unwrap_or_else(|e| e.into_inner()) = Some(report.clone());
        self.emit_event(WhitelistEvent::PassCompleted {
            report: report.clone(),
        });

        report
    }

    async fn reconcile_and_commit(
        &self,
        reconciler: &Reconciler,
        sources: &[String],
        manual: &[String],
    ) -> RefreshReport {
        if sources.is_empty() {
            return RefreshReport::new(RefreshOutcome::Skipped, &[]);
        }

        let current = match self.whitelist.read().await {
            Ok(current) => current,
            Err(e) => {
                return RefreshReport::new(
                    RefreshOutcome::Aborted {
                        reason: e.to_string(),
                    },
                    &[],
                );
            }
        };

        let result = reconciler.reconcile(sources, manual, &current).await;

        for failure in &result.failures {
            self.emit_event(WhitelistEvent::SourceFailed {
                url: failure.source_url().unwrap_or("unknown").to_string(),
                error: failure.to_string(),
            });
        }

        if !result.changed {
            debug!("Whitelist unchanged ({} entries)", current.len());
            return RefreshReport::new(
                RefreshOutcome::Unchanged {
                    count: current.len(),
                },
                &result.failures,
            );
        }

        let old_count = current.len();
        let new_count = result.snapshot.len();

        if let Err(e) = self.whitelist.replace(result.snapshot).await {
            return RefreshReport::new(
                RefreshOutcome::Aborted {
                    reason: e.to_string(),
                },
                &result.failures,
            );
        }

        if let Err(e) = self.whitelist.persist().await {
            warn!("Whitelist replaced but not persisted: {}", e);
            self.emit_event(WhitelistEvent::WhitelistPersistFailed {
                error: e.to_string(),
            });
        }

        RefreshReport::new(
            RefreshOutcome::Updated {
                old_count,
                new_count,
            },
            &result.failures,
        )
    }

    /// Append ids to the manual whitelist, returning the ones that were new
    async fn add_manual_entries(&self, ids: &[String], by: &str) -> Vec<String> {
        let mut config = self.config.write().await;

        let mut added = Vec::new();
        for id in clean(ids) {
            if !config.manual_whitelist.contains(&id) {
                config.manual_whitelist.push(id.clone());
                added.push(id);
            }
        }

        if added.is_empty() {
            debug!("Manual whitelist already contains {:?}", ids);
            return added;
        }

        // Saved under the write lock so concurrent adds are written in order
        self.save_config(&config).await;
        drop(config);

        self.emit_event(WhitelistEvent::ManualEntriesAdded {
            ids: added.clone(),
            by: by.to_string(),
        });

        added
    }

    /// Save the configuration, logging instead of failing
    async fn save_config(&self, config: &WhitelistConfig) {
        if let Err(e) = self.config_store.save(config).await {
            warn!("Failed to save whitelist config: {}", e);
            self.emit_event(WhitelistEvent::ConfigPersistFailed {
                error: e.to_string(),
            });
        }
    }

    /// Emit a manager event
    fn emit_event(&self, event: WhitelistEvent) {
        match self.event_tx.try_send(event) {
            Ok(()) => {}
            Err(mpsc::error::TrySendError::Full(_)) => {
                warn!(
                    "Event channel full, dropping event. \
                    Consider increasing event_channel_capacity."
                );
            }
            Err(mpsc::error::TrySendError::Closed(_)) => {
                trace!("Event receiver dropped");
            }
        }
    }
}

#[async_trait]
impl PassRunner for ManagerInner {
    async fn run_scheduled_pass(&self) {
        self.run_pass().await;
    }

    async fn refresh_interval(&self) -> Duration {
        self.config.read().await.effective_refresh_interval()
    }
}
