// # Memory Stores
//
// In-memory implementations of WhitelistStore and ConfigStore.
//
// ## Purpose
//
// Useful for tests and for embedding the manager in a host that already
// owns persistence. Nothing survives a restart.

use async_trait::async_trait;
use std::sync::Arc;
use std::sync::atomic::{AtomicUsize, Ordering};
use tokio::sync::RwLock;

use crate::Error;
use crate::config::WhitelistConfig;
use crate::traits::{ConfigStore, WhitelistStore};

/// In-memory whitelist
///
/// Clones share the same list, so a test can keep a handle while the
/// manager owns another.
///
/// # Example
///
/// ```rust,no_run
/// use whitelist_core::state::MemoryWhitelistStore;
/// use whitelist_core::traits::WhitelistStore;
///
/// #[tokio::main]
/// async fn main() -> Result<(), Box<dyn std::error::Error>> {
///     let store = MemoryWhitelistStore::with_entries(["76561198000000000"]);
///
///     store.replace(vec!["slg123".to_string()]).await?;
///     assert_eq!(store.read().await?, vec!["slg123".to_string()]);
///
///     Ok(())
/// }
/// ```
#[derive(Debug, Clone, Default)]
pub struct MemoryWhitelistStore {
    entries: Arc<RwLock<Vec<String>>>,
    replace_count: Arc<AtomicUsize>,
    persist_count: Arc<AtomicUsize>,
}

impl MemoryWhitelistStore {
    /// Create an empty whitelist
    pub fn new() -> Self {
        Self::default()
    }

    /// Create a whitelist with initial entries
    pub fn with_entries<I, S>(entries: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self {
            entries: Arc::new(RwLock::new(entries.into_iter().map(Into::into).collect())),
            ..Self::default()
        }
    }

    /// Number of times `replace` was called
    pub fn replace_count(&self) -> usize {
        self.replace_count.load(Ordering::SeqCst)
    }

    /// Number of times `persist` was called
    pub fn persist_count(&self) -> usize {
        self.persist_count.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl WhitelistStore for MemoryWhitelistStore {
    async fn read(&self) -> Result<Vec<String>, Error> {
        Ok(self.entries.read().await.clone())
    }

    async fn replace(&self, entries: Vec<String>) -> Result<(), Error> {
        *self.entries.write().await = entries;
        self.replace_count.fetch_add(1, Ordering::SeqCst);
        Ok(())
    }

    async fn persist(&self) -> Result<(), Error> {
        // Nothing to write; counted so callers can observe commits
        self.persist_count.fetch_add(1, Ordering::SeqCst);
        Ok(())
    }
}

/// In-memory configuration store
#[derive(Debug, Clone, Default)]
pub struct MemoryConfigStore {
    config: Arc<RwLock<Option<WhitelistConfig>>>,
    save_count: Arc<AtomicUsize>,
}

impl MemoryConfigStore {
    /// Create an empty store; `load` returns defaults
    pub fn new() -> Self {
        Self::default()
    }

    /// Create a store holding `config`
    pub fn with_config(config: WhitelistConfig) -> Self {
        Self {
            config: Arc::new(RwLock::new(Some(config))),
            ..Self::default()
        }
    }

    /// Last saved configuration, if any
    pub async fn saved(&self) -> Option<WhitelistConfig> {
        self.config.read().await.clone()
    }

    /// Number of times `save` was called
    pub fn save_count(&self) -> usize {
        self.save_count.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl ConfigStore for MemoryConfigStore {
    async fn load(&self) -> Result<WhitelistConfig, Error> {
        Ok(self.config.read().await.clone().unwrap_or_default())
    }

    async fn save(&self, config: &WhitelistConfig) -> Result<(), Error> {
        *self.config.write().await = Some(config.clone());
        self.save_count.fetch_add(1, Ordering::SeqCst);
        Ok(())
    }
}
