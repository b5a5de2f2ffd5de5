//! Test doubles and common utilities for contract tests
//!
//! These doubles stand in for the network and the host so that the merge,
//! failure containment and scheduling rules can be checked deterministically.

#![allow(dead_code)]

use async_trait::async_trait;
use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;
use tokio::sync::mpsc;
use whitelist_core::error::{Error, Result};
use whitelist_core::traits::{
    ConfigStore, DirectoryUser, ListFetcher, WhitelistStore, split_lines,
};
use whitelist_core::{
    MemoryConfigStore, MemoryWhitelistStore, StaticUserDirectory, WhitelistConfig, WhitelistEvent,
    WhitelistManager,
};

/// How a scripted source answers
#[derive(Debug, Clone)]
pub enum Reply {
    /// Successful response with this body
    Body(String),
    /// Network failure
    Fail(String),
    /// Never answers
    Hang,
    /// Answers with this body after a delay
    Slow(Duration, String),
    /// The fetch panics
    Panic,
}

/// A ListFetcher whose answers are set by the test
#[derive(Clone, Default)]
pub struct ScriptedFetcher {
    replies: Arc<Mutex<HashMap<String, Reply>>>,
    calls: Arc<AtomicUsize>,
    in_flight: Arc<AtomicUsize>,
    max_in_flight: Arc<AtomicUsize>,
}

impl ScriptedFetcher {
    pub fn new() -> Self {
        Self::default()
    }

    /// Set the answer for a source
    pub fn set(&self, url: &str, reply: Reply) {
        self.replies.lock().unwrap().insert(url.to_string(), reply);
    }

    /// Convenience for a successful body
    pub fn serve(&self, url: &str, body: &str) {
        self.set(url, Reply::Body(body.to_string()));
    }

    /// Total number of fetch calls
    pub fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }

    /// Highest number of fetches that were running at the same time
    pub fn max_in_flight(&self) -> usize {
        self.max_in_flight.load(Ordering::SeqCst)
    }
}

/// Decrements the in-flight count when a fetch ends, even by cancellation
struct InFlight(Arc<AtomicUsize>);

impl Drop for InFlight {
    fn drop(&mut self) {
        self.0.fetch_sub(1, Ordering::SeqCst);
    }
}

#[async_trait]
impl ListFetcher for ScriptedFetcher {
    async fn fetch(&self, source: &str, _timeout: Duration) -> Result<Vec<String>> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        let now = self.in_flight.fetch_add(1, Ordering::SeqCst) + 1;
        self.max_in_flight.fetch_max(now, Ordering::SeqCst);
        let _in_flight = InFlight(Arc::clone(&self.in_flight));

        let reply = self.replies.lock().unwrap().get(source).cloned();
        match reply {
            Some(Reply::Body(body)) => Ok(split_lines(&body)),
            Some(Reply::Fail(message)) => Err(Error::fetch(source, message)),
            Some(Reply::Hang) => std::future::pending().await,
            Some(Reply::Slow(delay, body)) => {
                tokio::time::sleep(delay).await;
                Ok(split_lines(&body))
            }
            Some(Reply::Panic) => panic!("scripted fetch panic for {}", source),
            None => Err(Error::http_status(source, 404)),
        }
    }
}

/// A whitelist store that can be told to fail reads
#[derive(Clone, Default)]
pub struct FlakyWhitelistStore {
    pub inner: MemoryWhitelistStore,
    fail_reads: Arc<AtomicBool>,
}

impl FlakyWhitelistStore {
    pub fn new(inner: MemoryWhitelistStore) -> Self {
        Self {
            inner,
            fail_reads: Arc::new(AtomicBool::new(false)),
        }
    }

    pub fn fail_reads(&self, fail: bool) {
        self.fail_reads.store(fail, Ordering::SeqCst);
    }
}

#[async_trait]
impl WhitelistStore for FlakyWhitelistStore {
    async fn read(&self) -> Result<Vec<String>> {
        if self.fail_reads.load(Ordering::SeqCst) {
            return Err(Error::whitelist_store("host whitelist unavailable"));
        }
        self.inner.read().await
    }

    async fn replace(&self, entries: Vec<String>) -> Result<()> {
        self.inner.replace(entries).await
    }

    async fn persist(&self) -> Result<()> {
        self.inner.persist().await
    }
}

/// A config store whose saves always fail
#[derive(Clone, Default)]
pub struct BrokenConfigStore;

#[async_trait]
impl ConfigStore for BrokenConfigStore {
    async fn load(&self) -> Result<WhitelistConfig> {
        Ok(WhitelistConfig::default())
    }

    async fn save(&self, _config: &WhitelistConfig) -> Result<()> {
        Err(Error::config_store("read-only filesystem"))
    }
}

/// Everything a contract test needs to observe a manager
pub struct Harness {
    pub manager: Arc<WhitelistManager>,
    pub events: mpsc::Receiver<WhitelistEvent>,
    pub fetcher: ScriptedFetcher,
    pub whitelist: MemoryWhitelistStore,
    pub config_store: MemoryConfigStore,
    pub directory: StaticUserDirectory,
}

impl Harness {
    /// Build a manager over in-memory collaborators
    pub fn new(config: WhitelistConfig, initial: &[&str]) -> Self {
        let fetcher = ScriptedFetcher::new();
        let whitelist = MemoryWhitelistStore::with_entries(initial.iter().copied());
        let config_store = MemoryConfigStore::with_config(config.clone());
        let directory = StaticUserDirectory::new();

        let (manager, events) = WhitelistManager::new(
            Arc::new(fetcher.clone()),
            Arc::new(whitelist.clone()),
            Arc::new(config_store.clone()),
            Arc::new(directory.clone()),
            config,
        )
        .expect("manager construction succeeds");

        Self {
            manager: Arc::new(manager),
            events,
            fetcher,
            whitelist,
            config_store,
            directory,
        }
    }

    /// Current whitelist
    pub async fn whitelist(&self) -> Vec<String> {
        self.whitelist.read().await.expect("memory read succeeds")
    }

    /// Register a directory user
    pub async fn add_user(&self, user: DirectoryUser) {
        self.directory.upsert(user).await;
    }

    /// Drain all events emitted so far
    pub fn drain_events(&mut self) -> Vec<WhitelistEvent> {
        let mut events = Vec::new();
        while let Ok(event) = self.events.try_recv() {
            events.push(event);
        }
        events
    }
}

/// Configuration with the given sources
pub fn config_with_sources(urls: &[&str]) -> WhitelistConfig {
    urls.iter()
        .fold(WhitelistConfig::new(), |config, url| config.with_url(*url))
}

/// Owned strings from literals
pub fn strings(items: &[&str]) -> Vec<String> {
    items.iter().map(|s| s.to_string()).collect()
}

/// Sorted copy, for order-insensitive assertions
pub fn sorted(mut items: Vec<String>) -> Vec<String> {
    items.sort();
    items
}
