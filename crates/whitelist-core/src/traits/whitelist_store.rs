// # Whitelist Store Trait
//
// Defines the interface to the host's authoritative whitelist.
//
// ## Purpose
//
// The whitelist is owned by an external component (the server's user
// manager). The engine reads it, replaces it after a changed pass and asks
// the owner to persist it.
//
// ## Implementations
//
// - In-memory: `MemoryWhitelistStore`
// - File-based: `FileWhitelistStore` (JSON with atomic writes)

use async_trait::async_trait;

/// Trait for whitelist store implementations
///
/// # Thread Safety
///
/// All methods must be safe to call from multiple tasks. The engine still
/// serializes every read-compare-replace sequence through its single-flight
/// lock, so implementations are never asked to read while the engine is
/// committing.
///
/// # Ordering
///
/// The whitelist is an ordered, deduplicated sequence. `replace` receives
/// entries in the order they should be kept.
#[async_trait]
pub trait WhitelistStore: Send + Sync {
    /// Read the current whitelist
    ///
    /// # Returns
    ///
    /// - `Ok(Vec<String>)`: Current entries in stored order
    /// - `Err(Error)`: Storage error
    async fn read(&self) -> Result<Vec<String>, crate::Error>;

    /// Replace the whole whitelist
    ///
    /// # Parameters
    ///
    /// - `entries`: The new entries
    async fn replace(&self, entries: Vec<String>) -> Result<(), crate::Error>;

    /// Persist the current whitelist
    ///
    /// A failure here leaves the in-memory whitelist replaced.
    async fn persist(&self) -> Result<(), crate::Error>;
}
