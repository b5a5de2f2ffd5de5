// # whitelist-core
//
// Core library for keeping a game server whitelist in sync with remote lists.
//
// ## Architecture Overview
//
// - **ListFetcher**: Trait for fetching one remote list as raw lines
// - **WhitelistStore**: Trait for the authoritative whitelist owned by the host
// - **ConfigStore**: Trait for loading and saving the plugin configuration
// - **UserDirectory**: Trait for resolving loosely typed player identifiers
// - **Reconciler**: Fetch, merge and compare logic for a single pass
// - **Scheduler**: Background loop that runs passes on an interval
// - **WhitelistManager**: Service that owns all of the above and implements `Plugin`
//
// ## Design Principles
//
// 1. **Failure containment**: A failed source can add entries but never remove them
// 2. **Single-flight**: At most one reconciliation pass runs at a time
// 3. **Write on change**: The store is only replaced when the entry set differs
// 4. **Library-first**: The daemon is a thin layer over this crate

pub mod commands;
pub mod config;
pub mod engine;
pub mod error;
pub mod manager;
pub mod state;
pub mod traits;

// Re-export core types for convenience
pub use commands::{AuthLevel, Command, CommandHandler, Invoker};
pub use config::WhitelistConfig;
pub use engine::{Reconciler, Reconciliation, RefreshOutcome, RefreshReport, WhitelistEvent};
pub use error::{Error, Result};
pub use manager::{AddOutcome, WhitelistManager};
pub use state::{
    FileConfigStore, FileWhitelistStore, MemoryConfigStore, MemoryWhitelistStore,
    StaticUserDirectory,
};
pub use traits::{ConfigStore, ListFetcher, Plugin, UserDirectory, WhitelistStore};
