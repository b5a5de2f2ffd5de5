//! Core traits for the whitelist system
//!
//! This module defines the abstract interfaces the engine talks to.
//!
//! - [`ListFetcher`]: Fetch one remote list as raw lines
//! - [`WhitelistStore`]: The host's authoritative whitelist
//! - [`ConfigStore`]: Load and save the plugin configuration
//! - [`UserDirectory`]: Resolve player names and ids
//! - [`Plugin`]: Host lifecycle capability set

pub mod config_store;
pub mod list_fetcher;
pub mod plugin;
pub mod user_directory;
pub mod whitelist_store;

pub use config_store::ConfigStore;
pub use list_fetcher::{ListFetcher, split_lines};
pub use plugin::Plugin;
pub use user_directory::{DirectoryUser, IdKind, Resolution, UserDirectory};
pub use whitelist_store::WhitelistStore;
