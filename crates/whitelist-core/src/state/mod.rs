// # Collaborator Implementations
//
// This module provides implementations of the store and directory traits
// for tests, embedding and the daemon.

pub mod directory;
pub mod file;
pub mod memory;

pub use directory::StaticUserDirectory;
pub use file::{FileConfigStore, FileWhitelistStore};
pub use memory::{MemoryConfigStore, MemoryWhitelistStore};
