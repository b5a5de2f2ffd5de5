// # Config Store Trait
//
// Loads and saves the plugin configuration. Change notification goes the
// other way: whoever edits the configuration calls
// `Plugin::on_config_changed` on the manager.

use crate::config::WhitelistConfig;
use async_trait::async_trait;

/// Trait for configuration store implementations
#[async_trait]
pub trait ConfigStore: Send + Sync {
    /// Load the configuration
    ///
    /// Implementations return defaults when nothing has been saved yet.
    async fn load(&self) -> Result<WhitelistConfig, crate::Error>;

    /// Save the configuration
    async fn save(&self, config: &WhitelistConfig) -> Result<(), crate::Error>;
}
