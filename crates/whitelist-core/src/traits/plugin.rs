// # Plugin Trait
//
// The capability set a host needs to drive the whitelist service: start,
// stop, status and configuration change notification. Host integrations
// implement or adapt to this trait instead of reaching for globals.

use async_trait::async_trait;

/// Host lifecycle interface
#[async_trait]
pub trait Plugin: Send + Sync {
    /// Display name of the plugin
    fn name(&self) -> &str;

    /// Start background work
    ///
    /// Returns `Err(Error::InvalidState)` if already started.
    async fn start(&self) -> Result<(), crate::Error>;

    /// Stop background work
    ///
    /// Resolves once the background task has exited. An in-flight pass is
    /// allowed to finish.
    async fn stop(&self) -> Result<(), crate::Error>;

    /// One-line human readable status
    fn status(&self) -> String;

    /// Called by the host after the configuration has been edited
    async fn on_config_changed(&self) -> Result<(), crate::Error>;
}
