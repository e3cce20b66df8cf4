//! Lifecycle trait for daemon components

use crate::PlatformResult;

/// Daemon component interface
///
/// Every long-lived component of the daemon implements this trait so the
/// daemon can bring components up and tear them down in a uniform order.
pub trait SecurityModule: Send + Sync {
    /// Unique module identifier
    fn id(&self) -> &'static str;

    /// Module version
    fn version(&self) -> &'static str;

    /// Module description
    fn description(&self) -> &'static str;

    /// Initialize the module
    ///
    /// # Errors
    ///
    /// Returns an error if initialization fails
    fn init(&mut self) -> PlatformResult<()> {
        Ok(())
    }

    /// Shutdown the module
    ///
    /// Implementations may block until in-flight work has drained.
    ///
    /// # Errors
    ///
    /// Returns an error if shutdown fails
    fn shutdown(&mut self) -> PlatformResult<()> {
        Ok(())
    }
}
