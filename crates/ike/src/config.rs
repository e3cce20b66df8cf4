//! IKE SA Manager Configuration
//!
//! Provides the configuration structure and builder for `IkeSaManager`.

use crate::{Error, Result};
use std::time::Duration;

/// Default number of SPI candidates tried before giving up
pub const DEFAULT_MAX_SPI_ATTEMPTS: u32 = 16;

/// IKE SA manager configuration
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct ManagerConfig {
    /// Upper bound on how long checkout and delete wait for a held SA
    ///
    /// `None` waits until the holder checks the SA in.
    pub checkout_timeout: Option<Duration>,

    /// SPI candidates generated before `SpiExhausted` is returned
    pub max_spi_attempts: u32,
}

impl Default for ManagerConfig {
    fn default() -> Self {
        Self {
            checkout_timeout: None,
            max_spi_attempts: DEFAULT_MAX_SPI_ATTEMPTS,
        }
    }
}

impl ManagerConfig {
    /// Create builder for manager configuration
    pub fn builder() -> ManagerBuilder {
        ManagerBuilder::new()
    }

    /// Validate configuration
    pub fn validate(&self) -> Result<()> {
        if self.checkout_timeout == Some(Duration::ZERO) {
            return Err(Error::InvalidParameter(
                "checkout_timeout must be non-zero".into(),
            ));
        }
        if self.max_spi_attempts == 0 {
            return Err(Error::InvalidParameter(
                "max_spi_attempts must be at least 1".into(),
            ));
        }
        Ok(())
    }
}

/// Builder for ManagerConfig
#[derive(Default)]
pub struct ManagerBuilder {
    checkout_timeout: Option<Duration>,
    max_spi_attempts: Option<u32>,
}

impl ManagerBuilder {
    /// Create new manager builder
    pub fn new() -> Self {
        Self::default()
    }

    /// Bound checkout waits
    pub fn with_checkout_timeout(mut self, timeout: Duration) -> Self {
        self.checkout_timeout = Some(timeout);
        self
    }

    /// Set number of SPI candidates tried on collision
    pub fn with_max_spi_attempts(mut self, attempts: u32) -> Self {
        self.max_spi_attempts = Some(attempts);
        self
    }

    /// Build ManagerConfig with validation
    pub fn build(self) -> Result<ManagerConfig> {
        let config = ManagerConfig {
            checkout_timeout: self.checkout_timeout,
            max_spi_attempts: self.max_spi_attempts.unwrap_or(DEFAULT_MAX_SPI_ATTEMPTS),
        };

        config.validate()?;
        Ok(config)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_config() {
        let config = ManagerConfig::default();
        assert_eq!(config.checkout_timeout, None);
        assert_eq!(config.max_spi_attempts, DEFAULT_MAX_SPI_ATTEMPTS);
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_builder() {
        let config = ManagerConfig::builder()
            .with_checkout_timeout(Duration::from_secs(5))
            .with_max_spi_attempts(4)
            .build()
            .unwrap();

        assert_eq!(config.checkout_timeout, Some(Duration::from_secs(5)));
        assert_eq!(config.max_spi_attempts, 4);
    }

    #[test]
    fn test_builder_defaults_match_default() {
        let config = ManagerConfig::builder().build().unwrap();
        assert_eq!(config, ManagerConfig::default());
    }

    #[test]
    fn test_zero_timeout_rejected() {
        let result = ManagerConfig::builder()
            .with_checkout_timeout(Duration::ZERO)
            .build();
        assert!(matches!(result, Err(Error::InvalidParameter(_))));
    }

    #[test]
    fn test_zero_spi_attempts_rejected() {
        let result = ManagerConfig::builder().with_max_spi_attempts(0).build();
        assert!(matches!(result, Err(Error::InvalidParameter(_))));
    }
}
