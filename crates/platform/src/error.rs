//! Error types shared across daemon components

use std::fmt;

/// Unified error type for daemon-level operations
#[derive(Debug)]
pub enum PlatformError {
    /// Configuration error
    Config(String),

    /// Security Association bookkeeping error
    Sa(String),

    /// Component is shutting down
    Shutdown(String),

    /// Other error
    Other(Box<dyn std::error::Error + Send + Sync>),
}

impl fmt::Display for PlatformError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            PlatformError::Config(msg) => write!(f, "Configuration error: {}", msg),
            PlatformError::Sa(msg) => write!(f, "SA error: {}", msg),
            PlatformError::Shutdown(msg) => write!(f, "Shutting down: {}", msg),
            PlatformError::Other(e) => write!(f, "Error: {}", e),
        }
    }
}

impl std::error::Error for PlatformError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            PlatformError::Other(e) => Some(e.as_ref()),
            _ => None,
        }
    }
}

/// Result type for daemon-level operations
pub type PlatformResult<T> = Result<T, PlatformError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_display() {
        let err = PlatformError::Config("missing listen address".to_string());
        assert_eq!(err.to_string(), "Configuration error: missing listen address");

        let err = PlatformError::Sa("no such IKE_SA".to_string());
        assert_eq!(err.to_string(), "SA error: no such IKE_SA");
    }

    #[test]
    fn test_string_variants_have_no_source() {
        let err = PlatformError::Shutdown("draining".to_string());
        assert!(std::error::Error::source(&err).is_none());
        assert_eq!(err.to_string(), "Shutting down: draining");
    }

    #[test]
    fn test_other_error_source() {
        let inner = std::io::Error::new(std::io::ErrorKind::Other, "boom");
        let err = PlatformError::Other(Box::new(inner));
        assert!(std::error::Error::source(&err).is_some());
        assert_eq!(err.to_string(), "Error: boom");
    }
}
