//! Error types for IKE SA management
//!
//! A single error type covers the registry, the checkout broker and the
//! reference IKE SA object.

use crate::sa::SaId;
use keyward_platform::PlatformError;
use std::fmt;

/// Result type for IKE SA management
pub type Result<T> = std::result::Result<T, Error>;

/// IKE SA management errors
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Error {
    /// No live IKE SA matches the identifier
    NotFound(SaId),

    /// Checkout wait exceeded the configured timeout
    TimedOut(SaId),

    /// Manager is shutting down and admits no new holders
    ShuttingDown,

    /// No free SPI found
    SpiExhausted {
        /// Number of candidates tried
        attempts: u32,
    },

    /// IKE SA constructor failed
    Allocation(String),

    /// Invalid configuration parameter
    InvalidParameter(String),

    /// Operation not allowed in current state
    InvalidState(String),

    /// Invalid IKE state transition
    InvalidStateTransition {
        /// State before the transition
        from: String,
        /// Requested state
        to: String,
    },

    /// Internal error (should not happen)
    Internal(String),
}

impl fmt::Display for Error {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Error::NotFound(id) => write!(f, "IKE SA not found: {}", id),
            Error::TimedOut(id) => write!(f, "Timed out waiting for IKE SA: {}", id),
            Error::ShuttingDown => write!(f, "IKE SA manager is shutting down"),
            Error::SpiExhausted { attempts } => {
                write!(f, "No free SPI found after {} attempts", attempts)
            }
            Error::Allocation(msg) => write!(f, "IKE SA allocation failed: {}", msg),
            Error::InvalidParameter(msg) => write!(f, "Invalid parameter: {}", msg),
            Error::InvalidState(msg) => write!(f, "Invalid state: {}", msg),
            Error::InvalidStateTransition { from, to } => {
                write!(f, "Invalid state transition: {} -> {}", from, to)
            }
            Error::Internal(msg) => write!(f, "Internal error: {}", msg),
        }
    }
}

impl std::error::Error for Error {}

impl From<Error> for PlatformError {
    fn from(err: Error) -> Self {
        match err {
            Error::InvalidParameter(msg) => PlatformError::Config(msg),
            Error::ShuttingDown => PlatformError::Shutdown(err.to_string()),
            Error::Internal(_) => PlatformError::Other(Box::new(err)),
            other => PlatformError::Sa(other.to_string()),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_display() {
        let err = Error::NotFound(SaId::new(1, Some(2), false));
        assert_eq!(
            err.to_string(),
            "IKE SA not found: 0000000000000001_i 0000000000000002_r"
        );

        let err = Error::SpiExhausted { attempts: 16 };
        assert_eq!(err.to_string(), "No free SPI found after 16 attempts");

        let err = Error::InvalidStateTransition {
            from: "Idle".into(),
            to: "Established".into(),
        };
        assert_eq!(err.to_string(), "Invalid state transition: Idle -> Established");
    }

    #[test]
    fn test_error_clone() {
        let err1 = Error::TimedOut(SaId::half_open(9, true));
        let err2 = err1.clone();
        assert_eq!(err1, err2);
    }

    #[test]
    fn test_platform_error_conversion() {
        let err: PlatformError = Error::InvalidParameter("max_spi_attempts".into()).into();
        assert!(matches!(err, PlatformError::Config(_)));

        let err: PlatformError = Error::ShuttingDown.into();
        assert!(matches!(err, PlatformError::Shutdown(_)));

        let err: PlatformError = Error::NotFound(SaId::half_open(1, true)).into();
        match err {
            PlatformError::Sa(msg) => assert!(msg.contains("not found")),
            other => panic!("Expected Sa error, got {:?}", other),
        }

        let err: PlatformError = Error::Internal("entry vanished".into()).into();
        assert!(matches!(err, PlatformError::Other(_)));
        assert!(std::error::Error::source(&err).is_some());
    }
}
