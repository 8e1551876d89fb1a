//! Unified error system for restart control
//!
//! One error type for every layer of the workspace. Effect handlers, the
//! restart engine and the binary all speak `ReviveError`.

use serde::{Deserialize, Serialize};

/// Unified error type for all restart-control operations
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, thiserror::Error)]
pub enum ReviveError {
    /// Invalid input or configuration
    #[error("Invalid: {message}")]
    Invalid {
        /// Error message describing the invalid input
        message: String,
    },

    /// Resource not found
    #[error("Not found: {message}")]
    NotFound {
        /// Error message describing what was not found
        message: String,
    },

    /// Network or transport error
    #[error("Network error: {message}")]
    Network {
        /// Error message describing the network issue
        message: String,
    },

    /// Serialization/deserialization error
    #[error("Serialization error: {message}")]
    Serialization {
        /// Error message describing the serialization failure
        message: String,
    },

    /// Record store or secret store operation failed
    #[error("Storage error: {message}")]
    Storage {
        /// Error message describing the storage failure
        message: String,
    },

    /// A persisted restart record could not be decoded into a valid state
    #[error("Corrupt restart record: {message}")]
    CorruptRecord {
        /// Error message describing the corruption
        message: String,
    },

    /// A bounded wait ran out of attempts
    #[error("Timed out: {message}")]
    Timeout {
        /// Error message describing what was awaited
        message: String,
    },

    /// Internal system error
    #[error("Internal error: {message}")]
    Internal {
        /// Error message describing the internal error
        message: String,
    },
}

impl ReviveError {
    /// Create an invalid input error
    pub fn invalid(message: impl Into<String>) -> Self {
        Self::Invalid {
            message: message.into(),
        }
    }

    /// Create a not found error
    pub fn not_found(message: impl Into<String>) -> Self {
        Self::NotFound {
            message: message.into(),
        }
    }

    /// Create a network error
    pub fn network(message: impl Into<String>) -> Self {
        Self::Network {
            message: message.into(),
        }
    }

    /// Create a serialization error
    pub fn serialization(message: impl Into<String>) -> Self {
        Self::Serialization {
            message: message.into(),
        }
    }

    /// Create a storage error
    pub fn storage(message: impl Into<String>) -> Self {
        Self::Storage {
            message: message.into(),
        }
    }

    /// Create a corrupt record error
    pub fn corrupt_record(message: impl Into<String>) -> Self {
        Self::CorruptRecord {
            message: message.into(),
        }
    }

    /// Create a timeout error
    pub fn timeout(message: impl Into<String>) -> Self {
        Self::Timeout {
            message: message.into(),
        }
    }

    /// Create an internal error
    pub fn internal(message: impl Into<String>) -> Self {
        Self::Internal {
            message: message.into(),
        }
    }

    /// The bare message without the variant prefix, used in alert bodies.
    pub fn message(&self) -> &str {
        match self {
            Self::Invalid { message }
            | Self::NotFound { message }
            | Self::Network { message }
            | Self::Serialization { message }
            | Self::Storage { message }
            | Self::CorruptRecord { message }
            | Self::Timeout { message }
            | Self::Internal { message } => message,
        }
    }
}

/// Standard Result type for restart-control operations
pub type ReviveResult<T> = std::result::Result<T, ReviveError>;

impl From<serde_json::Error> for ReviveError {
    fn from(err: serde_json::Error) -> Self {
        Self::serialization(err.to_string())
    }
}

impl From<std::io::Error> for ReviveError {
    fn from(err: std::io::Error) -> Self {
        match err.kind() {
            std::io::ErrorKind::NotFound => Self::not_found(err.to_string()),
            std::io::ErrorKind::TimedOut => Self::timeout(err.to_string()),
            _ => Self::storage(err.to_string()),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_creation() {
        let err = ReviveError::invalid("missing genesis");
        assert!(matches!(err, ReviveError::Invalid { .. }));
        assert_eq!(err.to_string(), "Invalid: missing genesis");
        assert_eq!(err.message(), "missing genesis");
    }

    #[test]
    fn test_io_conversion() {
        let io_err = std::io::Error::new(std::io::ErrorKind::NotFound, "no such file");
        assert!(matches!(
            ReviveError::from(io_err),
            ReviveError::NotFound { .. }
        ));

        let io_err = std::io::Error::new(std::io::ErrorKind::PermissionDenied, "denied");
        assert!(matches!(
            ReviveError::from(io_err),
            ReviveError::Storage { .. }
        ));
    }
}
