//! From implementations for external error types

use super::types::SubordinatesError;

impl From<std::io::Error> for SubordinatesError {
    fn from(err: std::io::Error) -> Self {
        SubordinatesError::IoError(Box::new(err))
    }
}

impl From<serde_json::Error> for SubordinatesError {
    fn from(err: serde_json::Error) -> Self {
        SubordinatesError::JsonError(Box::new(err))
    }
}

impl From<base64::DecodeError> for SubordinatesError {
    fn from(err: base64::DecodeError) -> Self {
        SubordinatesError::InvalidToken {
            reason: format!("base64 decoding failed: {}", err),
        }
    }
}

impl From<toml::de::Error> for SubordinatesError {
    fn from(err: toml::de::Error) -> Self {
        SubordinatesError::ConfigurationError {
            component: "toml".to_string(),
            message: format!("Failed to parse TOML: {}", err),
        }
    }
}

impl From<tempfile::PersistError> for SubordinatesError {
    fn from(err: tempfile::PersistError) -> Self {
        SubordinatesError::Storage {
            operation: "persist".to_string(),
            source: Box::new(err.error),
        }
    }
}

impl From<tokio::task::JoinError> for SubordinatesError {
    fn from(err: tokio::task::JoinError) -> Self {
        if err.is_panic() {
            SubordinatesError::Internal {
                message: "Task panicked".to_string(),
            }
        } else {
            SubordinatesError::Internal {
                message: format!("Task failed: {}", err),
            }
        }
    }
}
