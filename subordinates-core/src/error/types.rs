//! Core error types

use thiserror::Error;

/// Error type for hierarchy, provisioning and store operations
#[derive(Error, Debug)]
pub enum SubordinatesError {
    // Configuration store
    #[error("Section '{section}' not found in '{namespace}'")]
    SectionNotFound { namespace: String, section: String },

    #[error("Storage operation '{operation}' failed")]
    Storage {
        operation: String,
        #[source]
        source: Box<dyn std::error::Error + Send + Sync>,
    },

    // Token decoding
    #[error("Invalid provisioning token: {reason}")]
    InvalidToken { reason: String },

    #[error("Provisioning token does not contain a manifest")]
    ManifestMissing,

    #[error("Provisioning token contains {count} manifest candidates")]
    ManifestAmbiguous { count: usize },

    #[error("Invalid token manifest: {reason}")]
    InvalidManifest { reason: String },

    #[error("Invalid controller id {id:?}")]
    InvalidControllerId { id: String },

    // Configuration
    #[error("Configuration error in {component}: {message}")]
    ConfigurationError { component: String, message: String },

    // Service management
    #[error("Failed to restart service '{service}': {message}")]
    ServiceRestart { service: String, message: String },

    // Serialization & IO
    #[error("JSON error: {0}")]
    JsonError(#[from] Box<serde_json::Error>),

    #[error("IO error: {0}")]
    IoError(#[from] Box<std::io::Error>),

    #[error("Internal error: {message}")]
    Internal { message: String },
}

impl SubordinatesError {
    /// Whether the error is the store's "section does not exist" condition
    pub fn is_not_found(&self) -> bool {
        matches!(self, SubordinatesError::SectionNotFound { .. })
    }

    /// Whether the error came from decoding a provisioning token
    pub fn is_token_error(&self) -> bool {
        matches!(
            self,
            SubordinatesError::InvalidToken { .. }
                | SubordinatesError::ManifestMissing
                | SubordinatesError::ManifestAmbiguous { .. }
                | SubordinatesError::InvalidManifest { .. }
        )
    }
}

pub type Result<T> = std::result::Result<T, SubordinatesError>;
pub type SubordinatesResult<T> = std::result::Result<T, SubordinatesError>;
