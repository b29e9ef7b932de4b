//! Constructor helpers for SubordinatesError

use super::types::SubordinatesError;

impl SubordinatesError {
    /// Create a configuration error with component and message
    ///
    /// # Examples
    /// ```rust
    /// use subordinates_core::error::SubordinatesError;
    ///
    /// let err = SubordinatesError::configuration("controller.id", "must not be empty");
    /// assert!(err.to_string().contains("controller.id"));
    /// ```
    pub fn configuration(component: impl Into<String>, message: impl Into<String>) -> Self {
        SubordinatesError::ConfigurationError {
            component: component.into(),
            message: message.into(),
        }
    }

    /// Create a Storage error with a boxed source
    pub fn storage<E: std::error::Error + Send + Sync + 'static>(
        operation: impl Into<String>,
        source: E,
    ) -> Self {
        SubordinatesError::Storage {
            operation: operation.into(),
            source: Box::new(source),
        }
    }

    pub fn section_not_found(namespace: impl Into<String>, section: impl Into<String>) -> Self {
        SubordinatesError::SectionNotFound {
            namespace: namespace.into(),
            section: section.into(),
        }
    }

    pub fn token(reason: impl Into<String>) -> Self {
        SubordinatesError::InvalidToken {
            reason: reason.into(),
        }
    }

    pub fn manifest(reason: impl Into<String>) -> Self {
        SubordinatesError::InvalidManifest {
            reason: reason.into(),
        }
    }

    pub fn invalid_id(id: impl Into<String>) -> Self {
        SubordinatesError::InvalidControllerId { id: id.into() }
    }

    pub fn restart(service: impl Into<String>, message: impl Into<String>) -> Self {
        SubordinatesError::ServiceRestart {
            service: service.into(),
            message: message.into(),
        }
    }

    pub fn internal(message: impl Into<String>) -> Self {
        SubordinatesError::Internal {
            message: message.into(),
        }
    }
}
