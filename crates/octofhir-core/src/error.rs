use thiserror::Error;

/// Core error types shared by the canonical context crates
#[derive(Debug, Error)]
pub enum CoreError {
    #[error("Invalid canonical resource kind: {0}")]
    InvalidKind(String),

    #[error("Unsupported FHIR version: {0}")]
    InvalidFhirVersion(String),

    #[error("Invalid canonical reference: {0}")]
    InvalidCanonical(String),

    #[error("Invalid resource data: {message}")]
    InvalidResource { message: String },

    #[error("JSON serialization error: {0}")]
    JsonError(#[from] serde_json::Error),
}

impl CoreError {
    /// Create a new InvalidKind error
    pub fn invalid_kind(kind: impl Into<String>) -> Self {
        Self::InvalidKind(kind.into())
    }

    /// Create a new InvalidFhirVersion error
    pub fn invalid_fhir_version(version: impl Into<String>) -> Self {
        Self::InvalidFhirVersion(version.into())
    }

    /// Create a new InvalidCanonical error
    pub fn invalid_canonical(reference: impl Into<String>) -> Self {
        Self::InvalidCanonical(reference.into())
    }

    /// Create a new InvalidResource error
    pub fn invalid_resource(message: impl Into<String>) -> Self {
        Self::InvalidResource {
            message: message.into(),
        }
    }

    /// Get error category for logging/monitoring
    pub fn category(&self) -> ErrorCategory {
        match self {
            Self::InvalidKind(_) | Self::InvalidFhirVersion(_) | Self::InvalidCanonical(_) => {
                ErrorCategory::Validation
            }
            Self::InvalidResource { .. } => ErrorCategory::Validation,
            Self::JsonError(_) => ErrorCategory::Serialization,
        }
    }
}

/// Error categories for monitoring and classification
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorCategory {
    Validation,
    Serialization,
}

impl std::fmt::Display for ErrorCategory {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Validation => write!(f, "validation"),
            Self::Serialization => write!(f, "serialization"),
        }
    }
}

/// Convenience result type for core operations
pub type Result<T> = std::result::Result<T, CoreError>;
