use std::fmt;

use octofhir_convert::ConversionError;
use octofhir_core::CanonicalKind;
use thiserror::Error;

/// Errors raised while resolving canonical resources.
///
/// `Clone` so that every caller coalesced onto one in-flight resolution
/// receives the same failure.
#[derive(Debug, Clone, Error)]
pub enum ContextError {
    /// No record exists for the canonical URL (or none matching a pinned version).
    #[error("{kind} not found: {url}")]
    NotFound { kind: CanonicalKind, url: String },

    /// The store could not be reached or did not answer in time.
    #[error("Store unavailable while resolving {kind} {url}: {message}")]
    StoreUnavailable {
        kind: CanonicalKind,
        url: String,
        message: String,
    },

    #[error(transparent)]
    Conversion(#[from] ConversionError),

    /// A StructureDefinition derives from itself through its base chain.
    #[error("Cyclic StructureDefinition chain: {}", .chain.join(" -> "))]
    CyclicDefinition { chain: Vec<String> },

    #[error("Invalid definition {url}: {message}")]
    InvalidDefinition { url: String, message: String },

    #[error("Invalid canonical reference '{reference}'")]
    InvalidReference { reference: String },

    /// The store answered with an error other than unavailability.
    #[error("Store error while resolving {kind} {url}: {message}")]
    Store {
        kind: CanonicalKind,
        url: String,
        message: String,
    },
}

impl ContextError {
    #[must_use]
    pub fn not_found(kind: CanonicalKind, url: impl Into<String>) -> Self {
        Self::NotFound {
            kind,
            url: url.into(),
        }
    }

    #[must_use]
    pub fn store_unavailable(
        kind: CanonicalKind,
        url: impl Into<String>,
        message: impl Into<String>,
    ) -> Self {
        Self::StoreUnavailable {
            kind,
            url: url.into(),
            message: message.into(),
        }
    }

    #[must_use]
    pub fn invalid_definition(url: impl Into<String>, message: impl Into<String>) -> Self {
        Self::InvalidDefinition {
            url: url.into(),
            message: message.into(),
        }
    }

    #[must_use]
    pub fn store(kind: CanonicalKind, url: impl Into<String>, message: impl Into<String>) -> Self {
        Self::Store {
            kind,
            url: url.into(),
            message: message.into(),
        }
    }

    /// True for a missing record, false for an unreachable store.
    pub fn is_not_found(&self) -> bool {
        matches!(self, Self::NotFound { .. })
    }

    pub fn is_unreachable(&self) -> bool {
        matches!(self, Self::StoreUnavailable { .. })
    }

    /// Get error category for logging/monitoring
    pub fn category(&self) -> ErrorCategory {
        match self {
            Self::NotFound { .. } => ErrorCategory::NotFound,
            Self::StoreUnavailable { .. } | Self::Store { .. } => ErrorCategory::Infrastructure,
            Self::Conversion(_)
            | Self::CyclicDefinition { .. }
            | Self::InvalidDefinition { .. }
            | Self::InvalidReference { .. } => ErrorCategory::Definition,
        }
    }
}

/// Error categories for monitoring and classification
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorCategory {
    NotFound,
    Definition,
    Infrastructure,
}

impl fmt::Display for ErrorCategory {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::NotFound => write!(f, "not_found"),
            Self::Definition => write!(f, "definition"),
            Self::Infrastructure => write!(f, "infrastructure"),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_not_found_vs_unreachable() {
        let missing = ContextError::not_found(CanonicalKind::StructureMap, "http://example/missing");
        assert!(missing.is_not_found());
        assert!(!missing.is_unreachable());
        assert_eq!(missing.category(), ErrorCategory::NotFound);
        assert_eq!(missing.to_string(), "StructureMap not found: http://example/missing");

        let down = ContextError::store_unavailable(CanonicalKind::ValueSet, "http://vs", "timeout");
        assert!(down.is_unreachable());
        assert_eq!(down.category().to_string(), "infrastructure");
    }

    #[test]
    fn test_cycle_message_lists_chain() {
        let err = ContextError::CyclicDefinition {
            chain: vec!["http://sd/A".into(), "http://sd/B".into(), "http://sd/A".into()],
        };
        assert_eq!(
            err.to_string(),
            "Cyclic StructureDefinition chain: http://sd/A -> http://sd/B -> http://sd/A"
        );
    }
}
