use std::fmt;

use octofhir_canonical::ContextError;
use octofhir_convert::ConversionError;
use thiserror::Error;

use crate::format::FormatError;

/// States of one `$extract` invocation, in order.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum TransformStage {
    Start,
    SourceParsed,
    MapReferenceExtracted,
    MapResolved,
    TargetTypeDetermined,
    TargetAllocated,
    Transformed,
    Serialized,
}

impl TransformStage {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Start => "start",
            Self::SourceParsed => "source_parsed",
            Self::MapReferenceExtracted => "map_reference_extracted",
            Self::MapResolved => "map_resolved",
            Self::TargetTypeDetermined => "target_type_determined",
            Self::TargetAllocated => "target_allocated",
            Self::Transformed => "transformed",
            Self::Serialized => "serialized",
        }
    }
}

impl fmt::Display for TransformStage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Why the source could not be tied to a StructureMap.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum MissingBindingReason {
    #[error("source has no questionnaire reference")]
    NoQuestionnaireReference,

    #[error("questionnaire {0} not found")]
    QuestionnaireNotFound(String),

    #[error("questionnaire {0} has no target StructureMap extension")]
    NoTargetMapExtension(String),
}

/// A failure reported by the mapping interpreter.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("rule {rule_id}: {message}")]
pub struct RuleError {
    pub rule_id: String,
    pub message: String,
}

impl RuleError {
    pub fn new(rule_id: impl Into<String>, message: impl Into<String>) -> Self {
        Self {
            rule_id: rule_id.into(),
            message: message.into(),
        }
    }
}

/// The terminal reason of a failed invocation.
#[derive(Debug, Clone, Error)]
pub enum TransformFailure {
    #[error("Malformed input: {message}")]
    MalformedInput { message: String },

    #[error(transparent)]
    Conversion(#[from] ConversionError),

    #[error("Missing map binding: {reason}")]
    MissingMapBinding { reason: MissingBindingReason },

    #[error("StructureMap {url} {}", reachability(.unreachable))]
    MapNotFound { url: String, unreachable: bool },

    #[error("StructureMap {map_url} declares no target structure")]
    NoTargetDeclared { map_url: String },

    #[error("Target StructureDefinition {url} cannot be resolved")]
    TargetTypeUnresolvable { url: String },

    #[error("Transform failed at {rule_id}: {message}")]
    TransformRuleError { rule_id: String, message: String },

    #[error("Serialization failed: {message}")]
    SerializationError { message: String },

    /// Resolution failures other than the named lookups above.
    #[error(transparent)]
    Resolution(#[from] ContextError),
}

impl TransformFailure {
    #[must_use]
    pub fn malformed(message: impl Into<String>) -> Self {
        Self::MalformedInput {
            message: message.into(),
        }
    }

    #[must_use]
    pub fn missing_binding(reason: MissingBindingReason) -> Self {
        Self::MissingMapBinding { reason }
    }

    #[must_use]
    pub fn serialization(message: impl Into<String>) -> Self {
        Self::SerializationError {
            message: message.into(),
        }
    }

    /// Configuration errors are fixed in definitions, data errors in the
    /// submitted instance.
    pub fn category(&self) -> ErrorCategory {
        match self {
            Self::MissingMapBinding { .. }
            | Self::NoTargetDeclared { .. }
            | Self::TargetTypeUnresolvable { .. } => ErrorCategory::Configuration,
            Self::MapNotFound { unreachable, .. } => {
                if *unreachable {
                    ErrorCategory::Infrastructure
                } else {
                    ErrorCategory::Configuration
                }
            }
            Self::MalformedInput { .. }
            | Self::Conversion(_)
            | Self::TransformRuleError { .. }
            | Self::SerializationError { .. } => ErrorCategory::Data,
            Self::Resolution(e) => match e {
                ContextError::StoreUnavailable { .. } | ContextError::Store { .. } => {
                    ErrorCategory::Infrastructure
                }
                _ => ErrorCategory::Configuration,
            },
        }
    }
}

fn reachability(unreachable: &bool) -> &'static str {
    if *unreachable {
        "could not be reached"
    } else {
        "not found"
    }
}

impl From<RuleError> for TransformFailure {
    fn from(err: RuleError) -> Self {
        Self::TransformRuleError {
            rule_id: err.rule_id,
            message: err.message,
        }
    }
}

impl From<FormatError> for TransformFailure {
    fn from(err: FormatError) -> Self {
        Self::malformed(err.to_string())
    }
}

/// A failed invocation: the stage that could not be reached and why.
#[derive(Debug, Clone, Error)]
#[error("$extract failed before {stage}: {failure}")]
pub struct TransformError {
    pub stage: TransformStage,
    pub failure: TransformFailure,
}

impl TransformError {
    #[must_use]
    pub fn new(stage: TransformStage, failure: impl Into<TransformFailure>) -> Self {
        Self {
            stage,
            failure: failure.into(),
        }
    }

    pub fn category(&self) -> ErrorCategory {
        self.failure.category()
    }
}

/// Error categories for monitoring and classification
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorCategory {
    Configuration,
    Data,
    Infrastructure,
}

impl fmt::Display for ErrorCategory {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Configuration => write!(f, "configuration"),
            Self::Data => write!(f, "data"),
            Self::Infrastructure => write!(f, "infrastructure"),
        }
    }
}
