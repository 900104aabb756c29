//! # octofhir-transform
//!
//! The Structured Data Capture `$extract` operation: a QuestionnaireResponse
//! is tied through its Questionnaire's `targetStructureMap` extension to a
//! StructureMap, and a [`MappingInterpreter`] fills a new instance of the
//! map's target type.
//!
//! ```text
//! Start -> SourceParsed -> MapReferenceExtracted -> MapResolved
//!       -> TargetTypeDetermined -> TargetAllocated -> Transformed -> Serialized
//! ```
//!
//! Every failure is a [`TransformError`] naming the stage that could not be
//! reached.
//!
//! ## Example
//!
//! ```ignore
//! let invoker = TransformInvoker::new(context, interpreter);
//! let outcome = invoker
//!     .extract(TransformRequest::new(body, FhirFormat::Json).accept(FhirFormat::Json))
//!     .await?;
//! ```

pub mod error;
pub mod format;
pub mod interpreter;
pub mod invoker;

pub use error::{
    ErrorCategory, MissingBindingReason, RuleError, TransformError, TransformFailure,
    TransformStage,
};
pub use format::{ElementShape, FhirFormat, FormatError, decode, decode_with, encode};
pub use interpreter::{DynMappingInterpreter, MappingInterpreter};
pub use invoker::{
    Isolation, TransformInvoker, TransformOptions, TransformOutcome, TransformPlan,
    TransformRequest, plan_extract,
};
