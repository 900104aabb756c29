//! Seam to the StructureMap interpreter.

use std::sync::Arc;

use async_trait::async_trait;
use octofhir_canonical::ResolutionContext;
use octofhir_core::{CanonicalResource, ResourceInstance};

use crate::error::RuleError;

/// Executes a StructureMap's rules from a source instance into a target.
///
/// The context resolves anything the rules reference mid-run (imported maps,
/// types, value sets). When the invoker runs scoped, those resolutions stay
/// in the run's overlay.
#[async_trait]
pub trait MappingInterpreter: Send + Sync {
    async fn run(
        &self,
        context: &ResolutionContext,
        source: &ResourceInstance,
        map: &CanonicalResource,
        target: &mut ResourceInstance,
    ) -> Result<(), RuleError>;
}

pub type DynMappingInterpreter = Arc<dyn MappingInterpreter>;
