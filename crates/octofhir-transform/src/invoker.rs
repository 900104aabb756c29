//! The `$extract` operation: QuestionnaireResponse in, mapped resource out.

use std::fmt;
use std::str::FromStr;
use std::sync::Arc;

use octofhir_canonical::{ResolutionContext, definition_type, undeclared_elements};
use octofhir_core::{
    CanonicalKind, CanonicalResource, FhirVersion, ResourceInstance,
    TARGET_STRUCTURE_MAP_EXTENSION, extension_string_value, find_extension,
};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use tracing::{debug, info, warn};

use crate::error::{MissingBindingReason, TransformError, TransformFailure, TransformStage};
use crate::format::{self, ElementShape, FhirFormat};
use crate::interpreter::DynMappingInterpreter;

const CORE_DEFINITION_BASE: &str = "http://hl7.org/fhir/StructureDefinition/";

/// Which cache a run's resolutions land in.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Isolation {
    /// A private overlay, discarded when the run ends.
    #[default]
    Scoped,
    /// The shared context directly.
    Shared,
}

impl fmt::Display for Isolation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Scoped => write!(f, "scoped"),
            Self::Shared => write!(f, "shared"),
        }
    }
}

impl FromStr for Isolation {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "scoped" => Ok(Self::Scoped),
            "shared" => Ok(Self::Shared),
            other => Err(format!("unknown isolation '{other}' (expected scoped or shared)")),
        }
    }
}

#[derive(Debug, Clone)]
pub struct TransformOptions {
    pub isolation: Isolation,
    /// Push a scoped run's resolutions into the shared cache when it succeeds.
    pub promote_on_success: bool,
    /// Response format when the request does not ask for one.
    pub default_format: FhirFormat,
    /// FHIR version of submitted instances.
    pub source_version: FhirVersion,
    /// FHIR version of produced instances.
    pub output_version: FhirVersion,
}

impl Default for TransformOptions {
    fn default() -> Self {
        Self {
            isolation: Isolation::Scoped,
            promote_on_success: false,
            default_format: FhirFormat::Xml,
            source_version: FhirVersion::R4,
            output_version: FhirVersion::R4,
        }
    }
}

/// Raw input of one invocation.
#[derive(Debug, Clone)]
pub struct TransformRequest {
    pub body: Vec<u8>,
    pub content_format: FhirFormat,
    pub accept: Option<FhirFormat>,
    pub source_version: Option<FhirVersion>,
    pub output_version: Option<FhirVersion>,
}

impl TransformRequest {
    pub fn new(body: impl Into<Vec<u8>>, content_format: FhirFormat) -> Self {
        Self {
            body: body.into(),
            content_format,
            accept: None,
            source_version: None,
            output_version: None,
        }
    }

    pub fn accept(mut self, format: FhirFormat) -> Self {
        self.accept = Some(format);
        self
    }

    pub fn source_version(mut self, version: FhirVersion) -> Self {
        self.source_version = Some(version);
        self
    }

    pub fn output_version(mut self, version: FhirVersion) -> Self {
        self.output_version = Some(version);
        self
    }
}

#[derive(Debug, Clone)]
pub struct TransformOutcome {
    /// Serialized target in `format`.
    pub body: Vec<u8>,
    pub format: FhirFormat,
    /// The target in the output version.
    pub target: ResourceInstance,
    /// Target elements the target StructureDefinition does not declare.
    pub undeclared: Vec<String>,
}

/// Everything `$extract` would use, without running the map.
#[derive(Debug, Clone)]
pub struct TransformPlan {
    pub questionnaire: Arc<CanonicalResource>,
    pub map: Arc<CanonicalResource>,
    pub target: Arc<CanonicalResource>,
    pub target_type: String,
}

/// Drives one StructureMap through a [`MappingInterpreter`](crate::MappingInterpreter).
pub struct TransformInvoker {
    context: Arc<ResolutionContext>,
    interpreter: DynMappingInterpreter,
    options: TransformOptions,
}

impl TransformInvoker {
    pub fn new(context: Arc<ResolutionContext>, interpreter: DynMappingInterpreter) -> Self {
        Self {
            context,
            interpreter,
            options: TransformOptions::default(),
        }
    }

    pub fn with_options(mut self, options: TransformOptions) -> Self {
        self.options = options;
        self
    }

    pub fn options(&self) -> &TransformOptions {
        &self.options
    }

    pub fn context(&self) -> &Arc<ResolutionContext> {
        &self.context
    }

    /// Runs the full `$extract` state machine.
    pub async fn extract(&self, request: TransformRequest) -> Result<TransformOutcome, TransformError> {
        let scope = match self.options.isolation {
            Isolation::Scoped => Some(self.context.scoped()),
            Isolation::Shared => None,
        };
        let context = scope.as_deref().unwrap_or(self.context.as_ref());

        let result = self.run(context, &request).await;
        match &result {
            Ok(outcome) => {
                if let Some(scope) = scope.as_ref().filter(|_| self.options.promote_on_success) {
                    let promoted = scope.promote();
                    debug!(promoted, "promoted scoped resolutions");
                }
                info!(
                    target_type = %outcome.target.resource_type,
                    format = %outcome.format,
                    bytes = outcome.body.len(),
                    "$extract completed"
                );
            }
            Err(e) => warn!(
                stage = %e.stage,
                category = %e.category(),
                error = %e,
                "$extract failed"
            ),
        }
        result
    }

    /// Parses the source and resolves its questionnaire, map and target
    /// definition. Scoped runs never promote what a plan resolved.
    pub async fn plan(&self, request: TransformRequest) -> Result<TransformPlan, TransformError> {
        let scope = match self.options.isolation {
            Isolation::Scoped => Some(self.context.scoped()),
            Isolation::Shared => None,
        };
        let context = scope.as_deref().unwrap_or(self.context.as_ref());
        plan_extract(context, &request, self.options.source_version).await
    }

    async fn run(
        &self,
        context: &ResolutionContext,
        request: &TransformRequest,
    ) -> Result<TransformOutcome, TransformError> {
        let source = parse_source(context, request, self.options.source_version)?;
        let plan = bind(context, &source).await?;

        let mut target = ResourceInstance::empty(&plan.target_type, context.working_version());
        debug!(
            map = %plan.map.url,
            target_type = %plan.target_type,
            "allocated target"
        );

        self.interpreter
            .run(context, &source, &plan.map, &mut target)
            .await
            .map_err(|e| TransformError::new(TransformStage::Transformed, e))?;

        let undeclared = check_conformance(context, &plan.target, &target).await;

        let format = request.accept.unwrap_or(self.options.default_format);
        let output_version = request.output_version.unwrap_or(self.options.output_version);
        let content = context
            .bridge()
            .convert(&target.content, target.schema_version, output_version)
            .map_err(|e| TransformError::new(TransformStage::Serialized, e))?;
        let body = format::encode(&content, format).map_err(|e| {
            TransformError::new(
                TransformStage::Serialized,
                TransformFailure::serialization(e.to_string()),
            )
        })?;

        Ok(TransformOutcome {
            body,
            format,
            target: ResourceInstance {
                resource_type: target.resource_type,
                schema_version: output_version,
                content,
            },
            undeclared,
        })
    }
}

/// Parses the source and resolves its questionnaire, map and target
/// definition against `context` without running the map.
pub async fn plan_extract(
    context: &ResolutionContext,
    request: &TransformRequest,
    default_version: FhirVersion,
) -> Result<TransformPlan, TransformError> {
    let source = parse_source(context, request, default_version)?;
    bind(context, &source).await
}

/// Decodes the body and brings it to the working version.
fn parse_source(
    context: &ResolutionContext,
    request: &TransformRequest,
    default_version: FhirVersion,
) -> Result<ResourceInstance, TransformError> {
    let stage = TransformStage::SourceParsed;
    let value = format::decode_with(&request.body, request.content_format, |resource_type| {
        element_shape(context, resource_type)
    })
    .map_err(|e| TransformError::new(stage, e))?;

    let version = request.source_version.unwrap_or(default_version);
    let source = ResourceInstance::from_json(value, version)
        .map_err(|e| TransformError::new(stage, TransformFailure::malformed(e.to_string())))?;
    if source.resource_type != "QuestionnaireResponse" {
        return Err(TransformError::new(
            stage,
            TransformFailure::malformed(format!(
                "expected a QuestionnaireResponse, got {}",
                source.resource_type
            )),
        ));
    }

    let working = context.working_version();
    let content = context
        .bridge()
        .convert(&source.content, version, working)
        .map_err(|e| TransformError::new(stage, e))?;
    Ok(ResourceInstance {
        resource_type: source.resource_type,
        schema_version: working,
        content,
    })
}

/// Questionnaire -> target map -> target definition.
async fn bind(
    context: &ResolutionContext,
    source: &ResourceInstance,
) -> Result<TransformPlan, TransformError> {
    let stage = TransformStage::MapReferenceExtracted;
    let questionnaire_url = source
        .get_str("questionnaire")
        .filter(|url| !url.is_empty())
        .ok_or_else(|| {
            TransformError::new(
                stage,
                TransformFailure::missing_binding(MissingBindingReason::NoQuestionnaireReference),
            )
        })?;
    let questionnaire = context
        .resolve(CanonicalKind::Questionnaire, questionnaire_url)
        .await
        .map_err(|e| {
            if e.is_not_found() {
                TransformError::new(
                    stage,
                    TransformFailure::missing_binding(MissingBindingReason::QuestionnaireNotFound(
                        questionnaire_url.to_string(),
                    )),
                )
            } else {
                TransformError::new(stage, e)
            }
        })?;
    let map_url = find_extension(&questionnaire.payload, TARGET_STRUCTURE_MAP_EXTENSION)
        .and_then(extension_string_value)
        .ok_or_else(|| {
            TransformError::new(
                stage,
                TransformFailure::missing_binding(MissingBindingReason::NoTargetMapExtension(
                    questionnaire.url.clone(),
                )),
            )
        })?
        .to_string();
    debug!(questionnaire = %questionnaire.url, map = %map_url, "map reference extracted");

    let map = context
        .resolve(CanonicalKind::StructureMap, &map_url)
        .await
        .map_err(|e| {
            let failure = if e.is_not_found() || e.is_unreachable() {
                TransformFailure::MapNotFound {
                    url: map_url.clone(),
                    unreachable: e.is_unreachable(),
                }
            } else {
                e.into()
            };
            TransformError::new(TransformStage::MapResolved, failure)
        })?;

    let stage = TransformStage::TargetTypeDetermined;
    let target_urls = target_structures(&map);
    let Some(target_url) = target_urls.first() else {
        return Err(TransformError::new(
            stage,
            TransformFailure::NoTargetDeclared {
                map_url: map.url.clone(),
            },
        ));
    };
    if target_urls.len() > 1 {
        debug!(
            map = %map.url,
            ignored = ?&target_urls[1..],
            "map declares several target structures, using the first"
        );
    }
    let target = resolve_target(context, target_url)
        .await
        .map_err(|failure| TransformError::new(stage, failure))?;
    let target_type = definition_type(&target)
        .ok_or_else(|| {
            TransformError::new(
                stage,
                TransformFailure::TargetTypeUnresolvable {
                    url: target.url.clone(),
                },
            )
        })?
        .to_string();

    Ok(TransformPlan {
        questionnaire,
        map,
        target,
        target_type,
    })
}

/// URLs of the map's `structure` entries in target mode, in declaration order.
fn target_structures(map: &CanonicalResource) -> Vec<String> {
    map.get("structure")
        .and_then(Value::as_array)
        .into_iter()
        .flatten()
        .filter(|s| s.get("mode").and_then(Value::as_str) == Some("target"))
        .filter_map(|s| s.get("url").and_then(Value::as_str))
        .map(str::to_string)
        .collect()
}

/// Resolves a target StructureDefinition, falling back to a case-insensitive
/// match among the definitions the context already holds.
async fn resolve_target(
    context: &ResolutionContext,
    url: &str,
) -> Result<Arc<CanonicalResource>, TransformFailure> {
    match context.resolve(CanonicalKind::StructureDefinition, url).await {
        Ok(definition) => Ok(definition),
        Err(e) if e.is_not_found() => context
            .all(CanonicalKind::StructureDefinition)
            .find(|definition| definition.url.eq_ignore_ascii_case(url))
            .ok_or_else(|| TransformFailure::TargetTypeUnresolvable {
                url: url.to_string(),
            }),
        Err(e) => Err(e.into()),
    }
}

async fn check_conformance(
    context: &ResolutionContext,
    definition: &Arc<CanonicalResource>,
    target: &ResourceInstance,
) -> Vec<String> {
    let definition = if definition.get("snapshot").is_some() {
        definition.clone()
    } else {
        match context.snapshot(definition).await {
            Ok(expanded) => Arc::new(expanded),
            Err(e) => {
                debug!(definition = %definition.url, error = %e, "no snapshot to check the target against");
                return Vec::new();
            }
        }
    };

    let undeclared = undeclared_elements(&target.content, &definition);
    if !undeclared.is_empty() {
        warn!(
            target_type = %target.resource_type,
            definition = %definition.url,
            undeclared = ?undeclared,
            "target carries elements its definition does not declare"
        );
    }
    undeclared
}

/// Element shape of a core resource type, from its definition when cached.
fn element_shape(context: &ResolutionContext, resource_type: &str) -> ElementShape {
    context
        .lookup(
            CanonicalKind::StructureDefinition,
            &format!("{CORE_DEFINITION_BASE}{resource_type}"),
        )
        .map(|definition| ElementShape::from_definition(&definition))
        .unwrap_or_default()
}
