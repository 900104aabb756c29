use std::path::Path;

use anyhow::{Context, Result};
use octofhir_canonical::ResolutionContext;
use octofhir_core::FhirVersion;
use octofhir_transform::{TransformRequest, plan_extract};
use serde_json::json;

use crate::cli::OutputFormat;
use crate::output::{print_table, print_value};
use crate::setup::file_format;

/// Binds a QuestionnaireResponse to its map and target without running
/// the map. Resolutions stay in a scope that is dropped afterwards.
pub async fn plan(
    context: &ResolutionContext,
    file: &str,
    source_version: FhirVersion,
    format: OutputFormat,
) -> Result<()> {
    let path = Path::new(file);
    let body = std::fs::read(path).with_context(|| format!("reading {file}"))?;
    let request = TransformRequest::new(body, file_format(path));

    let scope = context.scoped();
    let plan = plan_extract(&scope, &request, source_version).await?;

    match format {
        OutputFormat::Json => print_value(&json!({
            "questionnaire": plan.questionnaire.url,
            "map": plan.map.url,
            "target": plan.target.url,
            "targetType": plan.target_type,
        }))?,
        OutputFormat::Table => print_table(
            ["Step", "Resolved"],
            [
                ["Questionnaire".to_string(), plan.questionnaire.url.clone()],
                ["StructureMap".to_string(), plan.map.url.clone()],
                ["Target definition".to_string(), plan.target.url.clone()],
                ["Target type".to_string(), plan.target_type.clone()],
            ],
        ),
    }
    Ok(())
}
