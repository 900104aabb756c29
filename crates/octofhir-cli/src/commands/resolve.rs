use anyhow::{Result, bail};
use octofhir_canonical::ResolutionContext;
use octofhir_core::CanonicalKind;
use octofhir_storage::ResourceStore;
use serde_json::Value;

use crate::cli::OutputFormat;
use crate::output::{print_canonical, print_table, print_value};

pub async fn resolve(
    context: &ResolutionContext,
    kind: CanonicalKind,
    url: &str,
    format: OutputFormat,
) -> Result<()> {
    let resource = context.resolve(kind, url).await?;
    print_canonical(&resource, format)
}

pub async fn snapshot(context: &ResolutionContext, url: &str, format: OutputFormat) -> Result<()> {
    let definition = context
        .resolve(CanonicalKind::StructureDefinition, url)
        .await?;
    let expanded = context.snapshot(&definition).await?;

    match format {
        OutputFormat::Json => print_value(&expanded.payload),
        OutputFormat::Table => {
            let Some(elements) = expanded
                .get("snapshot")
                .and_then(|s| s.get("element"))
                .and_then(Value::as_array)
            else {
                bail!("{url} has no snapshot elements");
            };
            print_table(
                ["Path", "Min", "Max", "Type"],
                elements.iter().map(|element| {
                    let types = element
                        .get("type")
                        .and_then(Value::as_array)
                        .map(|types| {
                            types
                                .iter()
                                .filter_map(|t| t.get("code").and_then(Value::as_str))
                                .collect::<Vec<_>>()
                                .join(" | ")
                        })
                        .unwrap_or_default();
                    [
                        text(element, "path"),
                        element
                            .get("min")
                            .map(Value::to_string)
                            .unwrap_or_else(|| "-".into()),
                        text(element, "max"),
                        types,
                    ]
                }),
            );
            Ok(())
        }
    }
}

pub async fn list(store: &dyn ResourceStore, kind: CanonicalKind, format: OutputFormat) -> Result<()> {
    let records = store.list(kind).await?;
    match format {
        OutputFormat::Json => print_value(&Value::Array(
            records.into_iter().map(|record| record.payload).collect(),
        )),
        OutputFormat::Table => {
            print_table(
                ["URL", "Version", "Name", "FHIR"],
                records.iter().map(|record| {
                    [
                        record.url.clone(),
                        record.version.clone().unwrap_or_else(|| "-".into()),
                        text(&record.payload, "name"),
                        record.schema_version.label().to_string(),
                    ]
                }),
            );
            Ok(())
        }
    }
}

fn text(value: &Value, field: &str) -> String {
    value
        .get(field)
        .and_then(Value::as_str)
        .unwrap_or("-")
        .to_string()
}
