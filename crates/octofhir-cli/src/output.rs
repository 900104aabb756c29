use anyhow::Result;
use colored::Colorize;
use octofhir_core::CanonicalResource;
use serde_json::Value;
use tabled::builder::Builder;
use tabled::settings::Style;

use crate::cli::OutputFormat;

pub fn print_value(value: &Value) -> Result<()> {
    println!("{}", serde_json::to_string_pretty(value)?);
    Ok(())
}

pub fn print_canonical(resource: &CanonicalResource, format: OutputFormat) -> Result<()> {
    match format {
        OutputFormat::Json => print_value(&resource.payload),
        OutputFormat::Table => {
            print_table(["Field", "Value"], canonical_rows(resource));
            Ok(())
        }
    }
}

pub fn canonical_rows(resource: &CanonicalResource) -> Vec<[String; 2]> {
    vec![
        ["Kind".into(), resource.kind.to_string()],
        ["URL".into(), resource.url.clone()],
        [
            "Version".into(),
            resource.version.clone().unwrap_or_else(|| "-".into()),
        ],
        ["Name".into(), resource.display_name().to_string()],
        ["FHIR".into(), resource.schema_version.label().to_string()],
    ]
}

pub fn print_table<const N: usize>(header: [&str; N], rows: impl IntoIterator<Item = [String; N]>) {
    let mut builder = Builder::default();
    builder.push_record(header);
    let mut count = 0;
    for row in rows {
        builder.push_record(row);
        count += 1;
    }
    if count == 0 {
        println!("No resources found.");
        return;
    }
    let table = builder.build().with(Style::rounded()).to_string();
    println!("{table}");
}

pub fn print_success(msg: &str) {
    eprintln!("{} {}", "✓".green(), msg);
}

pub fn print_warning(msg: &str) {
    eprintln!("{} {}", "!".yellow(), msg);
}

pub fn print_error(msg: &str) {
    eprintln!("{} {}", "✗".red(), msg);
}
