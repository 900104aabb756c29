use clap::{Parser, Subcommand, ValueEnum};
use octofhir_core::{CanonicalKind, FhirVersion};

#[derive(Parser)]
#[command(name = "octofhir-canon")]
#[command(about = "Resolve, convert and plan FHIR canonical resources across R4 and R5")]
#[command(version)]
pub struct Cli {
    #[command(subcommand)]
    pub command: Commands,

    /// Path to the configuration file (defaults to ./octofhir.toml)
    #[arg(short, long, global = true, env = "OCTOFHIR_CONFIG")]
    pub config: Option<String>,

    /// Directory of canonical resources backing the store (overrides packages.store_dir)
    #[arg(long, global = true)]
    pub store: Option<String>,

    /// Directory of base definitions registered before use (overrides packages.base_dir)
    #[arg(long, global = true)]
    pub base: Option<String>,

    /// Output format
    #[arg(short, long, global = true)]
    pub format: Option<OutputFormat>,
}

#[derive(Clone, Copy, ValueEnum, Default)]
pub enum OutputFormat {
    #[default]
    Json,
    Table,
}

#[derive(Subcommand)]
pub enum Commands {
    /// Resolve a canonical resource into the working version
    Resolve(ResolveArgs),
    /// Expand a StructureDefinition into its snapshot
    Snapshot(SnapshotArgs),
    /// Convert a resource file between FHIR versions
    Convert(ConvertArgs),
    /// Show the questionnaire, map and target a QuestionnaireResponse binds to
    Plan(PlanArgs),
    /// List the store's canonical resources of one kind
    List(ListArgs),
}

#[derive(clap::Args)]
pub struct ResolveArgs {
    /// Resource type (e.g. StructureMap)
    pub kind: CanonicalKind,
    /// Canonical reference, optionally with `|version`
    pub url: String,
}

#[derive(clap::Args)]
pub struct SnapshotArgs {
    /// StructureDefinition canonical URL
    pub url: String,
}

#[derive(clap::Args)]
pub struct ConvertArgs {
    /// Path to a JSON or XML resource
    pub file: String,
    /// Version the file is written in
    #[arg(long, default_value = "R4")]
    pub from: FhirVersion,
    /// Version to convert to
    #[arg(long, default_value = "R5")]
    pub to: FhirVersion,
    /// Write XML instead of JSON
    #[arg(long)]
    pub xml: bool,
}

#[derive(clap::Args)]
pub struct PlanArgs {
    /// Path to a JSON or XML QuestionnaireResponse
    pub file: String,
    /// Version the response is written in (overrides transform.source_version)
    #[arg(long)]
    pub source_version: Option<FhirVersion>,
}

#[derive(clap::Args)]
pub struct ListArgs {
    /// Resource type (e.g. Questionnaire)
    pub kind: CanonicalKind,
}
