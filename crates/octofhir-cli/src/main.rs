mod cli;
mod commands;
mod observability;
mod output;
mod setup;

use anyhow::Result;
use clap::Parser;

use cli::{Cli, Commands};
use octofhir_config::AppConfig;
use octofhir_config::loader::load_config;
use octofhir_convert::FhirVersionBridge;
use output::{print_error, print_success, print_warning};

#[tokio::main]
async fn main() {
    if let Err(e) = run().await {
        print_error(&format!("{e:#}"));
        std::process::exit(1);
    }
}

async fn run() -> Result<()> {
    let cli = Cli::parse();
    let cfg = load_config(cli.config.as_deref()).map_err(anyhow::Error::msg)?;
    observability::init_tracing_with_level(&cfg.logging.level);
    let format = cli.format.unwrap_or_default();

    match &cli.command {
        Commands::Convert(args) => {
            let bridge = FhirVersionBridge::new();
            commands::convert::convert(&bridge, &args.file, args.from, args.to, args.xml)?;
        }
        Commands::Resolve(args) => {
            let workspace = open_workspace(&cli, &cfg).await?;
            commands::resolve::resolve(&workspace.context, args.kind, &args.url, format).await?;
        }
        Commands::Snapshot(args) => {
            let workspace = open_workspace(&cli, &cfg).await?;
            commands::resolve::snapshot(&workspace.context, &args.url, format).await?;
        }
        Commands::List(args) => {
            let workspace = open_workspace(&cli, &cfg).await?;
            commands::resolve::list(workspace.store.as_ref(), args.kind, format).await?;
        }
        Commands::Plan(args) => {
            let workspace = open_workspace(&cli, &cfg).await?;
            let options = cfg.transform_options().map_err(anyhow::Error::msg)?;
            let source_version = args.source_version.unwrap_or(options.source_version);
            commands::plan::plan(&workspace.context, &args.file, source_version, format).await?;
            print_success("bound without running the map");
        }
    }

    Ok(())
}

async fn open_workspace(cli: &Cli, cfg: &AppConfig) -> Result<setup::Workspace> {
    let workspace = setup::open(cfg, cli.store.as_deref(), cli.base.as_deref()).await?;
    if workspace.store.is_empty() {
        print_warning("store is empty; pass --store or set packages.store_dir");
    }
    Ok(workspace)
}
