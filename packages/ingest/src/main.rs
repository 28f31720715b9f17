#![cfg_attr(feature = "fail-on-warnings", deny(warnings))]
#![warn(clippy::all, clippy::pedantic, clippy::nursery, clippy::cargo)]
#![allow(clippy::multiple_crate_versions, clippy::cargo_common_metadata)]

//! CLI entry point for the API scraper.

use std::io::Read as _;
use std::path::PathBuf;

use api_scraper_config_store::{ConfigStore, FileConfigStore, SsmConfigStore};
use api_scraper_fetcher::HttpPageFetcher;
use api_scraper_ingest::{Invocation, execute};
use api_scraper_source::ApiMapping;
use api_scraper_storage::{BatchWriter, dynamodb::DynamoDbBackend};
use clap::{Parser, Subcommand};

#[derive(Parser)]
#[command(name = "api_scraper", about = "Scrape public APIs into DynamoDB")]
struct Cli {
    /// Read source configs from `<dir>/{app}--{source}-config.json`
    /// instead of SSM Parameter Store
    #[arg(long, global = true)]
    config_dir: Option<PathBuf>,
    /// Replace the built-in source mapping with this TOML file
    #[arg(long, global = true)]
    mapping: Option<PathBuf>,
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Scrape one source
    Run {
        /// Application namespace used for the config lookup
        #[arg(long)]
        app: String,
        /// Source API name (e.g., "the-cocktail-db")
        #[arg(long)]
        source: String,
    },
    /// Scrape the source named by an invocation event
    /// (`{"body": "{\"app\": ..., \"sourceApiName\": ...}"}`)
    Event {
        /// Read the event from this file instead of stdin
        #[arg(long)]
        file: Option<PathBuf>,
    },
    /// List registered sources with their group and rule
    Sources,
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    pretty_env_logger::init();
    let cli = Cli::parse();

    let loaded;
    let mapping = if let Some(path) = &cli.mapping {
        log::info!("Loading source mapping from {}", path.display());
        loaded = ApiMapping::from_toml_str(&std::fs::read_to_string(path)?)?;
        &loaded
    } else {
        ApiMapping::builtin()
    };

    let invocation = match cli.command {
        Commands::Sources => {
            println!("{:<20} {:<16} RULE", "SOURCE", "GROUP");
            println!("{}", "-".repeat(50));
            for name in mapping.source_names() {
                let resolved = mapping.resolve(name)?;
                println!(
                    "{name:<20} {:<16} {} {:?}",
                    resolved.group, resolved.rule.kind, resolved.rule.query
                );
            }
            return Ok(());
        }
        Commands::Run { app, source } => Invocation::new(app, source),
        Commands::Event { file } => {
            let event = if let Some(path) = file {
                std::fs::read_to_string(path)?
            } else {
                let mut event = String::new();
                std::io::stdin().read_to_string(&mut event)?;
                event
            };
            Invocation::from_event_str(&event)?
        }
    };

    let store: Box<dyn ConfigStore> = if let Some(dir) = cli.config_dir {
        log::info!("Reading source configs from {}", dir.display());
        Box::new(FileConfigStore::new(dir))
    } else {
        Box::new(SsmConfigStore::from_env().await)
    };
    let fetcher = HttpPageFetcher::new();
    let writer = BatchWriter::new(DynamoDbBackend::from_env().await);

    let summary = execute(mapping, store.as_ref(), &fetcher, &writer, &invocation).await?;
    println!("{invocation}: {summary}");

    Ok(())
}
