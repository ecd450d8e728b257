//! Schema Catalog CLI
//!
//! Runs the catalog operations against a local store and prints JSON.

use std::path::{Path, PathBuf};

use anyhow::{bail, Context};
use clap::{ArgGroup, Parser, Subcommand, ValueEnum};
use schema_catalog::{
    affected, analysis, export, infer, validate, AffectedQuery, CatalogConfig, ExportFormat, FileStore,
    InferredSchema, ItemKind,
};
use serde::Serialize;
use tracing_subscriber::EnvFilter;

#[derive(Parser)]
#[command(name = "catalog")]
#[command(about = "Inspect and maintain the schema catalog")]
struct Cli {
    /// Config file (defaults to catalog.toml lookup)
    #[arg(short, long)]
    config: Option<String>,

    /// Store directory, overrides the config
    #[arg(short, long)]
    store: Option<PathBuf>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// List items that depend on a format, definition or entity
    #[command(group(ArgGroup::new("item").required(true).args(["format", "definition", "entity"])))]
    Affected {
        #[arg(long)]
        format: Option<String>,
        #[arg(long)]
        definition: Option<String>,
        #[arg(long)]
        entity: Option<String>,
    },

    /// Infer entities and definitions from an API description
    Infer {
        #[arg(value_enum)]
        source: Source,
        /// Postman collection or Swagger v2 JSON file
        file: PathBuf,
    },

    /// Import a curated inference result into the store
    Import {
        file: PathBuf,
    },

    /// Validate a JSON document against the catalog
    Validate {
        file: PathBuf,
    },

    /// Report dangling references and containment cycles
    Problems,

    /// Export an entity
    Export {
        entity: String,
        #[arg(long = "as", value_enum, default_value = "table")]
        shape: Shape,
    },

    /// Fuzzy search item names
    Search {
        query: String,
        #[arg(short, long, default_value_t = 20)]
        limit: usize,
    },

    /// Print the change log
    Changes,
}

#[derive(Clone, Copy, ValueEnum)]
enum Source {
    Postman,
    Swagger,
}

#[derive(Clone, Copy, ValueEnum)]
enum Shape {
    Table,
    Json,
    Sample,
}

impl From<Shape> for ExportFormat {
    fn from(shape: Shape) -> Self {
        match shape {
            Shape::Table => ExportFormat::Table,
            Shape::Json => ExportFormat::Json,
            Shape::Sample => ExportFormat::Sample,
        }
    }
}

fn main() {
    let cli = Cli::parse();

    let config = match CatalogConfig::load_from(cli.config.as_deref()) {
        Ok(config) => config,
        Err(e) => {
            eprintln!("Error: failed to load config: {}", e);
            std::process::exit(1);
        }
    };

    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(&config.logging.level)),
        )
        .with_writer(std::io::stderr)
        .init();

    if let Err(e) = run(cli, config) {
        eprintln!("Error: {:#}", e);
        std::process::exit(1);
    }
}

fn run(cli: Cli, config: CatalogConfig) -> anyhow::Result<()> {
    let store_path = cli.store.unwrap_or_else(|| config.store_path());

    match cli.command {
        Commands::Affected { format, definition, entity } => {
            let query = match (format, definition, entity) {
                (Some(name), _, _) => AffectedQuery::new(ItemKind::Format, name),
                (_, Some(name), _) => AffectedQuery::new(ItemKind::Definition, name),
                (_, _, Some(name)) => AffectedQuery::new(ItemKind::Entity, name),
                _ => bail!("one of --format, --definition or --entity is required"),
            };
            let catalog = FileStore::open(&store_path)?.snapshot()?;
            let result = affected::resolve(&catalog, &query);
            if result.is_empty() {
                println!("No usages found for {}", query.name);
            } else {
                print_json(&result)?;
            }
        }

        Commands::Infer { source, file } => {
            let input = read_json(&file)?;
            let schema = match source {
                Source::Postman => infer::infer_postman(&input)
                    .context("no parseable request bodies found in collection")?,
                Source::Swagger => {
                    let schema = infer::infer_swagger(&input);
                    if schema.is_empty() {
                        bail!("no entities or definitions found in Swagger document");
                    }
                    schema
                }
            };
            print_json(&schema)?;
        }

        Commands::Import { file } => {
            let schema: InferredSchema = serde_json::from_value(read_json(&file)?)?;
            let report = FileStore::open(&store_path)?.import(&schema)?;
            print_json(&report)?;
            if report.error_count() > 0 {
                std::process::exit(2);
            }
        }

        Commands::Validate { file } => {
            let document = read_json(&file)?;
            let catalog = FileStore::open(&store_path)?.snapshot()?;
            let report = validate::validate(&document, &catalog);
            print_json(&report)?;
            if !report.valid {
                std::process::exit(1);
            }
        }

        Commands::Problems => {
            let catalog = FileStore::open(&store_path)?.snapshot()?;
            print_json(&analysis::find_problems(&catalog))?;
        }

        Commands::Export { entity, shape } => {
            let catalog = FileStore::open(&store_path)?.snapshot()?;
            print_json(&export::export(&catalog, &entity, shape.into())?)?;
        }

        Commands::Search { query, limit } => {
            let catalog = FileStore::open(&store_path)?.snapshot()?;
            print_json(&catalog.search(&query, limit))?;
        }

        Commands::Changes => {
            print_json(&FileStore::open(&store_path)?.changes()?)?;
        }
    }

    Ok(())
}

fn read_json(path: &Path) -> anyhow::Result<serde_json::Value> {
    let content = std::fs::read_to_string(path)
        .with_context(|| format!("failed to read {}", path.display()))?;
    serde_json::from_str(&content).with_context(|| format!("{} is not valid JSON", path.display()))
}

fn print_json<T: Serialize>(value: &T) -> anyhow::Result<()> {
    println!("{}", serde_json::to_string_pretty(value)?);
    Ok(())
}
