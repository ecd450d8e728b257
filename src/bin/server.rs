//! Schema Catalog HTTP server

use std::path::PathBuf;

use clap::Parser;
use schema_catalog::{server, CatalogConfig, FileStore};
use tracing_subscriber::EnvFilter;

#[derive(Parser)]
#[command(name = "catalog-server")]
#[command(about = "Serve the schema catalog API")]
struct Cli {
    /// Config file (defaults to catalog.toml lookup)
    #[arg(short, long)]
    config: Option<String>,

    /// Listen address, overrides the config
    #[arg(short, long)]
    bind: Option<String>,

    /// Store directory, overrides the config
    #[arg(short, long)]
    store: Option<PathBuf>,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();

    let mut config = CatalogConfig::load_from(cli.config.as_deref())?;
    if let Some(bind) = cli.bind {
        config.server.bind = bind;
    }
    if let Some(store) = cli.store {
        config.store.path = store;
    }

    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(&config.logging.level)),
        )
        .init();

    let store = FileStore::open(config.store_path())?;
    server::serve(&config, store).await
}
