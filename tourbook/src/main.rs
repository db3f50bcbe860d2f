use std::path::PathBuf;

use anyhow::Context;
use clap::Parser;
use tourbook::prelude::*;

/// tourbook - tour booking REST API
#[derive(Parser)]
#[command(name = "tourbook")]
#[command(version, about, long_about = None)]
struct Cli {
    /// Configuration file, replacing the default search path
    #[arg(short, long, env = "TOURBOOK_CONFIG")]
    config: Option<PathBuf>,

    /// Port to listen on
    #[arg(short, long)]
    port: Option<u16>,

    /// Directory of `{collection}.json` seed files
    #[arg(long)]
    seed_dir: Option<PathBuf>,
}

impl Cli {
    fn load_config(&self) -> Result<Config> {
        let mut config = match &self.config {
            Some(path) => Config::load_from(path)?,
            None => Config::load()?,
        };
        if let Some(port) = self.port {
            config.service.port = port;
        }
        if let Some(dir) = &self.seed_dir {
            config.store.seed_dir = Some(dir.clone());
        }
        Ok(config)
    }
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();

    let config = cli.load_config().context("loading configuration")?;
    init_tracing(&config)?;

    let store = tourbook::resources::store();
    if let Some(dir) = &config.store.seed_dir {
        seed_store(&store, dir)
            .await
            .with_context(|| format!("seeding from {}", dir.display()))?;
    }

    let state = AppState::new(config.clone(), store);
    let served = Server::new(config).serve(build_app(state)).await;

    shutdown_tracing();
    served?;

    Ok(())
}
