mod cli;
mod config;
mod download;
mod error;
mod ingest;
mod reading;
mod reframe;
mod table;
#[cfg(test)]
mod testing;

use anyhow::{Context, Result};
use clap::Parser;
use cli::{
    command::{self, resolve_filename},
    Cli, Commands,
};
use config::{Config, Overrides};
use download::HttpStore;
use tracing::warn;

#[tokio::main]
async fn main() -> Result<()> {
    let (args, overrides) = Overrides::split_args(std::env::args());
    let cli = Cli::parse_from(args);

    let config = config::load(&overrides).context("Unable to load configuration")?;
    cli::init_logging(&config);

    let result = tokio::select! {
        result = run(cli.command, &config) => result,
        _ = tokio::signal::ctrl_c() => {
            warn!("Interrupted, shutting down");
            return Ok(());
        }
    };

    println!("{}", result?);

    Ok(())
}

async fn run(subcommand: Commands, config: &Config) -> Result<String> {
    match subcommand {
        Commands::Update { filename } => {
            let filename = resolve_filename(filename, config)?;
            let store = HttpStore::new(&config.object_endpoint)?;
            let filename = command::update(&store, &filename, config)
                .await
                .with_context(|| format!("Update of `{}` failed", filename))?;
            Ok(format!("Store `{}` is up to date", filename))
        }
        Commands::Setup { filename } => {
            let filename = resolve_filename(filename, config)?;
            let root = command::setup(&filename, config)
                .with_context(|| format!("Unable to create `{}`", filename))?;
            Ok(format!("Store created at `{}`", root))
        }
        Commands::Marker { filename } => {
            let filename = resolve_filename(filename, config)?;
            Ok(command::marker(&filename, config)?)
        }
    }
}
