//! Loads new stations and observations, once or on a polling interval.

use std::time::Duration;

use indicatif::ProgressBar;
use tracing::{error, info};

use crate::{
    cli::{create_progress_bar, show_progress},
    config::Config,
    download::ObjectStore,
    error::Result,
    ingest::{ingest_stations, ingest_years},
    table::open_store,
};

/// Runs passes until one fails or, with `run_forever`, until interrupted.
pub async fn update<S: ObjectStore>(
    store: &S,
    filename: &str,
    config: &Config,
) -> Result<String> {
    let progress = create_progress_bar(show_progress(config));

    loop {
        match run_pass(store, filename, config, &progress).await {
            Ok(rows) => info!("Pass complete, {} rows appended", rows),
            Err(e) if config.run_forever => error!("Pass failed: {}", e),
            Err(e) => return Err(e),
        }

        if !config.run_forever {
            progress.finish_and_clear();
            return Ok(filename.to_string());
        }

        info!("Next pass in {} minutes", config.polling_interval);
        tokio::time::sleep(Duration::from_secs(config.polling_interval * 60)).await;
    }
}

/// Opens the store, refreshes the stations, then appends new observations.
pub async fn run_pass<S: ObjectStore>(
    store: &S,
    filename: &str,
    config: &Config,
    progress: &ProgressBar,
) -> Result<u64> {
    let mut tables = open_store(filename, config)?;

    ingest_stations(store, &mut tables.stations, config).await?;
    ingest_years(store, &mut tables.data, config, progress).await
}

// -- Tests -------------------------------------------------------------------
