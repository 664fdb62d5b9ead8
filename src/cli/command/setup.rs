//! Creates the store and its tables.

use tracing::info;

use crate::{
    config::Config,
    error::Result,
    table::{create_store, Dataset},
};

/// Safe to run against an existing store; tables already present are kept.
pub fn setup(filename: &str, config: &Config) -> Result<String> {
    let store = create_store(filename, config)?;
    info!(
        "Store {} ready: {} observations, {} stations",
        store.root.display(),
        store.data.len(),
        store.stations.len()
    );

    Ok(store.root.display().to_string())
}

// -- Tests -------------------------------------------------------------------
