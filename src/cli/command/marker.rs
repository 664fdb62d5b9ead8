//! Reports the row marker of a store.

use crate::{
    config::Config,
    error::Result,
    table::{open_store, row_marker, ProgressMarker},
};

pub fn marker(filename: &str, config: &Config) -> Result<String> {
    let store = open_store(filename, config)?;

    Ok(describe(row_marker(&store.data)?))
}

fn describe(marker: Option<ProgressMarker>) -> String {
    match marker {
        Some(m) => format!("year: {} row: {}", m.year, m.row),
        None => "not found".to_string(),
    }
}

// -- Tests -------------------------------------------------------------------
