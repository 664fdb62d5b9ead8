//! Walks the years from where the table left off.

use indicatif::ProgressBar;
use tracing::{info, warn};

use super::year::ingest_year;
use crate::{
    config::Config,
    download::ObjectStore,
    error::Result,
    reading::DayRecord,
    table::{row_marker, Dataset},
};

/// Loads years in ascending order until two consecutive years add nothing or
/// `last_year` is reached. Returns the total number of rows appended.
///
/// A failed download ends the pass at that year, so no row of a later year is
/// appended while the failed one is incomplete.
pub async fn ingest_years<S, D>(
    store: &S,
    data: &mut D,
    config: &Config,
    progress: &ProgressBar,
) -> Result<u64>
where
    S: ObjectStore,
    D: Dataset<Record = DayRecord>,
{
    let last_year = config.last_year();
    let mut year = first_year(data, config)?;
    let mut empty_years = 0;
    let mut total = 0;

    info!("Loading years {} to {}", year, last_year - 1);

    while year < last_year {
        match ingest_year(store, data, config, year, progress).await {
            Ok(0) => {
                empty_years += 1;
                if empty_years >= 2 {
                    info!("No new rows for {} and {}, stopping", year - 1, year);
                    break;
                }
            }
            Ok(rows) => {
                empty_years = 0;
                total += rows;
            }
            Err(e) if e.is_transient() => {
                warn!("Unable to load {}: {}", year, e);
                break;
            }
            Err(e) => return Err(e),
        }
        year += 1;
    }

    Ok(total)
}

/// The year of the last stored row, or `start_year` for an empty table.
fn first_year<D: Dataset<Record = DayRecord>>(data: &D, config: &Config) -> Result<i32> {
    if data.is_empty() {
        return Ok(config.start_year);
    }

    let last = data.read(data.len() - 1)?;
    if let Some(year) = last.year() {
        return Ok(year);
    }

    warn!("Unreadable ymd '{}' in last row", last.ymd);
    Ok(row_marker(data)?.map_or(config.start_year, |m| m.year))
}

// -- Tests -------------------------------------------------------------------
