//! Reloads the station catalog when its ETag changes.

use tracing::{info, warn};

use crate::{
    config::Config,
    download::ObjectStore,
    error::Result,
    reading::{decode_station, StationRecord},
    table::{set_station_etag, station_etag, Dataset, ETAG_ATTR},
};

/// Returns the number of stations written, 0 when the catalog is missing,
/// unreachable or unchanged.
pub async fn ingest_stations<S, D>(store: &S, stations: &mut D, config: &Config) -> Result<u64>
where
    S: ObjectStore,
    D: Dataset<Record = StationRecord>,
{
    let bucket = config.ghcn_bucket.as_str();
    let key = config.stations_key.as_str();

    let meta = match store.head(bucket, key).await {
        Ok(Some(meta)) => meta,
        Ok(None) => {
            warn!("{} not found", key);
            return Ok(0);
        }
        Err(e) => {
            warn!("Unable to check {}: {}", key, e);
            return Ok(0);
        }
    };

    match &meta.etag {
        Some(etag) if station_etag(stations)?.as_deref() == Some(etag.as_str()) => {
            info!("Stations unchanged (etag {})", etag);
            return Ok(0);
        }
        Some(_) => {}
        None => warn!("{} has no etag, reloading", key),
    }

    let body = match store.get(bucket, key).await {
        Ok(body) => body,
        Err(e) => {
            warn!("Unable to fetch {}: {}", key, e);
            return Ok(0);
        }
    };

    let text = String::from_utf8_lossy(&body);
    let mut records = Vec::new();
    for (i, line) in text.split('\n').enumerate() {
        if line.trim().is_empty() {
            continue;
        }
        match decode_station(line) {
            Ok(record) => records.push(record),
            Err(reason) => warn!("{} line {}: {}, skipping", key, i + 1, reason),
        }
    }

    if records.is_empty() {
        warn!("No stations decoded from {}", key);
        return Ok(0);
    }

    let count = records.len() as u64;
    if count > stations.len() {
        stations.resize(count)?;
    }
    stations.write_slab(0, &records)?;

    match &meta.etag {
        Some(etag) => set_station_etag(stations, etag)?,
        None => {
            stations.delete_attr(ETAG_ATTR)?;
            stations.flush()?;
        }
    }

    info!("Loaded {} stations", count);

    Ok(count)
}

// -- Tests -------------------------------------------------------------------
