//! Extensible record tables and their attributes.

pub mod file;
#[cfg(test)]
pub mod memory;

use serde::{Deserialize, Serialize};
use serde_json::Value;
use tracing::{error, info};

use crate::{
    config::Config,
    error::{Error, Result},
    reading::FixedRecord,
};

pub use file::FileStore;

/// Name of the day-record table.
pub const DATA_TABLE: &str = "data";
/// Name of the station table.
pub const STATIONS_TABLE: &str = "stations";
/// Chunk granularity of the day-record table, in records.
pub const DATA_CHUNK_RECORDS: u64 = 91_268;

pub const ROW_MARKER_ATTR: &str = "_row_marker";
pub const ETAG_ATTR: &str = "_etag";

/// A 1-D array of fixed-width records with named attributes.
///
/// The ingesters own their table exclusively; nothing here locks.
pub trait Dataset {
    type Record: FixedRecord;

    fn len(&self) -> u64;

    fn is_empty(&self) -> bool {
        self.len() == 0
    }

    fn resize(&mut self, len: u64) -> Result<()>;

    fn write_slab(&mut self, offset: u64, records: &[Self::Record]) -> Result<()>;

    fn read(&self, index: u64) -> Result<Self::Record>;

    fn attr(&self, name: &str) -> Result<Option<Value>>;

    fn set_attr(&mut self, name: &str, value: Value) -> Result<()>;

    fn delete_attr(&mut self, name: &str) -> Result<()>;

    /// Commits the current length without touching the attributes.
    fn flush(&mut self) -> Result<()>;

    /// Grows the table and writes `records` at the old end.
    fn append(&mut self, records: &[Self::Record]) -> Result<u64> {
        let next_row = self.len();
        let count = records.len() as u64;
        self.resize(next_row + count)?;
        self.write_slab(next_row, records)?;
        Ok(count)
    }
}

/// How far ingestion got through one year's CSV.
///
/// Stored as the two element array `[year, row]`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(from = "(i32, i64)", into = "(i32, i64)")]
pub struct ProgressMarker {
    pub year: i32,
    /// Lines of the year's CSV consumed so far, malformed ones included.
    pub row: i64,
}

impl From<(i32, i64)> for ProgressMarker {
    fn from((year, row): (i32, i64)) -> Self {
        ProgressMarker { year, row }
    }
}

impl From<ProgressMarker> for (i32, i64) {
    fn from(m: ProgressMarker) -> Self {
        (m.year, m.row)
    }
}

pub fn row_marker<D: Dataset>(data: &D) -> Result<Option<ProgressMarker>> {
    match data.attr(ROW_MARKER_ATTR)? {
        Some(value) => Ok(Some(serde_json::from_value(value)?)),
        None => Ok(None),
    }
}

pub fn set_row_marker<D: Dataset>(data: &mut D, marker: ProgressMarker) -> Result<()> {
    data.set_attr(ROW_MARKER_ATTR, serde_json::to_value(marker)?)
}

pub fn station_etag<D: Dataset>(stations: &D) -> Result<Option<String>> {
    match stations.attr(ETAG_ATTR)? {
        Some(value) => Ok(Some(serde_json::from_value(value)?)),
        None => Ok(None),
    }
}

pub fn set_station_etag<D: Dataset>(stations: &mut D, etag: &str) -> Result<()> {
    stations.set_attr(ETAG_ATTR, Value::String(etag.to_string()))
}

/// Where a store lives, decided by the path prefix.
#[derive(Debug, PartialEq)]
pub enum StoreLocation {
    Local(String),
    /// An HSDS domain (`hdf5://...`).
    Remote {
        domain: String,
        endpoint: Option<String>,
        username: Option<String>,
        has_password: bool,
    },
}

impl StoreLocation {
    pub fn parse(path: &str, config: &Config) -> Self {
        if path.starts_with("hdf5://") {
            StoreLocation::Remote {
                domain: path.to_string(),
                endpoint: config.hsds_endpoint.clone(),
                username: config.hsds_username.clone(),
                has_password: config.hsds_password.is_some(),
            }
        } else {
            StoreLocation::Local(path.to_string())
        }
    }
}

/// Opens the tables at `path` for update.
pub fn open_store(path: &str, config: &Config) -> Result<FileStore> {
    let path = local_path(path, config)?;
    info!("Opening store: {}", path);
    FileStore::open(path)
}

/// Creates the store at `path` and any missing table.
pub fn create_store(path: &str, config: &Config) -> Result<FileStore> {
    let path = local_path(path, config)?;
    FileStore::create(path)
}

fn local_path(path: &str, config: &Config) -> Result<String> {
    match StoreLocation::parse(path, config) {
        StoreLocation::Local(path) => Ok(path),
        StoreLocation::Remote {
            domain,
            endpoint,
            username,
            has_password,
        } => {
            error!(
                "HSDS domain {} requested (user: {}, password set: {})",
                domain,
                username.as_deref().unwrap_or("anonymous"),
                has_password
            );
            Err(Error::UnsupportedStore {
                path: domain,
                endpoint: endpoint.unwrap_or_else(|| "default".to_string()),
            })
        }
    }
}

// -- Tests -------------------------------------------------------------------
