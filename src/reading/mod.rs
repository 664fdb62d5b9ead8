pub mod day;
pub mod station;

use thiserror::Error;

pub use day::{decode_day, DayRecord};
pub use station::{decode_station, StationRecord};

/// A record with a fixed on-disk width, laid out like a numpy compound dtype.
pub trait FixedRecord: Sized {
    const WIDTH: usize;

    /// Writes the record into `buf`, which is exactly `WIDTH` bytes long.
    fn encode(&self, buf: &mut [u8]);

    /// Reads a record back from exactly `WIDTH` bytes.
    fn decode(buf: &[u8]) -> Self;
}

/// Why an input line did not become a record.
#[derive(Error, Debug, Clone, PartialEq)]
pub enum SkipReason {
    #[error("expected 8 fields, found {0}")]
    WrongFieldCount(usize),

    #[error("line is not valid text")]
    InvalidText,

    #[error("station_id not set")]
    MissingStationId,

    #[error("unexpected station_id: {0}")]
    BadStationId(String),

    #[error("unable to convert {field}: '{value}' to float")]
    BadNumber { field: &'static str, value: String },

    #[error("can't encode {0} to ascii")]
    NonAscii(&'static str),
}

// Fixed-width string slots: overlong values are cut at the slot width and
// short ones are NUL padded.
pub(crate) fn put_str(slot: &mut [u8], value: &str) {
    let bytes = value.as_bytes();
    let n = bytes.len().min(slot.len());
    slot[..n].copy_from_slice(&bytes[..n]);
    slot[n..].fill(0);
}

pub(crate) fn get_str(slot: &[u8]) -> String {
    let end = slot.iter().rposition(|&b| b != 0).map_or(0, |i| i + 1);
    let bytes = &slot[..end];
    match std::str::from_utf8(bytes) {
        Ok(s) => s.to_string(),
        // a slot cut through a multi-byte character keeps its valid prefix
        Err(e) => String::from_utf8_lossy(&bytes[..e.valid_up_to()]).into_owned(),
    }
}

// -- Tests -------------------------------------------------------------------
