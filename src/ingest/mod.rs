//! Ingestion passes over the object store.

pub mod driver;
pub mod stations;
pub mod year;

pub use driver::ingest_years;
pub use stations::ingest_stations;
