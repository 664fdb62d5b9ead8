//! Error types shared by the ingestion pipeline.

use std::path::PathBuf;

use thiserror::Error;

pub type Result<T> = std::result::Result<T, Error>;

#[derive(Error, Debug)]
pub enum Error {
    #[error("config.yml not found in config dirs: {dirs:?}")]
    ConfigNotFound { dirs: Vec<PathBuf> },

    #[error("error parsing '{path}': {source}")]
    ConfigParse {
        path: PathBuf,
        #[source]
        source: serde_yaml::Error,
    },

    #[error("configuration error: {0}")]
    Config(String),

    #[error("no filename provided")]
    MissingFilename,

    #[error("remote store '{path}' is not supported by this build (endpoint: {endpoint})")]
    UnsupportedStore { path: String, endpoint: String },

    #[error("object store error: {0}")]
    Fetch(#[from] FetchError),

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("attribute encoding error: {0}")]
    Attribute(#[from] serde_json::Error),

    #[error("store error: {0}")]
    Store(String),
}

impl Error {
    /// Failures the next polling pass may not see again.
    pub fn is_transient(&self) -> bool {
        match self {
            Error::Fetch(e) => e.is_transient(),
            _ => false,
        }
    }
}

/// Object store failures, as seen by the fetcher.
#[derive(Error, Debug)]
pub enum FetchError {
    #[error("key not found")]
    NotFound,

    #[error("requested range not satisfiable")]
    InvalidRange,

    #[error("unexpected HTTP status {0}")]
    Status(u16),

    #[error("range request answered with status {0}, not 206")]
    RangeIgnored(u16),

    #[error("response has no usable Content-Length")]
    MissingLength,

    #[error("transport error: {0}")]
    Transport(#[from] reqwest::Error),
}

impl FetchError {
    pub fn is_transient(&self) -> bool {
        matches!(
            self,
            FetchError::Status(_) | FetchError::Transport(_) | FetchError::MissingLength
        )
    }
}

// -- Tests -------------------------------------------------------------------
