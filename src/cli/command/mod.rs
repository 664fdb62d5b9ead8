pub mod marker;
pub mod setup;
pub mod update;

pub use marker::marker;
pub use setup::setup;
pub use update::update;

use crate::{
    config::Config,
    error::{Error, Result},
};

/// The store named on the command line, else the configured `filename`.
pub fn resolve_filename(arg: Option<String>, config: &Config) -> Result<String> {
    arg.filter(|f| !f.is_empty())
        .or_else(|| config.filename.clone())
        .ok_or(Error::MissingFilename)
}

// -- Tests -------------------------------------------------------------------
