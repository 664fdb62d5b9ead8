//! Command line interface.

pub mod command;

use clap::{Parser, Subcommand};
use indicatif::{ProgressBar, ProgressDrawTarget, ProgressStyle};
use tracing::level_filters::LevelFilter;
use tracing_subscriber::fmt;

use crate::config::Config;

#[derive(Parser)]
#[command(version, about, long_about = None)]
/// Keeps a local store of GHCN-D daily observations up to date.
///
/// Any configuration key can be set with `--key=value`.
pub struct Cli {
    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Subcommand)]
pub enum Commands {
    /// Load new stations and observations
    Update {
        /// Store to update, instead of the configured `filename`
        filename: Option<String>,
    },
    /// Create the store and its tables
    Setup {
        /// Store to create, instead of the configured `filename`
        filename: Option<String>,
    },
    /// Show how far the current year has been loaded
    Marker {
        /// Store to inspect, instead of the configured `filename`
        filename: Option<String>,
    },
}

/// Starts logging to stderr at the configured level.
pub fn init_logging(config: &Config) {
    let level = match config.log_level() {
        Some(level) => level,
        None => {
            eprintln!(
                "Unknown log_level '{}', using DEBUG",
                config.log_level
            );
            LevelFilter::DEBUG
        }
    };

    fmt()
        .with_max_level(level)
        .with_target(false)
        .with_timer(fmt::time::uptime())
        .with_writer(std::io::stderr)
        .init();
}

/// Whether progress bars are drawn. Chattier log levels would scroll them
/// away.
pub fn show_progress(config: &Config) -> bool {
    matches!(
        config.log_level(),
        Some(level) if level <= LevelFilter::WARN
    )
}

/// Creates a byte progress bar, hidden unless `visible`.
pub fn create_progress_bar(visible: bool) -> ProgressBar {
    let bar = ProgressBar::new(0).with_style(
        ProgressStyle::with_template(
            "[{eta_precise}] {bar:40.cyan/blue} {bytes}/{total_bytes} {msg}",
        )
        .unwrap_or_else(|_| ProgressStyle::default_bar())
        .progress_chars("##-"),
    );
    if !visible {
        bar.set_draw_target(ProgressDrawTarget::hidden());
    }

    bar
}

// -- Tests -------------------------------------------------------------------
