//! Command-line argument definitions.

use std::path::PathBuf;

use chrono::{DateTime, Utc};
use clap::{Parser, Subcommand, ValueEnum};

/// Country-visit tracker.
///
/// Turns a stream of (timestamp, country) observations into a durable
/// visit log, readable period summaries, and per-country day statistics.
#[derive(Debug, Parser)]
#[command(name = "wb", version, about, long_about = None)]
pub struct Cli {
    /// Enable verbose output.
    #[arg(short, long, global = true)]
    pub verbose: bool,

    /// Path to config file.
    #[arg(short, long, global = true)]
    pub config: Option<PathBuf>,

    #[command(subcommand)]
    pub command: Option<Commands>,
}

/// Available subcommands.
#[derive(Debug, Subcommand)]
pub enum Commands {
    /// Record a country observation.
    Track {
        /// ISO 3166-1 alpha-2 country code (e.g. US, ro).
        code: String,

        /// Observation timestamp (RFC 3339); defaults to now.
        #[arg(long)]
        at: Option<DateTime<Utc>>,

        /// Observation latitude.
        #[arg(long, requires = "lon", allow_negative_numbers = true)]
        lat: Option<f64>,

        /// Observation longitude.
        #[arg(long, requires = "lat", allow_negative_numbers = true)]
        lon: Option<f64>,
    },

    /// Show the current country and most recent visit.
    Status,

    /// List visit summaries, most recent first.
    History {
        /// Output as JSON.
        #[arg(long)]
        json: bool,
    },

    /// List per-country totals.
    Countries {
        /// Sort key.
        #[arg(long, value_enum, default_value_t = SortField::Name)]
        sort: SortField,

        /// Sort descending instead of ascending.
        #[arg(long)]
        desc: bool,

        /// Output as JSON.
        #[arg(long)]
        json: bool,
    },

    /// Show full/partial day details for one country.
    Country {
        /// ISO 3166-1 alpha-2 country code.
        code: String,

        /// Output as JSON.
        #[arg(long)]
        json: bool,
    },

    /// Delete the entire visit log.
    Reset {
        /// Confirm the deletion.
        #[arg(long)]
        yes: bool,
    },

    /// Seed a small demo itinerary for trying the tool out.
    Demo,
}

/// Sort key for `wb countries`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
pub enum SortField {
    /// Sort by country name.
    Name,
    /// Sort by total dwell time.
    Time,
}

impl From<SortField> for wb_core::SortKey {
    fn from(field: SortField) -> Self {
        match field {
            SortField::Name => Self::Name,
            SortField::Time => Self::Time,
        }
    }
}
