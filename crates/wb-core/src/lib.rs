//! Core domain logic for the whereabouts tracker.
//!
//! This crate contains the fundamental types and logic for:
//! - Interval log: an ordered record of continuous presence per country
//! - Ingestion: turning (timestamp, country) observations into intervals
//! - Summaries: most-recent-first, human-readable visit descriptions
//! - Day classification: full vs. partial calendar days per country
//! - Profiles: per-country dwell time and day totals
//!
//! All read-side transforms are pure functions over an interval
//! snapshot; "now" and the display timezone are explicit parameters.

pub mod day;
pub mod interval;
pub mod profile;
pub mod summary;
pub mod types;

pub use day::{DayClassification, DayRun, classify_days};
pub use interval::{
    IngestAction, IngestError, InvariantViolation, Observation, VisitInterval, VisitLog,
    VisitSpan, plan_ingest,
};
pub use profile::{CountryProfile, SortKey, SortOrder, build_profiles, sort_profiles};
pub use summary::{VisitSummary, generate as generate_summaries};
pub use types::{Coordinate, CountryCode, ValidationError};
