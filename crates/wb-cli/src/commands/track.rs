//! Track command for recording a country observation.

use std::io::Write;

use anyhow::{Context, Result};
use chrono::{DateTime, Utc};

use wb_core::{Coordinate, CountryCode, IngestAction, IngestError, Observation};
use wb_db::{Database, DbError};

/// Records one observation.
///
/// Out-of-order observations are logged and dropped rather than treated
/// as fatal: the observation source gives no ordering guarantee, and
/// the log never rewrites history.
pub fn run<W: Write>(
    writer: &mut W,
    db: &mut Database,
    code: &str,
    at: DateTime<Utc>,
    coordinate: Option<Coordinate>,
) -> Result<()> {
    let country: CountryCode = code
        .parse()
        .with_context(|| format!("invalid country code {code:?}"))?;
    let observation = Observation {
        timestamp: at,
        country: Some(country.clone()),
        coordinate,
    };

    match db.record_observation(&observation) {
        Ok(IngestAction::Open { start, .. }) => {
            writeln!(
                writer,
                "Now in {} (since {})",
                country.label(),
                start.format("%-d %b %Y %H:%M")
            )?;
        }
        Ok(IngestAction::CloseAndOpen { .. }) => {
            writeln!(writer, "Moved to {}", country.label())?;
        }
        Ok(IngestAction::Unchanged) => {
            writeln!(writer, "Still in {}", country.label())?;
        }
        Err(DbError::RejectedObservation(err @ IngestError::OutOfOrderObservation { .. })) => {
            tracing::warn!(%err, "observation dropped");
            writeln!(writer, "Dropped out-of-order observation: {err}")?;
        }
        Err(err) => return Err(err.into()),
    }
    Ok(())
}
