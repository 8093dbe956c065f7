//! Demo command that seeds a small sample itinerary.

use std::io::Write;

use anyhow::Result;
use chrono::{DateTime, Utc};

use wb_core::{Coordinate, CountryCode, Observation};
use wb_db::Database;

/// Sample observations: capital-city coordinates for a two-year trip.
const ITINERARY: &[(&str, &str, f64, f64)] = &[
    ("US", "2023-04-01T08:15:00Z", 38.889_805, -77.009_056),
    ("CA", "2023-07-10T14:42:00Z", 45.424_721, -75.695),
    ("FR", "2023-08-18T09:30:00Z", 48.864_716, 2.349_014),
    ("RO", "2024-04-06T20:10:00Z", 44.432_25, 26.106_26),
    ("US", "2025-04-08T11:00:00Z", 38.889_805, -77.009_056),
];

pub fn run<W: Write>(writer: &mut W, db: &mut Database) -> Result<()> {
    let mut recorded = 0;
    for &(code, at, latitude, longitude) in ITINERARY {
        let observation = Observation {
            timestamp: at.parse::<DateTime<Utc>>()?,
            country: Some(CountryCode::new(code)?),
            coordinate: Some(Coordinate {
                latitude,
                longitude,
            }),
        };
        match db.record_observation(&observation) {
            Ok(_) => recorded += 1,
            Err(err) => {
                // Existing newer data makes the sample out-of-order; skip it
                tracing::warn!(%err, code, "skipped demo observation");
            }
        }
    }

    writeln!(writer, "Seeded {recorded} demo observations.")?;
    writeln!(writer, "Try `wb history` or `wb countries`.")?;
    Ok(())
}
