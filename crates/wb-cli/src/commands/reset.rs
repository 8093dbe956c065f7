//! Reset command for wiping the visit log.

use std::io::Write;

use anyhow::Result;

use wb_db::Database;

pub fn run<W: Write>(writer: &mut W, db: &mut Database, yes: bool) -> Result<()> {
    if !yes {
        writeln!(writer, "This deletes the entire visit log. Re-run with --yes to confirm.")?;
        return Ok(());
    }

    let removed = db.reset()?;
    writeln!(writer, "Deleted {removed} visits.")?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    use chrono::{DateTime, Utc};
    use wb_core::{CountryCode, Observation};

    fn ts(s: &str) -> DateTime<Utc> {
        s.parse().unwrap()
    }

    #[test]
    fn reset_requires_confirmation() {
        let mut db = Database::open_in_memory().unwrap();
        db.record_observation(&Observation::new(
            ts("2024-01-01T08:00:00Z"),
            CountryCode::new("US").unwrap(),
        ))
        .unwrap();

        let mut output = Vec::new();
        run(&mut output, &mut db, false).unwrap();
        assert_eq!(db.visit_count().unwrap(), 1);

        run(&mut output, &mut db, true).unwrap();
        assert_eq!(db.visit_count().unwrap(), 0);

        let output = String::from_utf8(output).unwrap();
        assert!(output.contains("--yes to confirm"));
        assert!(output.contains("Deleted 1 visits."));
    }
}
