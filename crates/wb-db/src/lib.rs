//! Storage layer for the whereabouts tracker.
//!
//! Provides durable persistence for visit intervals using `rusqlite`.
//!
//! # Thread Safety
//!
//! The [`Database`] type wraps a `rusqlite::Connection`, which is `Send` but not `Sync`.
//! A `Database` instance can be moved between threads but cannot be shared across
//! threads without external synchronization. Write operations take `&mut self`, so
//! Rust itself enforces the single-writer model: wrap the instance in a `Mutex` (or
//! keep it on one task) and ingestion is serialized by construction.
//!
//! # Schema
//!
//! Timestamps are stored as TEXT in ISO 8601 format (e.g., `2024-01-15T10:30:00Z`),
//! always UTC, so lexicographic ordering matches chronological ordering and rows stay
//! human-readable. An open interval is a row whose `end_time` is NULL; at most one
//! such row exists at a time and it always has the greatest `start_time`. The end is
//! never stored as "now" — open intervals are resolved at read time.
//!
//! The opening observation's coordinate is kept alongside the interval for the
//! record; the core never interprets it.

use std::path::Path;

use chrono::{DateTime, SecondsFormat, Utc};
use rusqlite::{Connection, OptionalExtension, params};
use thiserror::Error;
use uuid::Uuid;

use wb_core::{
    Coordinate, CountryCode, IngestAction, IngestError, Observation, VisitInterval, VisitSpan,
    plan_ingest,
};

/// Database errors.
#[derive(Debug, Error)]
pub enum DbError {
    /// An error from the underlying database.
    #[error("sqlite error: {0}")]
    Sqlite(#[from] rusqlite::Error),

    /// The observation was rejected by the ingestion rules; nothing was written.
    #[error("observation rejected: {0}")]
    RejectedObservation(#[from] IngestError),

    /// Failed to parse a stored timestamp.
    #[error("invalid timestamp for visit {id}: {timestamp}")]
    TimestampParse {
        id: String,
        timestamp: String,
        #[source]
        source: chrono::ParseError,
    },

    /// A stored row carries an invalid country code.
    #[error("invalid country code for visit {id}: {value:?}")]
    CountryParse { id: String, value: String },

    /// A stored row carries an invalid UUID.
    #[error("invalid id for visit row: {value:?}")]
    IdParse {
        value: String,
        #[source]
        source: uuid::Error,
    },
}

/// A visit interval as stored, with its opening coordinate.
#[derive(Debug, Clone, PartialEq)]
pub struct StoredVisit {
    pub interval: VisitInterval,
    pub coordinate: Option<Coordinate>,
}

/// Database connection wrapper.
///
/// See the [module documentation](self) for thread safety considerations.
pub struct Database {
    conn: Connection,
}

impl Database {
    /// Opens a database at the given path, creating it if necessary.
    ///
    /// The database schema is automatically initialized on first open.
    pub fn open(path: &Path) -> Result<Self, DbError> {
        let conn = Connection::open(path)?;
        let db = Self { conn };
        db.init()?;
        Ok(db)
    }

    /// Opens an in-memory database.
    ///
    /// Useful for testing. The database is destroyed when the connection closes.
    pub fn open_in_memory() -> Result<Self, DbError> {
        let conn = Connection::open_in_memory()?;
        let db = Self { conn };
        db.init()?;
        Ok(db)
    }

    /// Initializes the database schema.
    ///
    /// This is idempotent - safe to call on an already-initialized database.
    fn init(&self) -> Result<(), DbError> {
        self.conn.execute_batch(
            "
            -- Visits table: one row per visit interval
            -- start_time/end_time: ISO 8601 UTC; end_time NULL = ongoing
            CREATE TABLE IF NOT EXISTS visits (
                id TEXT PRIMARY KEY,
                country_code TEXT NOT NULL,
                start_time TEXT NOT NULL,
                end_time TEXT,
                latitude REAL,
                longitude REAL
            );

            CREATE INDEX IF NOT EXISTS idx_visits_start ON visits(start_time);
            ",
        )?;
        Ok(())
    }

    /// Ingests one observation, applying at most one mutation atomically.
    ///
    /// Reads the last stored interval, plans the mutation with
    /// [`wb_core::plan_ingest`], and applies it inside a transaction, so a
    /// failure leaves the log at the last known-good state and concurrent
    /// readers never observe a partial mutation. The next observation simply
    /// retries the same decision logic.
    pub fn record_observation(
        &mut self,
        observation: &Observation,
    ) -> Result<IngestAction, DbError> {
        let last = self.last_visit()?;
        let action = plan_ingest(last.as_ref().map(|visit| &visit.interval), observation)?;

        let tx = self.conn.transaction()?;
        match &action {
            IngestAction::Open { country, start } => {
                insert_open(&tx, country, *start, observation.coordinate)?;
            }
            IngestAction::CloseAndOpen {
                end,
                country,
                start,
            } => {
                tx.execute(
                    "UPDATE visits SET end_time = ? WHERE end_time IS NULL",
                    params![format_timestamp(*end)],
                )?;
                insert_open(&tx, country, *start, observation.coordinate)?;
            }
            IngestAction::Unchanged => {}
        }
        tx.commit()?;

        tracing::debug!(?action, "observation recorded");
        Ok(action)
    }

    /// Appends a new open interval.
    pub fn append_open_interval(
        &mut self,
        interval: &VisitInterval,
        coordinate: Option<Coordinate>,
    ) -> Result<(), DbError> {
        let end = interval.span.end().map(format_timestamp);
        self.conn.execute(
            "
            INSERT INTO visits (id, country_code, start_time, end_time, latitude, longitude)
            VALUES (?, ?, ?, ?, ?, ?)
            ",
            params![
                interval.id.to_string(),
                interval.country.as_str(),
                format_timestamp(interval.span.start()),
                end,
                coordinate.map(|c| c.latitude),
                coordinate.map(|c| c.longitude),
            ],
        )?;
        Ok(())
    }

    /// Closes the open interval, if any, at `end`.
    ///
    /// Returns the number of rows closed (0 or 1 under normal operation).
    pub fn close_open_interval(&mut self, end: DateTime<Utc>) -> Result<usize, DbError> {
        let closed = self.conn.execute(
            "UPDATE visits SET end_time = ? WHERE end_time IS NULL",
            params![format_timestamp(end)],
        )?;
        Ok(closed)
    }

    /// Fetches all visits ordered by start time, ascending.
    pub fn fetch_all_ordered_by_start(&self) -> Result<Vec<StoredVisit>, DbError> {
        let mut stmt = self.conn.prepare(
            "
            SELECT id, country_code, start_time, end_time, latitude, longitude
            FROM visits
            ORDER BY start_time ASC, id ASC
            ",
        )?;
        let rows = stmt.query_map([], row_to_raw)?;
        let mut visits = Vec::new();
        for row in rows {
            visits.push(parse_visit(row?)?);
        }
        Ok(visits)
    }

    /// Returns the visit with the greatest start time.
    pub fn last_visit(&self) -> Result<Option<StoredVisit>, DbError> {
        let raw = self
            .conn
            .query_row(
                "
                SELECT id, country_code, start_time, end_time, latitude, longitude
                FROM visits
                ORDER BY start_time DESC, id DESC
                LIMIT 1
                ",
                [],
                row_to_raw,
            )
            .optional()?;
        raw.map(parse_visit).transpose()
    }

    /// Returns the number of stored visits.
    pub fn visit_count(&self) -> Result<usize, DbError> {
        let count: i64 = self
            .conn
            .query_row("SELECT COUNT(*) FROM visits", [], |row| row.get(0))?;
        Ok(usize::try_from(count).unwrap_or_default())
    }

    /// Deletes the entire visit log.
    ///
    /// Maintenance operation; returns the number of rows removed.
    pub fn reset(&mut self) -> Result<usize, DbError> {
        let removed = self.conn.execute("DELETE FROM visits", [])?;
        tracing::info!(removed, "visit log reset");
        Ok(removed)
    }
}

/// Raw row values before parsing into domain types.
type RawVisit = (String, String, String, Option<String>, Option<f64>, Option<f64>);

fn row_to_raw(row: &rusqlite::Row<'_>) -> rusqlite::Result<RawVisit> {
    Ok((
        row.get(0)?,
        row.get(1)?,
        row.get(2)?,
        row.get(3)?,
        row.get(4)?,
        row.get(5)?,
    ))
}

fn insert_open(
    tx: &rusqlite::Transaction<'_>,
    country: &CountryCode,
    start: DateTime<Utc>,
    coordinate: Option<Coordinate>,
) -> Result<(), DbError> {
    tx.execute(
        "
        INSERT INTO visits (id, country_code, start_time, end_time, latitude, longitude)
        VALUES (?, ?, ?, NULL, ?, ?)
        ",
        params![
            Uuid::new_v4().to_string(),
            country.as_str(),
            format_timestamp(start),
            coordinate.map(|c| c.latitude),
            coordinate.map(|c| c.longitude),
        ],
    )?;
    Ok(())
}

fn parse_visit(raw: RawVisit) -> Result<StoredVisit, DbError> {
    let (id, country, start, end, latitude, longitude) = raw;
    let uuid = Uuid::parse_str(&id).map_err(|source| DbError::IdParse {
        value: id.clone(),
        source,
    })?;
    let country = CountryCode::new(&country).map_err(|_| DbError::CountryParse {
        id: id.clone(),
        value: country,
    })?;
    let start = parse_timestamp(&id, &start)?;
    let span = match end {
        Some(end) => VisitSpan::Closed {
            start,
            end: parse_timestamp(&id, &end)?,
        },
        None => VisitSpan::Open { start },
    };
    let coordinate = match (latitude, longitude) {
        (Some(latitude), Some(longitude)) => Some(Coordinate {
            latitude,
            longitude,
        }),
        _ => None,
    };
    Ok(StoredVisit {
        interval: VisitInterval {
            id: uuid,
            country,
            span,
        },
        coordinate,
    })
}

fn format_timestamp(ts: DateTime<Utc>) -> String {
    ts.to_rfc3339_opts(SecondsFormat::Millis, true)
}

fn parse_timestamp(id: &str, value: &str) -> Result<DateTime<Utc>, DbError> {
    DateTime::parse_from_rfc3339(value)
        .map(|dt| dt.with_timezone(&Utc))
        .map_err(|source| DbError::TimestampParse {
            id: id.to_string(),
            timestamp: value.to_string(),
            source,
        })
}

#[cfg(test)]
mod tests {
    use super::*;

    fn code(s: &str) -> CountryCode {
        CountryCode::new(s).unwrap()
    }

    fn ts(s: &str) -> DateTime<Utc> {
        s.parse().unwrap()
    }

    fn observe(db: &mut Database, at: &str, country: &str) -> Result<IngestAction, DbError> {
        db.record_observation(&Observation::new(ts(at), code(country)))
    }

    #[test]
    fn first_observation_opens_interval() {
        let mut db = Database::open_in_memory().unwrap();
        let action = observe(&mut db, "2024-01-01T08:00:00Z", "US").unwrap();
        assert!(matches!(action, IngestAction::Open { .. }));

        let visits = db.fetch_all_ordered_by_start().unwrap();
        assert_eq!(visits.len(), 1);
        assert_eq!(visits[0].interval.country, code("US"));
        assert!(visits[0].interval.span.is_open());
    }

    #[test]
    fn repeated_observation_is_noop() {
        let mut db = Database::open_in_memory().unwrap();
        observe(&mut db, "2024-01-01T08:00:00Z", "US").unwrap();
        let action = observe(&mut db, "2024-01-02T08:00:00Z", "US").unwrap();
        assert_eq!(action, IngestAction::Unchanged);
        assert_eq!(db.visit_count().unwrap(), 1);
    }

    #[test]
    fn country_change_closes_then_opens() {
        let mut db = Database::open_in_memory().unwrap();
        observe(&mut db, "2024-01-01T08:00:00Z", "US").unwrap();
        observe(&mut db, "2024-01-03T12:00:00Z", "CA").unwrap();

        let visits = db.fetch_all_ordered_by_start().unwrap();
        assert_eq!(visits.len(), 2);
        assert_eq!(
            visits[0].interval.span.end(),
            Some(ts("2024-01-03T12:00:00Z"))
        );
        assert_eq!(visits[1].interval.country, code("CA"));
        assert!(visits[1].interval.span.is_open());
    }

    #[test]
    fn out_of_order_observation_writes_nothing() {
        let mut db = Database::open_in_memory().unwrap();
        observe(&mut db, "2024-01-05T08:00:00Z", "US").unwrap();
        let before = db.fetch_all_ordered_by_start().unwrap();

        let err = observe(&mut db, "2024-01-04T08:00:00Z", "CA").unwrap_err();
        assert!(matches!(
            err,
            DbError::RejectedObservation(IngestError::OutOfOrderObservation { .. })
        ));
        assert_eq!(db.fetch_all_ordered_by_start().unwrap(), before);
    }

    #[test]
    fn visits_survive_reopen() {
        let temp = tempfile::tempdir().unwrap();
        let path = temp.path().join("visits.db");

        {
            let mut db = Database::open(&path).unwrap();
            observe(&mut db, "2024-01-01T08:00:00Z", "US").unwrap();
            observe(&mut db, "2024-01-03T12:00:00Z", "CA").unwrap();
        }

        let db = Database::open(&path).unwrap();
        let visits = db.fetch_all_ordered_by_start().unwrap();
        assert_eq!(visits.len(), 2);
        assert_eq!(visits[1].interval.country, code("CA"));
        assert!(visits[1].interval.span.is_open());
    }

    #[test]
    fn coordinate_is_stored_with_opening_observation() {
        let mut db = Database::open_in_memory().unwrap();
        let observation = Observation {
            timestamp: ts("2024-01-01T08:00:00Z"),
            country: Some(code("RO")),
            coordinate: Some(Coordinate {
                latitude: 44.432_25,
                longitude: 26.106_26,
            }),
        };
        db.record_observation(&observation).unwrap();

        let visits = db.fetch_all_ordered_by_start().unwrap();
        assert_eq!(visits[0].coordinate, observation.coordinate);
    }

    #[test]
    fn last_visit_returns_greatest_start() {
        let mut db = Database::open_in_memory().unwrap();
        assert!(db.last_visit().unwrap().is_none());

        observe(&mut db, "2024-01-01T08:00:00Z", "US").unwrap();
        observe(&mut db, "2024-01-03T12:00:00Z", "CA").unwrap();

        let last = db.last_visit().unwrap().unwrap();
        assert_eq!(last.interval.country, code("CA"));
    }

    #[test]
    fn reset_wipes_the_log() {
        let mut db = Database::open_in_memory().unwrap();
        observe(&mut db, "2024-01-01T08:00:00Z", "US").unwrap();
        observe(&mut db, "2024-01-03T12:00:00Z", "CA").unwrap();

        assert_eq!(db.reset().unwrap(), 2);
        assert_eq!(db.visit_count().unwrap(), 0);
        assert!(db.last_visit().unwrap().is_none());
    }

    #[test]
    fn close_open_interval_affects_single_row() {
        let mut db = Database::open_in_memory().unwrap();
        let interval = VisitInterval::new_open(code("FR"), ts("2024-01-01T08:00:00Z"));
        db.append_open_interval(&interval, None).unwrap();

        assert_eq!(db.close_open_interval(ts("2024-01-02T08:00:00Z")).unwrap(), 1);
        assert_eq!(db.close_open_interval(ts("2024-01-03T08:00:00Z")).unwrap(), 0);

        let visits = db.fetch_all_ordered_by_start().unwrap();
        assert_eq!(
            visits[0].interval.span.end(),
            Some(ts("2024-01-02T08:00:00Z"))
        );
    }
}
