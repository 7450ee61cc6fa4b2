//! SQLite-backed durable store.
//!
//! Every natural key in the data model is a UNIQUE constraint, so separate
//! processes sharing one database file converge on the same rows:
//!
//!   slr          - reviews, gold-set studies and the citation graph
//!   params       - get-or-create for topic and formulation parameter tuples
//!   sweep        - search strings and sweep units (one transaction per unit)
//!   cache        - append-only memoization entries
//!   performance  - search performance records and membership lists

use crate::error::{is_unique_violation, Error, Result};
use parking_lot::Mutex;
use rusqlite::{Connection, OptionalExtension, Params};
use std::path::Path;
use std::time::Duration;
use tracing::info;

mod cache;
mod params;
mod performance;
mod schema;
mod slr;
mod sweep;

pub use performance::ExperimentStatus;
pub use slr::{Experiment, ImportSummary, NewStudy, Slr, SlrImport, Study};
pub use sweep::{SearchString, SweepKey, UnitOutcome};

const BUSY_TIMEOUT: Duration = Duration::from_secs(10);

/// Thread-safe database wrapper.
pub struct Store {
    /// `pub` for tests that need raw access.
    pub conn: Mutex<Connection>,
}

impl Store {
    /// Open (or create) the database file and run migrations.
    pub fn open(path: &Path) -> Result<Self> {
        info!("Opening store at {:?}", path);
        let conn = Connection::open(path)?;
        conn.busy_timeout(BUSY_TIMEOUT)?;
        // WAL lets a retrieval process read while a sweep process writes.
        conn.execute_batch("PRAGMA journal_mode=WAL;").ok();
        Self::init(conn)
    }

    pub fn open_in_memory() -> Result<Self> {
        Self::init(Connection::open_in_memory()?)
    }

    fn init(conn: Connection) -> Result<Self> {
        conn.execute_batch("PRAGMA foreign_keys = ON;")?;
        schema::run_migrations(&conn)?;
        Ok(Store { conn: Mutex::new(conn) })
    }
}

/// Select-then-insert under a UNIQUE constraint. A concurrent writer that wins
/// the insert race is resolved by selecting again.
pub(crate) fn get_or_insert<S, I>(
    conn: &Connection,
    select_sql: &str,
    select_params: S,
    insert_sql: &str,
    insert_params: I,
) -> Result<i64>
where
    S: Params + Clone,
    I: Params,
{
    let select = |conn: &Connection| -> Result<Option<i64>> {
        Ok(conn
            .query_row(select_sql, select_params.clone(), |row| row.get::<_, i64>(0))
            .optional()?)
    };

    if let Some(id) = select(conn)? {
        return Ok(id);
    }

    match conn.execute(insert_sql, insert_params) {
        Ok(_) => Ok(conn.last_insert_rowid()),
        Err(e) if is_unique_violation(&e) => select(conn)?
            .ok_or_else(|| Error::Invariant(format!("row vanished after conflict: {}", select_sql))),
        Err(e) => Err(e.into()),
    }
}
