use rusqlite::Connection;
use tracing::{debug, info};

use crate::error::StorageError;

pub const SCHEMA_VERSION: i32 = 1;

/// Name of the table holding the snapshot document.
pub const STATE_TABLE: &str = "state";

pub fn init_schema(conn: &Connection) -> Result<(), StorageError> {
    conn.execute_batch(
        "
        PRAGMA journal_mode = WAL;
        PRAGMA synchronous = NORMAL;
        PRAGMA busy_timeout = 5000;
    ",
    )?;

    let found: i32 = conn.query_row("PRAGMA user_version", [], |row| row.get(0))?;
    if found > SCHEMA_VERSION {
        return Err(StorageError::Blocked {
            found,
            supported: SCHEMA_VERSION,
        });
    }
    if found == SCHEMA_VERSION {
        debug!(version = found, "mirror schema is current");
        return Ok(());
    }

    for version in (found + 1)..=SCHEMA_VERSION {
        let tx = conn.unchecked_transaction()?;
        upgrade(&tx, version)?;
        tx.execute_batch(&format!("PRAGMA user_version = {version};"))?;
        tx.commit()?;
        info!(version, "upgraded mirror schema");
    }
    Ok(())
}

/// Applies the single structural change that brings the schema to `version`.
fn upgrade(conn: &Connection, version: i32) -> Result<(), StorageError> {
    match version {
        1 => conn.execute_batch(V1_SQL)?,
        other => {
            return Err(StorageError::Serialization(format!(
                "no upgrade step for schema version {other}"
            )));
        }
    }
    Ok(())
}

const V1_SQL: &str = "
CREATE TABLE IF NOT EXISTS state (
    key TEXT PRIMARY KEY,
    value TEXT NOT NULL
);
";

#[cfg(test)]
mod tests {
    use super::*;

    fn user_version(conn: &Connection) -> i32 {
        conn.query_row("PRAGMA user_version", [], |row| row.get(0)).unwrap()
    }

    #[test]
    fn fresh_database_is_upgraded() -> Result<(), Box<dyn std::error::Error>> {
        let conn = Connection::open_in_memory()?;
        init_schema(&conn)?;
        assert_eq!(user_version(&conn), SCHEMA_VERSION);
        let tables: i64 = conn.query_row(
            "SELECT count(*) FROM sqlite_master WHERE type = 'table' AND name = ?1",
            [STATE_TABLE],
            |row| row.get(0),
        )?;
        assert_eq!(tables, 1);
        Ok(())
    }

    #[test]
    fn current_database_is_untouched() -> Result<(), Box<dyn std::error::Error>> {
        let conn = Connection::open_in_memory()?;
        init_schema(&conn)?;
        conn.execute(
            "INSERT INTO state (key, value) VALUES ('current', '{}')",
            [],
        )?;
        init_schema(&conn)?;
        let rows: i64 = conn.query_row("SELECT count(*) FROM state", [], |row| row.get(0))?;
        assert_eq!(rows, 1);
        Ok(())
    }

    #[test]
    fn newer_database_is_blocked() -> Result<(), Box<dyn std::error::Error>> {
        let conn = Connection::open_in_memory()?;
        conn.execute_batch(&format!("PRAGMA user_version = {};", SCHEMA_VERSION + 1))?;
        match init_schema(&conn) {
            Err(StorageError::Blocked { found, supported }) => {
                assert_eq!(found, SCHEMA_VERSION + 1);
                assert_eq!(supported, SCHEMA_VERSION);
            }
            other => panic!("expected Blocked, got {other:?}"),
        }
        Ok(())
    }
}
