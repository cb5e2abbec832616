use anyhow::{bail, Context, Result};
use log::debug;
use rusqlite::{params, Connection, Params, Row};
use std::collections::BTreeSet;
use std::path::{Path, PathBuf};
use std::time::Duration;

use crate::config::{AppConfig, DatabaseConfig};
use crate::probe::QueryStats;

/// Every table the schema owns, parents first
pub const TABLES: [&str; 4] = ["transactions", "summaries", "payins", "payouts"];

/// Open a connection with foreign key enforcement on.
/// SQLite ignores REFERENCES clauses unless this pragma is set per connection.
pub fn open_connection(path: &Path, busy_timeout_ms: u64) -> rusqlite::Result<Connection> {
    let conn = Connection::open(path)?;
    conn.pragma_update(None, "foreign_keys", "ON")?;
    conn.busy_timeout(Duration::from_millis(busy_timeout_ms))?;
    Ok(conn)
}

pub fn setup_database(conn: &Connection) -> Result<()> {
    conn.pragma_update(None, "journal_mode", "WAL")?;

    // ==========================================================================
    // Transactions (wide lookup rows)
    // ==========================================================================
    conn.execute(
        "CREATE TABLE IF NOT EXISTS transactions (
            id INTEGER PRIMARY KEY AUTOINCREMENT,
            amount REAL NOT NULL,
            load1 TEXT NOT NULL,
            load2 TEXT NOT NULL,
            load3 TEXT NOT NULL,
            load4 TEXT NOT NULL,
            load5 TEXT NOT NULL,
            load6 TEXT NOT NULL,
            load7 TEXT NOT NULL,
            load8 TEXT NOT NULL,
            load9 TEXT NOT NULL
        )",
        [],
    )?;

    // ==========================================================================
    // Summaries (parent of both collections)
    // ==========================================================================
    conn.execute(
        "CREATE TABLE IF NOT EXISTS summaries (
            id INTEGER PRIMARY KEY AUTOINCREMENT,
            name TEXT NOT NULL,
            description TEXT NOT NULL
        )",
        [],
    )?;

    // ==========================================================================
    // Payins / Payouts (sibling collections, same shape)
    // Summary delete cascades; a referenced Transaction cannot be deleted.
    // ==========================================================================
    for table in ["payins", "payouts"] {
        conn.execute(
            &format!(
                "CREATE TABLE IF NOT EXISTS {table} (
                    id INTEGER PRIMARY KEY AUTOINCREMENT,
                    amount REAL NOT NULL,
                    balance_before REAL NOT NULL,
                    balance_after REAL NOT NULL,
                    occurred_at TEXT NOT NULL,
                    transaction_id INTEGER
                        REFERENCES transactions(id) ON DELETE RESTRICT,
                    summary_id INTEGER NOT NULL
                        REFERENCES summaries(id) ON DELETE CASCADE
                )"
            ),
            [],
        )?;

        conn.execute(
            &format!("CREATE INDEX IF NOT EXISTS idx_{table}_summary_id ON {table}(summary_id)"),
            [],
        )?;

        conn.execute(
            &format!(
                "CREATE INDEX IF NOT EXISTS idx_{table}_transaction_id ON {table}(transaction_id)"
            ),
            [],
        )?;
    }

    Ok(())
}

/// Drop every table, dependents first
pub fn drop_schema(conn: &Connection) -> Result<()> {
    for table in ["payins", "payouts", "summaries", "transactions"] {
        conn.execute(&format!("DROP TABLE IF EXISTS {table}"), [])
            .with_context(|| format!("Failed to drop table {table}"))?;
    }
    Ok(())
}

/// Delete a summary. Its payins and payouts go with it; Transactions stay.
pub fn delete_summary(conn: &Connection, summary_id: i64) -> Result<bool> {
    let deleted = conn
        .execute("DELETE FROM summaries WHERE id = ?1", params![summary_id])
        .with_context(|| format!("Failed to delete summary {summary_id}"))?;
    Ok(deleted > 0)
}

pub fn count_rows(conn: &Connection, table: &str) -> Result<i64> {
    if !TABLES.contains(&table) {
        bail!("Unknown table: {}", table);
    }

    let count: i64 = conn.query_row(&format!("SELECT COUNT(*) FROM {table}"), [], |row| {
        row.get(0)
    })?;

    Ok(count)
}

/// Distinct Transaction ids referenced by either collection of a summary.
/// Plain ground truth for checking strategy results.
pub fn referenced_transaction_ids(conn: &Connection, summary_id: i64) -> Result<BTreeSet<i64>> {
    let mut stmt = conn.prepare(
        "SELECT transaction_id FROM payins
         WHERE summary_id = ?1 AND transaction_id IS NOT NULL
         UNION
         SELECT transaction_id FROM payouts
         WHERE summary_id = ?1 AND transaction_id IS NOT NULL",
    )?;

    let ids = stmt
        .query_map(params![summary_id], |row| row.get(0))?
        .collect::<Result<BTreeSet<i64>, _>>()?;

    Ok(ids)
}

// ============================================================================
// STORE & SESSION
// ============================================================================

/// Where the data lives and which summary the strategies read.
/// Holds no connection; each call to `session` opens its own.
#[derive(Debug, Clone)]
pub struct Store {
    path: PathBuf,
    busy_timeout_ms: u64,
    summary_id: i64,
}

impl Store {
    pub fn new(database: &DatabaseConfig, summary_id: i64) -> Self {
        Store {
            path: database.path.clone(),
            busy_timeout_ms: database.busy_timeout_ms,
            summary_id,
        }
    }

    pub fn from_config(config: &AppConfig) -> Self {
        Store::new(&config.database, config.fixture.summary_id)
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    pub fn summary_id(&self) -> i64 {
        self.summary_id
    }

    /// Plain connection, for schema and fixture work
    pub fn connect(&self) -> rusqlite::Result<Connection> {
        open_connection(&self.path, self.busy_timeout_ms)
    }

    /// Instrumented connection scoped to one strategy invocation
    pub fn session(&self) -> rusqlite::Result<Session> {
        Ok(Session {
            conn: self.connect()?,
            stats: QueryStats::default(),
        })
    }
}

/// A connection plus the statements run on it. Dropping it closes the connection.
pub struct Session {
    conn: Connection,
    stats: QueryStats,
}

impl Session {
    /// Run `sql` and hand every result row to `visit`, recording the row count
    /// under `label`. Rows are streamed, never buffered.
    pub fn for_each_row<P, F>(
        &mut self,
        label: &str,
        sql: &str,
        params: P,
        mut visit: F,
    ) -> rusqlite::Result<usize>
    where
        P: Params,
        F: FnMut(&Row<'_>) -> rusqlite::Result<()>,
    {
        let mut stmt = self.conn.prepare(sql)?;
        let mut rows = stmt.query(params)?;

        let mut count = 0;
        while let Some(row) = rows.next()? {
            visit(row)?;
            count += 1;
        }

        debug!("{}: {} rows", label, count);
        self.stats.record(label, count);

        Ok(count)
    }

    pub fn stats(&self) -> &QueryStats {
        &self.stats
    }

    pub fn into_stats(self) -> QueryStats {
        self.stats
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    fn temp_store() -> (TempDir, Store) {
        let dir = tempfile::tempdir().unwrap();
        let database = DatabaseConfig {
            path: dir.path().join("test.db"),
            ..DatabaseConfig::default()
        };
        (dir, Store::new(&database, 1))
    }

    fn insert_minimal(conn: &Connection) {
        conn.execute(
            "INSERT INTO transactions (id, amount, load1, load2, load3, load4, load5, load6, load7, load8, load9)
             VALUES (1, 10.0, 'a', 'a', 'a', 'a', 'a', 'a', 'a', 'a', 'a')",
            [],
        )
        .unwrap();
        conn.execute(
            "INSERT INTO summaries (id, name, description) VALUES (1, 'n', 'd')",
            [],
        )
        .unwrap();
        for table in ["payins", "payouts"] {
            conn.execute(
                &format!(
                    "INSERT INTO {table} (amount, balance_before, balance_after, occurred_at, transaction_id, summary_id)
                     VALUES (1.0, 2.0, 1.0, '2022-01-01T00:00:00+00:00', 1, 1)"
                ),
                [],
            )
            .unwrap();
        }
    }

    #[test]
    fn test_setup_is_idempotent() {
        let (_dir, store) = temp_store();
        let conn = store.connect().unwrap();

        setup_database(&conn).unwrap();
        setup_database(&conn).unwrap();

        for table in TABLES {
            assert_eq!(count_rows(&conn, table).unwrap(), 0);
        }
    }

    #[test]
    fn test_delete_summary_cascades_but_keeps_transactions() {
        let (_dir, store) = temp_store();
        let conn = store.connect().unwrap();
        setup_database(&conn).unwrap();
        insert_minimal(&conn);

        assert!(delete_summary(&conn, 1).unwrap());

        assert_eq!(count_rows(&conn, "summaries").unwrap(), 0);
        assert_eq!(count_rows(&conn, "payins").unwrap(), 0);
        assert_eq!(count_rows(&conn, "payouts").unwrap(), 0);
        assert_eq!(count_rows(&conn, "transactions").unwrap(), 1);

        assert!(!delete_summary(&conn, 1).unwrap());
    }

    #[test]
    fn test_referenced_transaction_cannot_be_deleted() {
        let (_dir, store) = temp_store();
        let conn = store.connect().unwrap();
        setup_database(&conn).unwrap();
        insert_minimal(&conn);

        let result = conn.execute("DELETE FROM transactions WHERE id = 1", []);

        match result {
            Err(rusqlite::Error::SqliteFailure(err, _)) => {
                assert_eq!(err.code, rusqlite::ErrorCode::ConstraintViolation);
            }
            other => panic!("expected constraint violation, got {:?}", other),
        }
        assert_eq!(count_rows(&conn, "transactions").unwrap(), 1);
    }

    #[test]
    fn test_movement_requires_summary() {
        let (_dir, store) = temp_store();
        let conn = store.connect().unwrap();
        setup_database(&conn).unwrap();

        let result = conn.execute(
            "INSERT INTO payins (amount, balance_before, balance_after, occurred_at, summary_id)
             VALUES (1.0, 2.0, 1.0, '2022-01-01T00:00:00+00:00', 42)",
            [],
        );

        assert!(result.is_err());
    }

    #[test]
    fn test_count_rows_rejects_unknown_table() {
        let (_dir, store) = temp_store();
        let conn = store.connect().unwrap();
        setup_database(&conn).unwrap();

        assert!(count_rows(&conn, "sqlite_master; DROP TABLE payins").is_err());
    }

    #[test]
    fn test_referenced_ids_union() {
        let (_dir, store) = temp_store();
        let conn = store.connect().unwrap();
        setup_database(&conn).unwrap();
        insert_minimal(&conn);

        let ids = referenced_transaction_ids(&conn, 1).unwrap();

        assert_eq!(ids.into_iter().collect::<Vec<_>>(), vec![1]);
    }

    #[test]
    fn test_session_records_rows() {
        let (_dir, store) = temp_store();
        {
            let conn = store.connect().unwrap();
            setup_database(&conn).unwrap();
            insert_minimal(&conn);
        }

        let mut session = store.session().unwrap();
        let mut seen = Vec::new();
        let rows = session
            .for_each_row(
                "payins",
                "SELECT id FROM payins WHERE summary_id = ?1",
                params![1],
                |row| {
                    seen.push(row.get::<_, i64>(0)?);
                    Ok(())
                },
            )
            .unwrap();

        assert_eq!(rows, 1);
        assert_eq!(seen, vec![1]);
        assert_eq!(session.stats().round_trips(), 1);
        assert_eq!(session.into_stats().total_rows(), 1);
    }

    #[test]
    fn test_drop_schema() {
        let (_dir, store) = temp_store();
        let conn = store.connect().unwrap();
        setup_database(&conn).unwrap();
        insert_minimal(&conn);

        drop_schema(&conn).unwrap();

        assert!(count_rows(&conn, "payins").is_err());
        setup_database(&conn).unwrap();
        assert_eq!(count_rows(&conn, "payins").unwrap(), 0);
    }
}
