// Fixture Loader
// Destructively rebuilds the benchmark dataset: N wide Transactions, one
// Summary, P payins and Q payouts pointing at the Transactions round-robin.

use anyhow::{Context, Result};
use chrono::{DateTime, NaiveDate, Utc};
use log::info;
use rusqlite::{params, Connection};
use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};

use crate::config::FixtureConfig;
use crate::models::Collection;

pub const TRANSACTION_AMOUNT: f64 = 2413.0;
pub const TRANSACTION_PAYLOAD: &str = "Much extra load to get from db";
pub const SUMMARY_NAME: &str = "MyName";
pub const SUMMARY_DESCRIPTION: &str = "MyDescription";
pub const MOVEMENT_AMOUNT: f64 = 52.0;

/// What a load inserted
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FixtureReport {
    pub summary_id: i64,
    pub transactions: usize,
    pub payins: usize,
    pub payouts: usize,
}

/// Round-robin Transaction reference for the movement at `index`.
/// None when there are no Transactions to point at.
pub fn assigned_transaction(index: usize, transactions: usize) -> Option<i64> {
    if transactions == 0 {
        return None;
    }
    Some((index % transactions) as i64 + 1)
}

fn fixture_date() -> Result<DateTime<Utc>> {
    NaiveDate::from_ymd_opt(2022, 1, 1)
        .and_then(|date| date.and_hms_opt(0, 0, 0))
        .map(|naive| naive.and_utc())
        .context("Invalid fixture date")
}

/// Balances for one movement: (balance_before, balance_after)
fn balances(collection: Collection) -> (f64, f64) {
    match collection {
        Collection::Payins => (104.0, 52.0),
        Collection::Payouts => (0.0, 52.0),
    }
}

/// Wipe and reseed. Running it twice leaves the same rows with the same ids.
pub fn load_fixture(conn: &mut Connection, cfg: &FixtureConfig) -> Result<FixtureReport> {
    let occurred_at = fixture_date()?.to_rfc3339();
    let tx = conn.transaction().context("Failed to begin fixture transaction")?;

    // Summaries first: the cascade empties payins/payouts, which releases the
    // RESTRICT references on transactions.
    tx.execute("DELETE FROM summaries", [])
        .context("Failed to clear summaries")?;
    tx.execute("DELETE FROM transactions", [])
        .context("Failed to clear transactions")?;
    tx.execute(
        "DELETE FROM sqlite_sequence
         WHERE name IN ('transactions', 'summaries', 'payins', 'payouts')",
        [],
    )
    .context("Failed to reset id sequences")?;

    {
        let mut insert_tx = tx.prepare(
            "INSERT INTO transactions (id, amount, load1, load2, load3, load4, load5, load6, load7, load8, load9)
             VALUES (?1, ?2, ?3, ?3, ?3, ?3, ?3, ?3, ?3, ?3, ?3)",
        )?;
        for id in 1..=cfg.transactions as i64 {
            insert_tx
                .execute(params![id, TRANSACTION_AMOUNT, TRANSACTION_PAYLOAD])
                .with_context(|| format!("Failed to insert transaction {id}"))?;
        }
    }

    tx.execute(
        "INSERT INTO summaries (id, name, description) VALUES (?1, ?2, ?3)",
        params![cfg.summary_id, SUMMARY_NAME, SUMMARY_DESCRIPTION],
    )
    .with_context(|| format!("Failed to insert summary {}", cfg.summary_id))?;

    let order = if cfg.payouts_first {
        [Collection::Payouts, Collection::Payins]
    } else {
        [Collection::Payins, Collection::Payouts]
    };

    for collection in order {
        let count = match collection {
            Collection::Payins => cfg.payins,
            Collection::Payouts => cfg.payouts,
        };
        let (balance_before, balance_after) = balances(collection);

        let mut insert = tx.prepare(&format!(
            "INSERT INTO {} (amount, balance_before, balance_after, occurred_at, transaction_id, summary_id)
             VALUES (?1, ?2, ?3, ?4, ?5, ?6)",
            collection.table()
        ))?;

        for index in 0..count {
            insert
                .execute(params![
                    MOVEMENT_AMOUNT,
                    balance_before,
                    balance_after,
                    occurred_at,
                    assigned_transaction(index, cfg.transactions),
                    cfg.summary_id,
                ])
                .with_context(|| format!("Failed to insert {} row {}", collection, index))?;
        }
    }

    tx.commit().context("Failed to commit fixture")?;

    info!(
        "Fixture loaded: summary {} with {} transactions, {} payins, {} payouts",
        cfg.summary_id, cfg.transactions, cfg.payins, cfg.payouts
    );

    Ok(FixtureReport {
        summary_id: cfg.summary_id,
        transactions: cfg.transactions,
        payins: cfg.payins,
        payouts: cfg.payouts,
    })
}

/// SHA-256 over the full, id-ordered content of every table.
/// Equal fingerprints mean equal observable datasets.
pub fn dataset_fingerprint(conn: &Connection) -> Result<String> {
    let mut hasher = Sha256::new();

    let queries = [
        "SELECT 'transactions', id, amount, load1 || load2 || load3 || load4 || load5 || load6 || load7 || load8 || load9
         FROM transactions ORDER BY id",
        "SELECT 'summaries', id, name || '|' || description FROM summaries ORDER BY id",
        "SELECT 'payins', id, amount, balance_before, balance_after, occurred_at, transaction_id, summary_id
         FROM payins ORDER BY id",
        "SELECT 'payouts', id, amount, balance_before, balance_after, occurred_at, transaction_id, summary_id
         FROM payouts ORDER BY id",
    ];

    for sql in queries {
        let mut stmt = conn.prepare(sql)?;
        let columns = stmt.column_count();
        let mut rows = stmt.query([])?;

        while let Some(row) = rows.next()? {
            for idx in 0..columns {
                let value: rusqlite::types::Value = row.get(idx)?;
                hasher.update(format!("{:?}\u{1f}", value));
            }
            hasher.update("\u{1e}");
        }
    }

    Ok(format!("{:x}", hasher.finalize()))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::db::{count_rows, referenced_transaction_ids, setup_database};
    use tempfile::TempDir;

    fn temp_conn() -> (TempDir, Connection) {
        let dir = tempfile::tempdir().unwrap();
        let conn = crate::db::open_connection(&dir.path().join("fixture.db"), 5000).unwrap();
        setup_database(&conn).unwrap();
        (dir, conn)
    }

    fn small(transactions: usize, payins: usize, payouts: usize) -> FixtureConfig {
        FixtureConfig {
            transactions,
            payins,
            payouts,
            ..FixtureConfig::default()
        }
    }

    #[test]
    fn test_round_robin_assignment() {
        let assigned: Vec<_> = (0..7).map(|i| assigned_transaction(i, 5)).collect();

        assert_eq!(
            assigned,
            vec![Some(1), Some(2), Some(3), Some(4), Some(5), Some(1), Some(2)]
        );
        assert_eq!(assigned_transaction(3, 0), None);
    }

    #[test]
    fn test_load_counts() {
        let (_dir, mut conn) = temp_conn();

        let report = load_fixture(&mut conn, &small(5, 12, 8)).unwrap();

        assert_eq!(report.payins, 12);
        assert_eq!(count_rows(&conn, "transactions").unwrap(), 5);
        assert_eq!(count_rows(&conn, "summaries").unwrap(), 1);
        assert_eq!(count_rows(&conn, "payins").unwrap(), 12);
        assert_eq!(count_rows(&conn, "payouts").unwrap(), 8);

        let ids = referenced_transaction_ids(&conn, 1).unwrap();
        assert_eq!(ids.into_iter().collect::<Vec<_>>(), vec![1, 2, 3, 4, 5]);
    }

    #[test]
    fn test_load_twice_is_idempotent() {
        let (_dir, mut conn) = temp_conn();

        load_fixture(&mut conn, &small(5, 20, 20)).unwrap();
        let first = dataset_fingerprint(&conn).unwrap();

        load_fixture(&mut conn, &small(5, 20, 20)).unwrap();
        let second = dataset_fingerprint(&conn).unwrap();

        assert_eq!(first, second);
        assert_eq!(first.len(), 64);
        assert_eq!(count_rows(&conn, "payins").unwrap(), 20);

        let max_id: i64 = conn
            .query_row("SELECT MAX(id) FROM payins", [], |row| row.get(0))
            .unwrap();
        assert_eq!(max_id, 20);
    }

    #[test]
    fn test_reload_with_different_shape_replaces_data() {
        let (_dir, mut conn) = temp_conn();

        load_fixture(&mut conn, &small(5, 20, 20)).unwrap();
        let before = dataset_fingerprint(&conn).unwrap();
        load_fixture(&mut conn, &small(3, 4, 0)).unwrap();

        assert_ne!(before, dataset_fingerprint(&conn).unwrap());
        assert_eq!(count_rows(&conn, "transactions").unwrap(), 3);
        assert_eq!(count_rows(&conn, "payouts").unwrap(), 0);
    }

    #[test]
    fn test_no_transactions_leaves_references_null() {
        let (_dir, mut conn) = temp_conn();

        load_fixture(&mut conn, &small(0, 3, 3)).unwrap();

        let nulls: i64 = conn
            .query_row(
                "SELECT COUNT(*) FROM payins WHERE transaction_id IS NULL",
                [],
                |row| row.get(0),
            )
            .unwrap();
        assert_eq!(nulls, 3);
        assert!(referenced_transaction_ids(&conn, 1).unwrap().is_empty());
    }

    #[test]
    fn test_payload_is_wide() {
        let (_dir, mut conn) = temp_conn();
        load_fixture(&mut conn, &small(1, 0, 0)).unwrap();

        let (amount, load9): (f64, String) = conn
            .query_row(
                "SELECT amount, load9 FROM transactions WHERE id = 1",
                [],
                |row| Ok((row.get(0)?, row.get(1)?)),
            )
            .unwrap();

        assert_eq!(amount, TRANSACTION_AMOUNT);
        assert_eq!(load9, TRANSACTION_PAYLOAD);
    }
}
