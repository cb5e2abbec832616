// Entity Models
// Summary owns two sibling collections (payins, payouts); every movement may
// point at one shared Transaction lookup row.

use chrono::{DateTime, Utc};
use rusqlite::types::Type;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fmt;

// ============================================================================
// TRANSACTION (lookup row)
// ============================================================================

/// Wide lookup row referenced (never owned) by payins and payouts.
/// The nine `load` columns exist only to make each fetched row expensive.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Transaction {
    pub id: i64,
    pub amount: f64,
    pub load1: String,
    pub load2: String,
    pub load3: String,
    pub load4: String,
    pub load5: String,
    pub load6: String,
    pub load7: String,
    pub load8: String,
    pub load9: String,
}

impl Transaction {
    /// Number of columns a Transaction occupies in a result row
    pub const COLUMNS: usize = 11;

    /// Column list in the order `from_row` expects, qualified by `alias`
    pub fn select_columns(alias: &str) -> String {
        [
            "id", "amount", "load1", "load2", "load3", "load4", "load5", "load6", "load7",
            "load8", "load9",
        ]
        .iter()
        .map(|col| format!("{}.{}", alias, col))
        .collect::<Vec<_>>()
        .join(", ")
    }

    /// Read a Transaction starting at column `offset`.
    /// Returns None when the id column is NULL (outer join miss).
    pub fn from_row(row: &rusqlite::Row<'_>, offset: usize) -> rusqlite::Result<Option<Self>> {
        let id: Option<i64> = row.get(offset)?;
        let Some(id) = id else {
            return Ok(None);
        };

        Ok(Some(Transaction {
            id,
            amount: row.get(offset + 1)?,
            load1: row.get(offset + 2)?,
            load2: row.get(offset + 3)?,
            load3: row.get(offset + 4)?,
            load4: row.get(offset + 5)?,
            load5: row.get(offset + 6)?,
            load6: row.get(offset + 7)?,
            load7: row.get(offset + 8)?,
            load8: row.get(offset + 9)?,
            load9: row.get(offset + 10)?,
        }))
    }
}

// ============================================================================
// COLLECTION
// ============================================================================

/// The two sibling one-to-many collections hanging off a Summary
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub enum Collection {
    Payins,
    Payouts,
}

impl Collection {
    pub const ALL: [Collection; 2] = [Collection::Payins, Collection::Payouts];

    /// Backing table name
    pub fn table(&self) -> &'static str {
        match self {
            Collection::Payins => "payins",
            Collection::Payouts => "payouts",
        }
    }
}

impl fmt::Display for Collection {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.table())
    }
}

// ============================================================================
// MOVEMENT (payin / payout row)
// ============================================================================

/// One payin or payout. Both tables share this shape; `collection` says which.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Movement {
    pub id: i64,
    pub collection: Collection,
    pub amount: f64,
    pub balance_before: f64,
    pub balance_after: f64,
    pub occurred_at: DateTime<Utc>,
    pub transaction_id: Option<i64>,

    /// Populated only when the query included the Transaction association
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub transaction: Option<Transaction>,
}

impl Movement {
    /// Number of columns a Movement occupies in a result row
    pub const COLUMNS: usize = 6;

    pub fn select_columns(alias: &str) -> String {
        [
            "id",
            "amount",
            "balance_before",
            "balance_after",
            "occurred_at",
            "transaction_id",
        ]
        .iter()
        .map(|col| format!("{}.{}", alias, col))
        .collect::<Vec<_>>()
        .join(", ")
    }

    /// Read a Movement of `collection` starting at column `offset`. When
    /// `with_transaction` is set, the Transaction columns follow directly.
    /// Returns None when the id column is NULL (empty side of a LEFT JOIN).
    pub fn from_row(
        row: &rusqlite::Row<'_>,
        offset: usize,
        collection: Collection,
        with_transaction: bool,
    ) -> rusqlite::Result<Option<Self>> {
        let id: Option<i64> = row.get(offset)?;
        let Some(id) = id else {
            return Ok(None);
        };

        let occurred_at_str: String = row.get(offset + 4)?;
        let occurred_at = DateTime::parse_from_rfc3339(&occurred_at_str)
            .map_err(|e| {
                rusqlite::Error::FromSqlConversionFailure(offset + 4, Type::Text, Box::new(e))
            })?
            .with_timezone(&Utc);

        let transaction = if with_transaction {
            Transaction::from_row(row, offset + Movement::COLUMNS)?
        } else {
            None
        };

        Ok(Some(Movement {
            id,
            collection,
            amount: row.get(offset + 1)?,
            balance_before: row.get(offset + 2)?,
            balance_after: row.get(offset + 3)?,
            occurred_at,
            transaction_id: row.get(offset + 5)?,
            transaction,
        }))
    }
}

// ============================================================================
// SUMMARY (parent)
// ============================================================================

/// Parent entity. Collections are keyed by movement id so the same movement
/// repeated across joined rows collapses to one entry.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Summary {
    pub id: i64,
    pub name: String,
    pub description: String,
    pub payins: BTreeMap<i64, Movement>,
    pub payouts: BTreeMap<i64, Movement>,
}

impl Summary {
    pub fn collection(&self, collection: Collection) -> &BTreeMap<i64, Movement> {
        match collection {
            Collection::Payins => &self.payins,
            Collection::Payouts => &self.payouts,
        }
    }

    pub fn collection_mut(&mut self, collection: Collection) -> &mut BTreeMap<i64, Movement> {
        match collection {
            Collection::Payins => &mut self.payins,
            Collection::Payouts => &mut self.payouts,
        }
    }

    /// Loaded Transactions of every movement in `collection` (may repeat)
    pub fn referenced_transactions(
        &self,
        collection: Collection,
    ) -> impl Iterator<Item = &Transaction> {
        self.collection(collection)
            .values()
            .filter_map(|movement| movement.transaction.as_ref())
    }
}

/// Deduplicate transactions by id, ordered by id
pub fn distinct_transactions<'a, I>(transactions: I) -> Vec<Transaction>
where
    I: IntoIterator<Item = &'a Transaction>,
{
    let mut by_id: BTreeMap<i64, Transaction> = BTreeMap::new();
    for tx in transactions {
        by_id.entry(tx.id).or_insert_with(|| tx.clone());
    }
    by_id.into_values().collect()
}
