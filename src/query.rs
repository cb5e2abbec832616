// Explicit association loading
// Nothing here navigates lazily. A caller names the collections it wants and
// gets exactly one statement per call:
//
//   load_summary         - joins the summary with every listed collection and
//                          each movement's Transaction; two collections
//                          multiply their row counts
//   project_transactions - never reads movement columns; unions the
//                          Transaction references inside the store

use rusqlite::params;
use std::collections::btree_map::Entry;

use crate::db::Session;
use crate::models::{Collection, Movement, Summary, Transaction};

const SUMMARY_COLUMNS: usize = 3;

/// Statement label used in [`crate::probe::QueryStats`]
fn label(kind: &str, includes: &[Collection]) -> String {
    let names: Vec<&str> = includes.iter().map(|c| c.table()).collect();
    if names.is_empty() {
        kind.to_string()
    } else {
        format!("{}+{}", kind, names.join("+"))
    }
}

pub fn summary_sql(includes: &[Collection]) -> String {
    let mut select = vec!["s.id, s.name, s.description".to_string()];
    let mut joins = Vec::new();
    let mut order = vec!["s.id".to_string()];

    for (i, collection) in includes.iter().enumerate() {
        let m = format!("m{i}");
        let t = format!("t{i}");
        select.push(Movement::select_columns(&m));
        select.push(Transaction::select_columns(&t));
        joins.push(format!(
            "LEFT JOIN {table} {m} ON {m}.summary_id = s.id\n\
             LEFT JOIN transactions {t} ON {t}.id = {m}.transaction_id",
            table = collection.table(),
        ));
        order.push(format!("{m}.id"));
    }

    format!(
        "SELECT {}\nFROM summaries s\n{}\nWHERE s.id = ?1\nORDER BY {}",
        select.join(", "),
        joins.join("\n"),
        order.join(", ")
    )
}

/// Load a summary together with `includes` in a single statement.
/// Returns None when no summary has that id.
pub fn load_summary(
    session: &mut Session,
    summary_id: i64,
    includes: &[Collection],
) -> rusqlite::Result<Option<Summary>> {
    let sql = summary_sql(includes);
    let mut summary: Option<Summary> = None;

    session.for_each_row(&label("summary", includes), &sql, params![summary_id], |row| {
        let (id, name, description): (i64, String, String) =
            (row.get(0)?, row.get(1)?, row.get(2)?);
        let summary = summary.get_or_insert_with(|| Summary {
            id,
            name,
            description,
            ..Summary::default()
        });

        for (i, collection) in includes.iter().enumerate() {
            let offset = SUMMARY_COLUMNS + i * (Movement::COLUMNS + Transaction::COLUMNS);
            let id: Option<i64> = row.get(offset)?;
            let Some(id) = id else {
                continue;
            };

            // The same movement shows up once per row of every other joined
            // collection; materialize it only the first time.
            if let Entry::Vacant(slot) = summary.collection_mut(*collection).entry(id) {
                if let Some(movement) = Movement::from_row(row, offset, *collection, true)? {
                    slot.insert(movement);
                }
            }
        }

        Ok(())
    })?;

    Ok(summary)
}

pub fn projection_sql(includes: &[Collection]) -> String {
    let sources = if includes.is_empty() {
        "SELECT NULL AS transaction_id WHERE 0".to_string()
    } else {
        includes
            .iter()
            .map(|collection| {
                format!(
                    "SELECT transaction_id FROM {} WHERE summary_id = ?1 AND transaction_id IS NOT NULL",
                    collection.table()
                )
            })
            .collect::<Vec<_>>()
            .join("\nUNION\n")
    };

    // Anchored on summaries so a missing parent yields no rows at all, while a
    // parent without references yields one row of NULL Transaction columns.
    format!(
        "SELECT s.id, {}\nFROM summaries s\nLEFT JOIN (\n{}\n) refs ON 1\n\
         LEFT JOIN transactions t ON t.id = refs.transaction_id\nWHERE s.id = ?1\nORDER BY t.id",
        Transaction::select_columns("t"),
        sources
    )
}

/// Distinct Transactions referenced by `includes`, deduplicated by the store.
/// Returns None when no summary has that id.
pub fn project_transactions(
    session: &mut Session,
    summary_id: i64,
    includes: &[Collection],
) -> rusqlite::Result<Option<Vec<Transaction>>> {
    let sql = projection_sql(includes);
    let mut found = false;
    let mut transactions = Vec::new();

    session.for_each_row(&label("project", includes), &sql, params![summary_id], |row| {
        found = true;
        if let Some(tx) = Transaction::from_row(row, 1)? {
            transactions.push(tx);
        }
        Ok(())
    })?;

    Ok(found.then_some(transactions))
}
