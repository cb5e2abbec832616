// Strategy comparison reports
// Runs every strategy against the same store, checks they agree, and records
// round trips, rows and wall time. Exported as a table, JSON or CSV.

use anyhow::{bail, Context, Result};
use serde::{Deserialize, Serialize};
use std::collections::BTreeSet;
use std::path::Path;
use std::time::{Duration, Instant};

use crate::db::Store;
use crate::strategies::StrategyKind;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ComparisonRow {
    pub strategy: StrategyKind,
    pub round_trips: usize,
    pub result_rows: usize,
    pub max_statement_rows: usize,
    pub distinct_transactions: usize,
    pub elapsed_ms: f64,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ComparisonReport {
    pub summary_id: i64,
    pub transaction_ids: Vec<i64>,
    pub rows: Vec<ComparisonRow>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BenchRow {
    pub strategy: StrategyKind,
    pub iterations: usize,
    pub mean_ms: f64,
    pub min_ms: f64,
    pub max_ms: f64,
}

fn millis(elapsed: Duration) -> f64 {
    elapsed.as_secs_f64() * 1000.0
}

/// Run each strategy once. Fails if any strategy errors or if two
/// strategies disagree on the Transaction set.
pub fn compare(store: &Store) -> Result<ComparisonReport> {
    let mut rows = Vec::new();
    let mut expected: Option<(StrategyKind, BTreeSet<i64>)> = None;

    for kind in StrategyKind::ALL {
        let started = Instant::now();
        let outcome = kind.run(store)?;
        let elapsed = started.elapsed();

        let ids = outcome.transaction_ids();
        let (first, first_ids) = expected.get_or_insert_with(|| (kind, ids.clone()));
        if *first_ids != ids {
            bail!(
                "{} returned {:?} but {} returned {:?}",
                kind,
                ids,
                first,
                first_ids
            );
        }

        rows.push(ComparisonRow {
            strategy: kind,
            round_trips: outcome.stats.round_trips(),
            result_rows: outcome.stats.total_rows(),
            max_statement_rows: outcome.stats.max_rows(),
            distinct_transactions: ids.len(),
            elapsed_ms: millis(elapsed),
        });
    }

    Ok(ComparisonReport {
        summary_id: store.summary_id(),
        transaction_ids: expected
            .map(|(_, ids)| ids.into_iter().collect())
            .unwrap_or_default(),
        rows,
    })
}

/// Time `iterations` runs of every strategy
pub fn bench(store: &Store, iterations: usize) -> Result<Vec<BenchRow>> {
    if iterations == 0 {
        bail!("iterations must be at least 1");
    }

    let mut results = Vec::new();

    for kind in StrategyKind::ALL {
        let mut samples = Vec::with_capacity(iterations);
        for _ in 0..iterations {
            let started = Instant::now();
            kind.run(store)?;
            samples.push(millis(started.elapsed()));
        }

        let total: f64 = samples.iter().sum();
        results.push(BenchRow {
            strategy: kind,
            iterations,
            mean_ms: total / iterations as f64,
            min_ms: samples.iter().copied().fold(f64::INFINITY, f64::min),
            max_ms: samples.iter().copied().fold(0.0, f64::max),
        });
    }

    Ok(results)
}

impl ComparisonReport {
    pub fn write_csv(&self, path: &Path) -> Result<()> {
        let mut wtr = csv::Writer::from_path(path)
            .with_context(|| format!("Failed to create {}", path.display()))?;
        for row in &self.rows {
            wtr.serialize(row)?;
        }
        wtr.flush()?;
        Ok(())
    }

    pub fn to_json(&self) -> Result<String> {
        Ok(serde_json::to_string_pretty(self)?)
    }

    /// Fixed-width table for the terminal
    pub fn render(&self) -> String {
        let mut out = format!(
            "{:<16} {:>11} {:>12} {:>10} {:>12}\n",
            "strategy", "round_trips", "result_rows", "distinct", "elapsed_ms"
        );
        for row in &self.rows {
            out.push_str(&format!(
                "{:<16} {:>11} {:>12} {:>10} {:>12.3}\n",
                row.strategy.name(),
                row.round_trips,
                row.result_rows,
                row.distinct_transactions,
                row.elapsed_ms
            ));
        }
        out
    }
}
