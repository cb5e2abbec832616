// Query Strategies
// Three ways to answer the same question: which distinct Transactions does
// the summary's payins and payouts reference?
//
//   JointLoad     - one statement joining both collections (|payins| x |payouts| rows)
//   SplitLoad     - one full statement per collection, merged in memory
//   ProjectedLoad - references only, unioned and deduplicated by the store

use serde::{Deserialize, Serialize};
use std::collections::BTreeSet;
use std::fmt;

use crate::db::Store;
use crate::error::{QueryError, StorageContext};
use crate::models::{distinct_transactions, Collection, Transaction};
use crate::probe::QueryStats;
use crate::query::{load_summary, project_transactions};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum StrategyKind {
    JointLoad,
    SplitLoad,
    ProjectedLoad,
}

impl StrategyKind {
    pub const ALL: [StrategyKind; 3] = [
        StrategyKind::JointLoad,
        StrategyKind::SplitLoad,
        StrategyKind::ProjectedLoad,
    ];

    pub fn name(&self) -> &'static str {
        match self {
            StrategyKind::JointLoad => "joint_load",
            StrategyKind::SplitLoad => "split_load",
            StrategyKind::ProjectedLoad => "projected_load",
        }
    }

    pub fn description(&self) -> &'static str {
        match self {
            StrategyKind::JointLoad => "summary + payins + payouts in one join",
            StrategyKind::SplitLoad => "summary + payins, then summary + payouts",
            StrategyKind::ProjectedLoad => "transaction references only, unioned in the store",
        }
    }

    /// Run this strategy against `store`'s summary
    pub fn run(&self, store: &Store) -> Result<StrategyOutcome, QueryError> {
        match self {
            StrategyKind::JointLoad => joint_load(store),
            StrategyKind::SplitLoad => split_load(store),
            StrategyKind::ProjectedLoad => projected_load(store),
        }
    }
}

impl fmt::Display for StrategyKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

/// Result of one strategy invocation
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StrategyOutcome {
    pub strategy: StrategyKind,

    /// Distinct Transactions, ordered by id
    pub transactions: Vec<Transaction>,

    /// What it cost the store
    pub stats: QueryStats,
}

impl StrategyOutcome {
    pub fn transaction_ids(&self) -> BTreeSet<i64> {
        self.transactions.iter().map(|tx| tx.id).collect()
    }
}

fn not_found(strategy: StrategyKind, store: &Store) -> QueryError {
    QueryError::SummaryNotFound {
        strategy,
        summary_id: store.summary_id(),
    }
}

/// One statement, both collections. The anti-pattern.
pub fn joint_load(store: &Store) -> Result<StrategyOutcome, QueryError> {
    let strategy = StrategyKind::JointLoad;
    let mut session = store.session().for_strategy(strategy)?;

    let summary = load_summary(&mut session, store.summary_id(), &Collection::ALL)
        .for_strategy(strategy)?
        .ok_or_else(|| not_found(strategy, store))?;

    let transactions = distinct_transactions(
        summary
            .referenced_transactions(Collection::Payouts)
            .chain(summary.referenced_transactions(Collection::Payins)),
    );

    Ok(StrategyOutcome {
        strategy,
        transactions,
        stats: session.into_stats(),
    })
}

/// Two statements, one collection each, merged after both return
pub fn split_load(store: &Store) -> Result<StrategyOutcome, QueryError> {
    let strategy = StrategyKind::SplitLoad;
    let mut session = store.session().for_strategy(strategy)?;

    let with_payins = load_summary(&mut session, store.summary_id(), &[Collection::Payins])
        .for_strategy(strategy)?
        .ok_or_else(|| not_found(strategy, store))?;

    let with_payouts = load_summary(&mut session, store.summary_id(), &[Collection::Payouts])
        .for_strategy(strategy)?
        .ok_or_else(|| not_found(strategy, store))?;

    let transactions = distinct_transactions(
        with_payouts
            .referenced_transactions(Collection::Payouts)
            .chain(with_payins.referenced_transactions(Collection::Payins)),
    );

    Ok(StrategyOutcome {
        strategy,
        transactions,
        stats: session.into_stats(),
    })
}

/// Only the references leave the store, already deduplicated
pub fn projected_load(store: &Store) -> Result<StrategyOutcome, QueryError> {
    let strategy = StrategyKind::ProjectedLoad;
    let mut session = store.session().for_strategy(strategy)?;

    let transactions = project_transactions(&mut session, store.summary_id(), &Collection::ALL)
        .for_strategy(strategy)?
        .ok_or_else(|| not_found(strategy, store))?;

    Ok(StrategyOutcome {
        strategy,
        transactions,
        stats: session.into_stats(),
    })
}
