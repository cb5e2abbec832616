// Query error taxonomy
// Strategies fail fast: the storage error is kept verbatim and tagged with
// the strategy that hit it.

use crate::strategies::StrategyKind;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum QueryError {
    #[error("{strategy}: summary {summary_id} not found")]
    SummaryNotFound {
        strategy: StrategyKind,
        summary_id: i64,
    },

    #[error("{strategy}: storage error: {source}")]
    Storage {
        strategy: StrategyKind,
        #[source]
        source: rusqlite::Error,
    },
}

impl QueryError {
    /// Strategy that produced this error
    pub fn strategy(&self) -> StrategyKind {
        match self {
            QueryError::SummaryNotFound { strategy, .. }
            | QueryError::Storage { strategy, .. } => *strategy,
        }
    }
}

/// Attach a strategy name to a raw storage result
pub(crate) trait StorageContext<T> {
    fn for_strategy(self, strategy: StrategyKind) -> Result<T, QueryError>;
}

impl<T> StorageContext<T> for rusqlite::Result<T> {
    fn for_strategy(self, strategy: StrategyKind) -> Result<T, QueryError> {
        self.map_err(|source| QueryError::Storage { strategy, source })
    }
}
