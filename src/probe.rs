// Query instrumentation
// Counts round trips and result rows so the cost of each strategy can be
// compared without a profiler.

use serde::{Deserialize, Serialize};

/// One executed statement
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct StatementStats {
    /// Short label naming what the statement loads
    pub label: String,

    /// Rows the store returned for it
    pub rows: usize,
}

/// Everything a session executed, in order
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct QueryStats {
    pub statements: Vec<StatementStats>,
}

impl QueryStats {
    pub fn record(&mut self, label: &str, rows: usize) {
        self.statements.push(StatementStats {
            label: label.to_string(),
            rows,
        });
    }

    /// Number of statements sent to the store
    pub fn round_trips(&self) -> usize {
        self.statements.len()
    }

    /// Sum of result rows across every statement
    pub fn total_rows(&self) -> usize {
        self.statements.iter().map(|s| s.rows).sum()
    }

    /// Largest single result set
    pub fn max_rows(&self) -> usize {
        self.statements.iter().map(|s| s.rows).max().unwrap_or(0)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_empty_stats() {
        let stats = QueryStats::default();

        assert_eq!(stats.round_trips(), 0);
        assert_eq!(stats.total_rows(), 0);
        assert_eq!(stats.max_rows(), 0);
    }

    #[test]
    fn test_record_statements() {
        let mut stats = QueryStats::default();
        stats.record("summary+payins", 500);
        stats.record("summary+payouts", 300);

        assert_eq!(stats.round_trips(), 2);
        assert_eq!(stats.total_rows(), 800);
        assert_eq!(stats.max_rows(), 500);
        assert_eq!(stats.statements[1].label, "summary+payouts");
    }
}
