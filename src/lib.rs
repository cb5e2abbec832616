// Cartesian Explosion - Core Library
// Schema, fixture loader and three query strategies over the same data,
// instrumented so the cost of joining two collections at once is visible.

pub mod config;
pub mod db;
pub mod error;
pub mod fixture;
pub mod models;
pub mod probe;
pub mod query;
pub mod report;
pub mod strategies;

// Re-export commonly used types
pub use config::{AppConfig, DatabaseConfig, FixtureConfig};
pub use db::{
    count_rows, delete_summary, drop_schema, open_connection, referenced_transaction_ids,
    setup_database, Session, Store,
};
pub use error::QueryError;
pub use fixture::{dataset_fingerprint, load_fixture, FixtureReport};
pub use models::{Collection, Movement, Summary, Transaction};
pub use probe::{QueryStats, StatementStats};
pub use report::{bench, compare, BenchRow, ComparisonReport, ComparisonRow};
pub use strategies::{
    joint_load, projected_load, split_load, StrategyKind, StrategyOutcome,
};

/// Library version
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
