// Runtime configuration
// Settings come from an optional TOML file (`config/cartesian.toml` unless
// another path is given) and are then overridden by `CARTESIAN__*`
// environment variables, e.g. `CARTESIAN__FIXTURE__PAYINS=50`.

use config::{Config, ConfigError, Environment, File};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

pub const DEFAULT_CONFIG_PATH: &str = "config/cartesian.toml";
pub const ENV_PREFIX: &str = "CARTESIAN";

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct AppConfig {
    #[serde(default)]
    pub database: DatabaseConfig,
    #[serde(default)]
    pub fixture: FixtureConfig,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DatabaseConfig {
    #[serde(default = "default_db_path")]
    pub path: PathBuf,
    #[serde(default = "default_busy_timeout_ms")]
    pub busy_timeout_ms: u64,
}

impl Default for DatabaseConfig {
    fn default() -> Self {
        DatabaseConfig {
            path: default_db_path(),
            busy_timeout_ms: default_busy_timeout_ms(),
        }
    }
}

/// Shape of the seeded dataset
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FixtureConfig {
    /// Number of Transaction lookup rows
    #[serde(default = "default_transactions")]
    pub transactions: usize,

    /// Number of payins attached to the summary
    #[serde(default = "default_movements")]
    pub payins: usize,

    /// Number of payouts attached to the summary
    #[serde(default = "default_movements")]
    pub payouts: usize,

    /// Identity of the single seeded summary (the one every strategy reads)
    #[serde(default = "default_summary_id")]
    pub summary_id: i64,

    /// Insert payouts before payins
    #[serde(default)]
    pub payouts_first: bool,
}

impl Default for FixtureConfig {
    fn default() -> Self {
        FixtureConfig {
            transactions: default_transactions(),
            payins: default_movements(),
            payouts: default_movements(),
            summary_id: default_summary_id(),
            payouts_first: false,
        }
    }
}

fn default_db_path() -> PathBuf {
    PathBuf::from("cartesian.db")
}

fn default_busy_timeout_ms() -> u64 {
    5000
}

fn default_transactions() -> usize {
    5
}

fn default_movements() -> usize {
    500
}

fn default_summary_id() -> i64 {
    1
}

impl AppConfig {
    /// Load from `path` (optional file), then apply environment overrides
    pub fn load_from(path: impl AsRef<Path>) -> Result<Self, ConfigError> {
        let path = path.as_ref();

        let settings = Config::builder()
            .add_source(File::from(path).required(false))
            .add_source(
                Environment::with_prefix(ENV_PREFIX)
                    .separator("__")
                    .try_parsing(true),
            )
            .build()
            .map_err(|err| {
                ConfigError::Message(format!(
                    "Failed to load configuration from {}: {}",
                    path.display(),
                    err
                ))
            })?;

        settings.try_deserialize::<AppConfig>()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::env;
    use std::fs;
    use std::sync::Mutex;

    // Loading reads process-wide env vars; keep load tests from interleaving
    static ENV_LOCK: Mutex<()> = Mutex::new(());

    #[test]
    fn test_defaults_match_benchmark_shape() {
        let cfg = AppConfig::default();

        assert_eq!(cfg.fixture.transactions, 5);
        assert_eq!(cfg.fixture.payins, 500);
        assert_eq!(cfg.fixture.payouts, 500);
        assert_eq!(cfg.fixture.summary_id, 1);
        assert!(!cfg.fixture.payouts_first);
        assert_eq!(cfg.database.path, PathBuf::from("cartesian.db"));
    }

    #[test]
    fn test_missing_file_uses_defaults() {
        let _guard = ENV_LOCK.lock().unwrap_or_else(|e| e.into_inner());
        let dir = tempfile::tempdir().unwrap();
        let cfg = AppConfig::load_from(dir.path().join("absent.toml")).unwrap();

        assert_eq!(cfg.fixture.transactions, 5);
        assert_eq!(cfg.database.busy_timeout_ms, 5000);
    }

    #[test]
    fn test_partial_file_keeps_other_defaults() {
        let _guard = ENV_LOCK.lock().unwrap_or_else(|e| e.into_inner());
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("cartesian.toml");
        fs::write(
            &path,
            "[database]\npath = \"bench.db\"\n\n[fixture]\npayins = 20\n",
        )
        .unwrap();

        let cfg = AppConfig::load_from(&path).unwrap();

        assert_eq!(cfg.database.path, PathBuf::from("bench.db"));
        assert_eq!(cfg.fixture.payins, 20);
        assert_eq!(cfg.fixture.payouts, 500);
        assert_eq!(cfg.fixture.transactions, 5);
    }

    #[test]
    fn test_env_overrides_file_and_defaults() {
        let _guard = ENV_LOCK.lock().unwrap_or_else(|e| e.into_inner());
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("cartesian.toml");
        fs::write(&path, "[fixture]\npayins = 20\n").unwrap();

        env::set_var("CARTESIAN__FIXTURE__PAYINS", "50");
        env::set_var("CARTESIAN__DATABASE__BUSY_TIMEOUT_MS", "123");
        let result = AppConfig::load_from(&path);
        env::remove_var("CARTESIAN__FIXTURE__PAYINS");
        env::remove_var("CARTESIAN__DATABASE__BUSY_TIMEOUT_MS");

        let cfg = result.unwrap();
        assert_eq!(cfg.fixture.payins, 50);
        assert_eq!(cfg.database.busy_timeout_ms, 123);
        assert_eq!(cfg.fixture.payouts, 500);
    }
}
