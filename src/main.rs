use anyhow::{Context, Result};
use clap::{ArgAction, Args, Parser, Subcommand};
use std::path::PathBuf;

use cartesian_explosion::config::DEFAULT_CONFIG_PATH;
use cartesian_explosion::{
    bench, compare, count_rows, drop_schema, load_fixture, setup_database, AppConfig, Store,
};

#[derive(Parser)]
#[command(name = "cartesian-explosion")]
#[command(about = "Seed a summary with two collections and compare query strategies")]
#[command(version)]
struct Cli {
    /// Configuration file (TOML, optional)
    #[arg(long, global = true, default_value = DEFAULT_CONFIG_PATH)]
    config: PathBuf,

    /// SQLite database file, overrides the configured path
    #[arg(long, global = true)]
    database: Option<PathBuf>,

    /// -v for info, -vv for debug (per-statement row counts)
    #[arg(short, long, global = true, action = ArgAction::Count)]
    verbose: u8,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand)]
enum Command {
    /// Create or drop the tables
    Schema {
        #[command(subcommand)]
        action: SchemaAction,
    },
    /// Rebuild the dataset from scratch
    Seed(FixtureArgs),
    /// Run each strategy once and compare cost
    Compare {
        /// Reseed before comparing
        #[arg(long)]
        seed: bool,
        #[command(flatten)]
        fixture: FixtureArgs,
        /// Print JSON instead of a table
        #[arg(long)]
        json: bool,
        /// Also write the report as CSV
        #[arg(long)]
        csv: Option<PathBuf>,
    },
    /// Time repeated runs of each strategy
    Bench {
        #[arg(long, default_value_t = 10)]
        iterations: usize,
    },
}

#[derive(Subcommand)]
enum SchemaAction {
    Create,
    Drop,
}

#[derive(Args)]
struct FixtureArgs {
    #[arg(long)]
    transactions: Option<usize>,
    #[arg(long)]
    payins: Option<usize>,
    #[arg(long)]
    payouts: Option<usize>,
    #[arg(long)]
    summary_id: Option<i64>,
}

impl FixtureArgs {
    fn apply(&self, config: &mut AppConfig) {
        if let Some(n) = self.transactions {
            config.fixture.transactions = n;
        }
        if let Some(n) = self.payins {
            config.fixture.payins = n;
        }
        if let Some(n) = self.payouts {
            config.fixture.payouts = n;
        }
        if let Some(id) = self.summary_id {
            config.fixture.summary_id = id;
        }
    }
}

fn main() -> Result<()> {
    let cli = Cli::parse();

    let filter = match cli.verbose {
        0 => "warn",
        1 => "info",
        _ => "debug",
    };
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or(filter)).init();

    let mut config = AppConfig::load_from(&cli.config)?;
    if let Some(path) = &cli.database {
        config.database.path = path.clone();
    }

    match &cli.command {
        Command::Schema { action } => run_schema(&config, action),
        Command::Seed(fixture) => {
            fixture.apply(&mut config);
            run_seed(&config)
        }
        Command::Compare {
            seed,
            fixture,
            json,
            csv,
        } => {
            fixture.apply(&mut config);
            if *seed {
                run_seed(&config)?;
            }
            run_compare(&config, *json, csv.as_ref())
        }
        Command::Bench { iterations } => run_bench(&config, *iterations),
    }
}

fn run_schema(config: &AppConfig, action: &SchemaAction) -> Result<()> {
    let conn = Store::from_config(config).connect()?;
    match action {
        SchemaAction::Create => {
            setup_database(&conn)?;
            println!("✓ Schema ready at {}", config.database.path.display());
        }
        SchemaAction::Drop => {
            drop_schema(&conn)?;
            println!("✓ Schema dropped from {}", config.database.path.display());
        }
    }
    Ok(())
}

fn run_seed(config: &AppConfig) -> Result<()> {
    let store = Store::from_config(config);
    let mut conn = store
        .connect()
        .with_context(|| format!("Failed to open {}", store.path().display()))?;

    setup_database(&conn)?;
    let report = load_fixture(&mut conn, &config.fixture)?;

    println!(
        "✓ Seeded summary {}: {} transactions, {} payins, {} payouts",
        report.summary_id, report.transactions, report.payins, report.payouts
    );
    println!(
        "  rows on disk: transactions={} payins={} payouts={}",
        count_rows(&conn, "transactions")?,
        count_rows(&conn, "payins")?,
        count_rows(&conn, "payouts")?
    );
    Ok(())
}

fn run_compare(config: &AppConfig, json: bool, csv: Option<&PathBuf>) -> Result<()> {
    let store = Store::from_config(config);
    let report = compare(&store)?;

    if json {
        println!("{}", report.to_json()?);
    } else {
        println!("Summary {} -> transactions {:?}\n", report.summary_id, report.transaction_ids);
        print!("{}", report.render());
    }

    if let Some(path) = csv {
        report.write_csv(path)?;
        println!("✓ Report written to {}", path.display());
    }
    Ok(())
}

fn run_bench(config: &AppConfig, iterations: usize) -> Result<()> {
    let store = Store::from_config(config);
    let rows = bench(&store, iterations)?;

    println!(
        "{:<16} {:>10} {:>10} {:>10} {:>10}",
        "strategy", "iterations", "mean_ms", "min_ms", "max_ms"
    );
    for row in rows {
        println!(
            "{:<16} {:>10} {:>10.3} {:>10.3} {:>10.3}",
            row.strategy.name(),
            row.iterations,
            row.mean_ms,
            row.min_ms,
            row.max_ms
        );
    }
    Ok(())
}
