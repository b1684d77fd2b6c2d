use std::fs::OpenOptions;
use std::path::{Path, PathBuf};
use std::sync::Mutex;
use std::{error::Error, io};

use chrono::{Local, NaiveDate};
use clap::Parser;
use tracing::{error, info};
use tracing_subscriber::EnvFilter;

use date::DatePolicy;
use ledger::Ledger;
use loader::FileLoader;
use repl::{Command, Repl};

mod csv_balances;
mod csv_transactions;
mod date;
mod hashmap_ledger;
mod json_transactions;
mod ledger;
mod loader;
mod record;
mod repl;

/// Imports pairwise transfers from .csv and .json files and answers questions
/// about who owes whom.
#[derive(Parser, Debug)]
#[clap(name = "ledger-import", version)]
struct Cli {
    /// Files to import before accepting commands
    #[clap(value_parser)]
    files: Vec<PathBuf>,

    /// Write every balance as CSV to stdout and exit instead of reading commands
    #[clap(long, action)]
    batch: bool,

    /// Keep records whose dates are out of range, rolling them over the calendar
    #[clap(long, action)]
    lenient_dates: bool,

    /// Reference date (YYYY-MM-DD) used to reject future dates; defaults to today
    #[clap(long, value_parser = parse_day)]
    today: Option<NaiveDate>,

    /// Append log output to this file instead of stderr
    #[clap(long, value_parser)]
    log_file: Option<PathBuf>,
}

fn parse_day(value: &str) -> Result<NaiveDate, String> {
    NaiveDate::parse_from_str(value, "%Y-%m-%d").map_err(|err| format!("{}: expected YYYY-MM-DD", err))
}

fn main() -> Result<(), Box<dyn Error>> {
    let cli = Cli::parse();
    init_logging(cli.log_file.as_deref())?;

    let today = cli.today.unwrap_or_else(|| Local::now().date_naive());
    let policy = if cli.lenient_dates {
        DatePolicy::Lenient
    } else {
        DatePolicy::Strict
    };
    let loader = FileLoader::new(today, policy);
    let mut ledger = hashmap_ledger::HashMapLedger::new();

    if cli.batch {
        return run_batch(&mut ledger, &loader, &cli.files);
    }

    let stdout = io::stdout();
    let mut out = stdout.lock();
    let mut repl = Repl::new(&mut ledger, &loader);
    for path in cli.files {
        repl.execute(Command::Import(path), &mut out)?;
    }
    repl.run(io::stdin().lock(), &mut out)?;

    Ok(())
}

/// Imports every file, then writes the balances. A file that can't be
/// imported doesn't stop the others, but makes the run fail at the end.
fn run_batch<L: Ledger>(ledger: &mut L, loader: &FileLoader, files: &[PathBuf]) -> Result<(), Box<dyn Error>> {
    let mut failed = 0;
    for path in files {
        match loader.load(ledger, path) {
            Ok(summary) => info!(
                "imported '{}': {} accepted, {} rejected, {} diagnostic(s)",
                path.display(),
                summary.accepted,
                summary.rejected,
                summary.diagnostics.len()
            ),
            Err(err) => {
                error!("{}", err);
                failed += 1;
            }
        }
    }

    let balances_writer = csv_balances::Writer::from_writer(io::stdout());
    balances_writer.write_all(ledger.all_balances().into_iter())?;

    if failed > 0 {
        return Err(format!("{} of {} file(s) could not be imported", failed, files.len()).into());
    }
    Ok(())
}

fn init_logging(log_file: Option<&Path>) -> Result<(), Box<dyn Error>> {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("warn"));
    let builder = tracing_subscriber::fmt().with_env_filter(filter).with_target(false);

    match log_file {
        Some(path) => {
            let file = OpenOptions::new().create(true).append(true).open(path)?;
            builder.with_ansi(false).with_writer(Mutex::new(file)).init();
        }
        None => builder.with_writer(io::stderr).init(),
    }

    Ok(())
}
