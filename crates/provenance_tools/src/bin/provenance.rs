#![forbid(unsafe_code)]

use std::env;

use provenance_storage::config::JOURNAL_PATH_ENV;
use provenance_storage::{LedgerConfig, LedgerStore};
use provenance_tools::ledger_cli::{execute_ledger_command, LEDGER_USAGE};
use tracing_subscriber::EnvFilter;

fn main() {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("warn")),
        )
        .with_writer(std::io::stderr)
        .init();

    if let Err(err) = run() {
        eprintln!("{err}");
        std::process::exit(2);
    }
}

fn run() -> Result<(), String> {
    let args: Vec<String> = env::args().skip(1).collect();
    if args.is_empty() || args[0] != "ledger" {
        return Err(LEDGER_USAGE.to_string());
    }
    let subcommand = args.get(1).ok_or_else(|| LEDGER_USAGE.to_string())?.as_str();
    let lineage_root_id = args.get(2).map(String::as_str);
    let ids = args.get(3..).unwrap_or_default();

    let config = LedgerConfig::from_env();
    if config.journal_path.is_none() {
        return Err(format!("{JOURNAL_PATH_ENV} is not set"));
    }
    let store = LedgerStore::open(config).map_err(|e| format!("{}: {e}", e.code()))?;
    let output = execute_ledger_command(&store, subcommand, lineage_root_id, ids)?;
    if !output.is_empty() {
        println!("{output}");
    }
    Ok(())
}
