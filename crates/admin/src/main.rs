//! Hackreg admin - maintenance operations for the registration database
//!
//! Usage: hackreg-admin <status|backfill|fix-indexes|approve <email>|prune-sessions>
//!        [--config <path>]

use std::path::PathBuf;
use std::process::ExitCode;

use hackreg_core::{Database, Maintenance, Result};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

mod config;

use config::Config;

#[derive(Debug, PartialEq, Eq)]
enum Command {
    Status,
    Backfill,
    FixIndexes,
    Approve { email: String },
    PruneSessions,
}

fn main() -> ExitCode {
    // Initialize logging
    tracing_subscriber::registry()
        .with(tracing_subscriber::fmt::layer())
        .with(tracing_subscriber::EnvFilter::from_default_env())
        .init();

    let args: Vec<String> = std::env::args().skip(1).collect();
    let (command, config_path) = match parse_args(&args) {
        Some(parsed) => parsed,
        None => {
            eprintln!(
                "Usage: hackreg-admin <status|backfill|fix-indexes|approve <email>|prune-sessions> [--config <path>]"
            );
            return ExitCode::FAILURE;
        }
    };

    match run(&command, config_path.as_deref()) {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            tracing::error!("{e}");
            ExitCode::FAILURE
        }
    }
}

fn parse_args(args: &[String]) -> Option<(Command, Option<PathBuf>)> {
    let mut command = None;
    let mut config_path = None;

    let mut iter = args.iter();
    while let Some(arg) = iter.next() {
        match arg.as_str() {
            "--config" => config_path = Some(PathBuf::from(iter.next()?)),
            "status" if command.is_none() => command = Some(Command::Status),
            "backfill" if command.is_none() => command = Some(Command::Backfill),
            "fix-indexes" if command.is_none() => command = Some(Command::FixIndexes),
            "prune-sessions" if command.is_none() => command = Some(Command::PruneSessions),
            "approve" if command.is_none() => {
                command = Some(Command::Approve {
                    email: iter.next()?.clone(),
                });
            }
            _ => return None,
        }
    }

    command.map(|c| (c, config_path))
}

fn run(command: &Command, config_path: Option<&std::path::Path>) -> Result<()> {
    let config = Config::load(config_path)?;
    let db_path = config.database_path()?;
    tracing::info!(path = %db_path.display(), "Opening database");

    let db = Database::open(&db_path)?;
    let maintenance = Maintenance::new(&db);

    match command {
        Command::Status => {
            let missing = db.users().list_missing_number()?.len();
            let legacy = maintenance.legacy_index_present()?;
            tracing::info!(
                schema_version = db.schema_version(),
                accounts_missing_number = missing,
                legacy_index_present = legacy,
                "database status"
            );
        }
        Command::Backfill => {
            let report = maintenance.backfill_user_numbers()?;
            for failure in &report.failures {
                tracing::warn!(
                    user_id = %failure.user_id,
                    email = %failure.email,
                    reason = %failure.reason,
                    "account left without a number"
                );
            }
            tracing::info!(
                scanned = report.scanned,
                repaired = report.repaired,
                failed = report.failures.len(),
                "backfill finished"
            );
        }
        Command::FixIndexes => {
            let repair = maintenance.repair_indexes()?;
            if repair.dropped_legacy_index {
                tracing::info!("dropped superseded registration index");
            } else {
                tracing::info!("no superseded index present");
            }
        }
        Command::Approve { email } => {
            let user = maintenance.approve_account(email)?;
            tracing::info!(user_id = %user.id, %email, "account approved");
        }
        Command::PruneSessions => {
            let removed = maintenance.prune_sessions()?;
            tracing::info!(removed, "expired sessions pruned");
        }
    }

    Ok(())
}
