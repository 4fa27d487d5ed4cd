// Module declarations
mod auth;
mod cli;
mod config;
mod error;
mod ledger;
mod mirror;
mod model;
mod precheck;
mod util;
mod web;

// Re-export module items at the crate root so cross-module references
// stay short, the way the modules share one namespace.
#[allow(unused_imports)]
pub(crate) use auth::*;
#[allow(unused_imports)]
pub(crate) use cli::*;
#[allow(unused_imports)]
pub(crate) use config::*;
#[allow(unused_imports)]
pub(crate) use error::*;
#[allow(unused_imports)]
pub(crate) use ledger::*;
#[allow(unused_imports)]
pub(crate) use mirror::*;
#[allow(unused_imports)]
pub(crate) use model::*;
#[allow(unused_imports)]
pub(crate) use precheck::*;
#[allow(unused_imports)]
pub(crate) use util::*;
#[allow(unused_imports)]
pub(crate) use web::*;

use clap::Parser;

fn main() -> std::result::Result<(), Box<dyn std::error::Error>> {
    let cli = Cli::parse();

    match cli.command {
        Command::Serve {
            bind,
            port,
            data_dir,
        } => {
            let config = AppConfig::from_env(data_dir);
            run_form_server(&bind, port, &config)?;
            Ok(())
        }

        Command::Add {
            date,
            stream,
            founder_name,
            venture_name,
            venture_manager_name,
            link,
            password,
            comments,
            data_dir,
        } => {
            let config = AppConfig::from_env(data_dir);
            let Some(date) = parse_date(&date) else {
                eprintln!("Invalid --date (expected YYYY-MM-DD): {date}");
                std::process::exit(2);
            };
            let mut raw = RawIntake {
                date: Some(date),
                stream,
                founder_name,
                venture_name,
                venture_manager_name,
                link,
                password,
                comments,
            };
            if raw.stream == STREAM_SENTINEL {
                raw.stream.clear();
            }
            let record = match IntakeRecord::from_raw(&raw) {
                Ok(record) => record,
                Err(err) => {
                    eprintln!("Submission rejected:");
                    for problem in &err.problems {
                        eprintln!("  - {problem}");
                    }
                    std::process::exit(2);
                }
            };
            let store = LedgerStore::new(&config);
            let receipt = store.append(&record)?;
            println!(
                "Saved entry for {} at {}",
                receipt.row.venture_name, receipt.row.timestamp
            );
            match receipt.mirror {
                MirrorStatus::Synced(outcome) => println!(
                    "Mirrored to Drive (file id {}, {})",
                    outcome.file_id,
                    if outcome.created { "created" } else { "updated" }
                ),
                MirrorStatus::Skipped { reason } => {
                    println!("Remote sync did not occur: {reason}")
                }
            }
            Ok(())
        }

        Command::List { json, data_dir } => {
            let config = AppConfig::from_env(data_dir);
            let store = LedgerStore::new(&config);
            let rows = store.load()?;
            if json {
                println!("{}", serde_json::to_string_pretty(&rows)?);
            } else {
                for (idx, row) in rows.iter().enumerate() {
                    println!(
                        "{}. {} [{}] {} / {} ({})",
                        idx + 1,
                        row.timestamp,
                        row.stream,
                        row.venture_name,
                        row.founder_name,
                        row.date
                    );
                }
                println!("{} row(s)", rows.len());
            }
            Ok(())
        }

        Command::Sync { data_dir } => {
            let config = AppConfig::from_env(data_dir);
            let ledger_path = config.ledger_path();
            if !ledger_path.exists() {
                eprintln!("No ledger at {}", ledger_path.display());
                std::process::exit(2);
            }
            let mirror = DriveMirror::new(&config);
            let outcome = mirror.sync(&ledger_path, &config.remote_name)?;
            println!(
                "Synced {} to Drive (file id {}, {})",
                ledger_path.display(),
                outcome.file_id,
                if outcome.created { "created" } else { "updated" }
            );
            Ok(())
        }

        Command::Auth { bind, port } => {
            let config = AppConfig::from_env(None);
            let provider = CredentialProvider::new(&config);
            provider.authorize(&bind, port)?;
            Ok(())
        }
    }
}
