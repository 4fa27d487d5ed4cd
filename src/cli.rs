use std::path::PathBuf;

use clap::{Parser, Subcommand};

#[derive(Parser)]
#[command(name = "intakeledger")]
#[command(about = "Structured intake over an append-only CSV ledger, mirrored to Drive", long_about = None)]
#[command(version)]
pub(crate) struct Cli {
    #[command(subcommand)]
    pub(crate) command: Command,
}

#[derive(Subcommand)]
pub(crate) enum Command {
    /// Serve the intake form UI.
    Serve {
        #[arg(long, default_value = "127.0.0.1")]
        bind: String,
        #[arg(long, default_value_t = 8080)]
        port: u16,
        /// Directory holding the ledger (default: INTAKE_DATA_DIR or ./data)
        #[arg(long)]
        data_dir: Option<PathBuf>,
    },

    /// Append a single record from the command line (same pipeline as the form).
    Add {
        /// Meeting date (YYYY-MM-DD)
        #[arg(long)]
        date: String,
        #[arg(long)]
        stream: String,
        #[arg(long)]
        founder_name: String,
        #[arg(long)]
        venture_name: String,
        #[arg(long)]
        venture_manager_name: String,
        #[arg(long)]
        link: String,
        #[arg(long)]
        password: String,
        #[arg(long, default_value = "")]
        comments: String,
        #[arg(long)]
        data_dir: Option<PathBuf>,
    },

    /// Print the ledger rows.
    List {
        /// Output JSON instead of a summary line per row
        #[arg(long)]
        json: bool,
        #[arg(long)]
        data_dir: Option<PathBuf>,
    },

    /// Mirror the current ledger to Drive now.
    Sync {
        #[arg(long)]
        data_dir: Option<PathBuf>,
    },

    /// One-time Drive authorization (interactive, or GOOGLE_OAUTH_CODE for headless).
    Auth {
        #[arg(long, default_value = "127.0.0.1")]
        bind: String,
        #[arg(long, default_value_t = 8484)]
        port: u16,
    },
}
