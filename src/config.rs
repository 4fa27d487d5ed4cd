use std::path::PathBuf;

use crate::util::env_optional;

pub(crate) const DEFAULT_DATA_DIR: &str = "data";
pub(crate) const LEDGER_FILENAME: &str = "entries.csv";
pub(crate) const DEFAULT_REMOTE_FOLDER: &str = "Intake Ledger";

/// Everything the pipeline needs, resolved once in main and passed into
/// each component. Components never read the environment themselves, so
/// tests can point at isolated temporary locations.
#[derive(Debug, Clone)]
pub(crate) struct AppConfig {
    /// Directory holding the local ledger file.
    pub(crate) data_dir: PathBuf,
    /// Google client-secrets JSON ("installed app" layout).
    pub(crate) credentials_path: PathBuf,
    /// Persisted OAuth token cache.
    pub(crate) token_path: PathBuf,
    /// Pre-obtained authorization code for headless runs.
    pub(crate) auth_code: Option<String>,
    /// Drive folder the ledger is mirrored into, resolved by name.
    pub(crate) remote_folder: String,
    /// Name of the mirrored file inside that folder.
    pub(crate) remote_name: String,
}

impl AppConfig {
    pub(crate) fn from_env(data_dir: Option<PathBuf>) -> Self {
        let data_dir = data_dir
            .or_else(|| env_optional("INTAKE_DATA_DIR").map(PathBuf::from))
            .unwrap_or_else(|| PathBuf::from(DEFAULT_DATA_DIR));
        AppConfig {
            data_dir,
            credentials_path: env_optional("GOOGLE_DRIVE_CREDENTIALS")
                .map(PathBuf::from)
                .unwrap_or_else(|| PathBuf::from("credentials.json")),
            token_path: env_optional("GOOGLE_DRIVE_TOKEN")
                .map(PathBuf::from)
                .unwrap_or_else(|| PathBuf::from("token.json")),
            auth_code: env_optional("GOOGLE_OAUTH_CODE"),
            remote_folder: env_optional("INTAKE_REMOTE_FOLDER")
                .unwrap_or_else(|| DEFAULT_REMOTE_FOLDER.to_string()),
            remote_name: LEDGER_FILENAME.to_string(),
        }
    }

    pub(crate) fn ledger_path(&self) -> PathBuf {
        self.data_dir.join(LEDGER_FILENAME)
    }
}
