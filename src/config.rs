// The `config` module gathers the runtime settings of the triage agent
// into one struct built at startup and handed to whoever needs it.

use std::env;
use std::path::PathBuf;
use std::time::Duration;

use thiserror::Error;

/// The `ConfigError` enum defines startup configuration failures. All of
/// them abort startup; there is no partial-agent mode.
#[derive(Error, Debug)]
pub enum ConfigError {
    #[error("{0} is not set")]
    MissingVar(&'static str),
    #[error("Invalid value for {var}: {value}")]
    InvalidVar { var: &'static str, value: String },
}

/// Runtime settings for the triage agent.
#[derive(Debug, Clone)]
pub struct TriageConfig {
    /// Where downloaded attachments are written before filing.
    pub download_dir: PathBuf,
    /// Root of the destination folder tree.
    pub archive_root: PathBuf,
    /// How often the mailbox is polled.
    pub poll_interval: Duration,
    /// The Gmail search query selecting messages to triage.
    pub mailbox_query: String,
}

impl TriageConfig {
    /// Builds the configuration from the environment, loading a `.env`
    /// file first if one is present.
    ///
    /// `PAPERFLOW_ARCHIVE_ROOT` is required; the rest have defaults:
    /// `PAPERFLOW_DOWNLOAD_DIR` (./downloads), `PAPERFLOW_POLL_SECS` (120),
    /// `PAPERFLOW_MAILBOX_QUERY` (unread with attachments).
    pub fn from_env() -> Result<Self, ConfigError> {
        dotenv::dotenv().ok();

        let archive_root = env::var("PAPERFLOW_ARCHIVE_ROOT")
            .map_err(|_| ConfigError::MissingVar("PAPERFLOW_ARCHIVE_ROOT"))?;

        let download_dir =
            env::var("PAPERFLOW_DOWNLOAD_DIR").unwrap_or_else(|_| "./downloads".to_string());

        let poll_interval = match env::var("PAPERFLOW_POLL_SECS") {
            Ok(raw) => {
                let secs = raw.parse::<u64>().map_err(|_| ConfigError::InvalidVar {
                    var: "PAPERFLOW_POLL_SECS",
                    value: raw,
                })?;
                Duration::from_secs(secs)
            }
            Err(_) => Duration::from_secs(120),
        };

        let mailbox_query = env::var("PAPERFLOW_MAILBOX_QUERY")
            .unwrap_or_else(|_| "is:unread has:attachment".to_string());

        Ok(Self {
            download_dir: PathBuf::from(download_dir),
            archive_root: PathBuf::from(archive_root),
            poll_interval,
            mailbox_query,
        })
    }
}
