//! Typed configuration from environment variables.
//!
//! Loads once at startup. Queue names follow the host environment's
//! conventions: `wiq` (or the legacy `SF_AMQPQUEUE`) selects the work-item
//! queue, `queue` the consumer queue, and a non-empty `SF_VMID` marks an
//! ephemeral instance that exits after one drain.
//! The database URL is wrapped in secrecy::SecretString to prevent log leaks.

use crate::error::{Error, Result};
use secrecy::SecretString;
use std::path::PathBuf;
use std::time::Duration;

/// Work-item queue used when neither `wiq` nor `SF_AMQPQUEUE` is set.
pub const DEFAULT_WIQ: &str = "default_queue";

#[derive(Debug)]
pub struct Config {
    /// Work-item queue to pop from.
    pub wiq: String,
    /// Message queue the consumer registers on.
    pub queue: String,
    /// Ephemeral instance identifier. `Some` only when non-empty.
    pub vmid: Option<String>,
    /// Directory scanned for files produced while processing.
    pub work_dir: PathBuf,
    /// Upper bound on a single processing step. `None` waits forever.
    pub processing_timeout: Option<Duration>,
    pub database_url: Option<SecretString>,
    pub otel_endpoint: Option<String>,
    pub log_level: String,
    /// Seed one dummy workitem into the local backend.
    pub dummy_workitem: bool,
}

impl Config {
    /// Load configuration from environment variables.
    ///
    /// In local dev, call `dotenvy::dotenv().ok()` before this.
    pub fn from_env() -> Result<Self> {
        Self::from_lookup(|name| std::env::var(name).ok())
    }

    /// Load configuration through an arbitrary variable lookup.
    pub fn from_lookup<F>(lookup: F) -> Result<Self>
    where
        F: Fn(&str) -> Option<String>,
    {
        let var = |name: &str| lookup(name).filter(|v| !v.is_empty());

        let wiq = var("wiq")
            .or_else(|| var("SF_AMQPQUEUE"))
            .unwrap_or_else(|| DEFAULT_WIQ.to_string());
        let queue = var("queue").unwrap_or_else(|| wiq.clone());

        let work_dir = match var("WORK_DIR") {
            Some(dir) => PathBuf::from(dir),
            None => std::env::current_dir()?,
        };

        let processing_timeout = match var("WORKITEM_TIMEOUT_SECS") {
            Some(raw) => {
                let secs: u64 = raw.parse().map_err(|_| {
                    Error::Config(format!(
                        "WORKITEM_TIMEOUT_SECS must be whole seconds, got {raw:?}"
                    ))
                })?;
                (secs > 0).then(|| Duration::from_secs(secs))
            }
            None => None,
        };

        Ok(Self {
            wiq,
            queue,
            vmid: var("SF_VMID"),
            work_dir,
            processing_timeout,
            database_url: var("DATABASE_URL").map(SecretString::from),
            otel_endpoint: var("OTEL_ENDPOINT"),
            log_level: var("LOG_LEVEL").unwrap_or_else(|| "info".to_string()),
            dummy_workitem: var("DUMMY_WORKITEM").as_deref() == Some("1"),
        })
    }

    /// Running in an ephemeral (serverless) instance.
    pub fn is_ephemeral(&self) -> bool {
        self.vmid.is_some()
    }

    /// The database URL, or a config error naming the missing variable.
    pub fn require_database_url(&self) -> Result<&SecretString> {
        self.database_url.as_ref().ok_or_else(|| {
            Error::Config("required environment variable DATABASE_URL is not set".to_string())
        })
    }
}
