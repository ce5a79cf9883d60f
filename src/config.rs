//! Configuration types for evidence-dl

use crate::error::{Error, Result};
use serde::{Deserialize, Serialize};
use std::{net::SocketAddr, path::PathBuf, time::Duration};
use url::Url;

/// Export retrieval behavior (polling cadence, attempt budget, destination)
///
/// Groups the client-side knobs for one export operation. Used as a nested
/// sub-config within [`Config`].
///
/// The attempt budget and interval are configuration rather than constants:
/// the defaults (20 attempts at 30 s, a 10-minute worst case) match the
/// upstream product behavior but carry no contract weight of their own.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct ExportConfig {
    /// Maximum number of status poll attempts before timing out (default: 20)
    #[serde(default = "default_max_poll_attempts")]
    pub max_poll_attempts: u32,

    /// Fixed delay between status poll attempts (default: 30 seconds)
    #[serde(default = "default_poll_interval")]
    pub poll_interval: Duration,

    /// Per-request timeout applied to every upstream call (default: 10 seconds)
    #[serde(default = "default_request_timeout")]
    pub request_timeout: Duration,

    /// Directory delivered artifacts are written into (default: "./exports")
    #[serde(default = "default_download_dir")]
    pub download_dir: PathBuf,
}

impl Default for ExportConfig {
    fn default() -> Self {
        Self {
            max_poll_attempts: default_max_poll_attempts(),
            poll_interval: default_poll_interval(),
            request_timeout: default_request_timeout(),
            download_dir: default_download_dir(),
        }
    }
}

/// Registry server settings (bind address, job retention)
///
/// Used as a nested sub-config within [`Config`].
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct ServerConfig {
    /// Address the registry API binds to (default: 127.0.0.1:8196)
    #[serde(default = "default_bind_address")]
    pub bind_address: SocketAddr,

    /// How long finished jobs are retained before disposal (default: 15 minutes)
    ///
    /// Closed jobs are reclaimed immediately; this window only covers jobs
    /// whose client abandoned them without a close call.
    #[serde(default = "default_job_retention")]
    pub job_retention: Duration,

    /// Interval of the background retention sweep (default: 60 seconds)
    #[serde(default = "default_sweep_interval")]
    pub sweep_interval: Duration,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            bind_address: default_bind_address(),
            job_retention: default_job_retention(),
            sweep_interval: default_sweep_interval(),
        }
    }
}

/// Main configuration for evidence-dl
///
/// Fields are organized into logical sub-configs:
/// - [`export`](ExportConfig): client-side polling and delivery behavior
/// - [`server`](ServerConfig): registry server bind address and retention
///
/// Sub-config fields are flattened for backward-compatible serialization.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct Config {
    /// Base URL of the export API the client talks to
    #[serde(default = "default_api_url")]
    pub api_url: Url,

    /// Client-side export behavior
    #[serde(flatten)]
    pub export: ExportConfig,

    /// Registry server settings
    #[serde(flatten)]
    pub server: ServerConfig,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            api_url: default_api_url(),
            export: ExportConfig::default(),
            server: ServerConfig::default(),
        }
    }
}

impl Config {
    /// Validate the configuration, returning the first offending setting
    pub fn validate(&self) -> Result<()> {
        if self.export.max_poll_attempts == 0 {
            return Err(Error::Config {
                message: "max_poll_attempts must be at least 1".into(),
                key: Some("max_poll_attempts".into()),
            });
        }
        if self.export.poll_interval.is_zero() {
            return Err(Error::Config {
                message: "poll_interval must be non-zero".into(),
                key: Some("poll_interval".into()),
            });
        }
        if self.export.request_timeout.is_zero() {
            return Err(Error::Config {
                message: "request_timeout must be non-zero".into(),
                key: Some("request_timeout".into()),
            });
        }
        if self.server.job_retention.is_zero() {
            return Err(Error::Config {
                message: "job_retention must be non-zero".into(),
                key: Some("job_retention".into()),
            });
        }
        Ok(())
    }
}

fn default_max_poll_attempts() -> u32 {
    20
}

fn default_poll_interval() -> Duration {
    Duration::from_secs(30)
}

fn default_request_timeout() -> Duration {
    Duration::from_secs(10)
}

fn default_download_dir() -> PathBuf {
    PathBuf::from("./exports")
}

fn default_bind_address() -> SocketAddr {
    // Panic-free: the literal always parses
    SocketAddr::from(([127, 0, 0, 1], 8196))
}

fn default_job_retention() -> Duration {
    Duration::from_secs(15 * 60)
}

fn default_sweep_interval() -> Duration {
    Duration::from_secs(60)
}

fn default_api_url() -> Url {
    // Matches the default bind address
    #[allow(clippy::unwrap_used)]
    Url::parse("http://127.0.0.1:8196/").unwrap()
}
