// src/config.rs

use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use std::time::Duration;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("io error reading {}: {source}", .path.display())]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
    #[error("invalid config {}: {source}", .path.display())]
    Parse {
        path: PathBuf,
        #[source]
        source: toml::de::Error,
    },
}

/// Flags passed to aria2c (optional `[aria2]` section in the config file).
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct Aria2Tuning {
    /// Upload cap in aria2c notation, e.g. "10K".
    pub max_upload_limit: String,
    pub bt_max_peers: u32,
    /// Minutes to seed after completion; 0 makes aria2c exit when done.
    pub seed_time: u32,
    pub summary_interval: u32,
    pub console_log_level: String,
}

impl Default for Aria2Tuning {
    fn default() -> Self {
        Self {
            max_upload_limit: "10K".to_string(),
            bt_max_peers: 50,
            seed_time: 0,
            summary_interval: 1,
            console_log_level: "warn".to_string(),
        }
    }
}

/// Supervisor configuration, usually loaded from `ttd.toml`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct SupervisorConfig {
    /// Where transfer tools write payloads.
    pub download_dir: PathBuf,
    /// Monitoring tick, in milliseconds.
    pub tick_interval_ms: u64,
    /// Bound on collecting stderr after the tool exits.
    pub diagnostic_timeout_ms: u64,
    /// Bound on reaping a tool after it has been signalled.
    pub terminate_timeout_ms: u64,
    /// Maximum characters of stderr kept as a job's error message.
    pub error_excerpt_len: usize,
    /// Directories searched for transfer tools; `$PATH` when unset.
    pub tool_search_path: Option<Vec<PathBuf>>,
    pub aria2: Aria2Tuning,
}

impl Default for SupervisorConfig {
    fn default() -> Self {
        Self {
            download_dir: PathBuf::from("downloads"),
            tick_interval_ms: 1000,
            diagnostic_timeout_ms: 2000,
            terminate_timeout_ms: 2000,
            error_excerpt_len: 100,
            tool_search_path: None,
            aria2: Aria2Tuning::default(),
        }
    }
}

impl SupervisorConfig {
    /// Load from `path`; a missing file yields the defaults.
    pub fn load(path: &Path) -> Result<Self, ConfigError> {
        let data = match std::fs::read_to_string(path) {
            Ok(data) => data,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                tracing::info!("no config at {}, using defaults", path.display());
                return Ok(Self::default());
            }
            Err(source) => {
                return Err(ConfigError::Io {
                    path: path.to_path_buf(),
                    source,
                })
            }
        };
        toml::from_str(&data).map_err(|source| ConfigError::Parse {
            path: path.to_path_buf(),
            source,
        })
    }

    pub fn tick_interval(&self) -> Duration {
        Duration::from_millis(self.tick_interval_ms.max(1))
    }

    pub fn diagnostic_timeout(&self) -> Duration {
        Duration::from_millis(self.diagnostic_timeout_ms)
    }

    pub fn terminate_timeout(&self) -> Duration {
        Duration::from_millis(self.terminate_timeout_ms)
    }
}
