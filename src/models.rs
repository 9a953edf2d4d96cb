// src/models.rs

use serde::{Deserialize, Serialize};
use std::fmt;
use std::path::PathBuf;
use std::str::FromStr;
use thiserror::Error;

/// Short opaque identifier of a job, unique within a registry.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct JobId(String);

impl JobId {
    pub fn new(id: impl Into<String>) -> Self {
        Self(id.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for JobId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<&str> for JobId {
    fn from(value: &str) -> Self {
        Self(value.to_string())
    }
}

/// What a job downloads: a magnet URI or a `.torrent` file on disk.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case", tag = "kind", content = "value")]
pub enum Source {
    Magnet(String),
    TorrentFile(PathBuf),
}

impl Source {
    /// The argument handed to the transfer tool.
    pub fn as_argument(&self) -> String {
        match self {
            Source::Magnet(uri) => uri.clone(),
            Source::TorrentFile(path) => path.to_string_lossy().into_owned(),
        }
    }
}

/// The status of a download job.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum JobStatus {
    Pending,
    Downloading,
    Paused,
    Completed,
    Error,
    Cancelled,
}

impl JobStatus {
    /// Completed, error and cancelled jobs see no further automatic transitions.
    pub fn is_terminal(self) -> bool {
        matches!(self, JobStatus::Completed | JobStatus::Error | JobStatus::Cancelled)
    }
}

impl fmt::Display for JobStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            JobStatus::Pending => "pending",
            JobStatus::Downloading => "downloading",
            JobStatus::Paused => "paused",
            JobStatus::Completed => "completed",
            JobStatus::Error => "error",
            JobStatus::Cancelled => "cancelled",
        };
        f.write_str(s)
    }
}

/// Read-only view of one job, as returned to polling callers.
///
/// Every field comes from the same locked read of the job, so a snapshot never
/// mixes metrics from two different ticks.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct JobInfo {
    pub id: JobId,
    pub status: JobStatus,
    /// Percentage rounded to one decimal.
    pub progress: f64,
    pub seeders: u32,
    pub leechers: u32,
    pub download_speed: u64,
    pub upload_speed: u64,
    /// Seconds remaining.
    pub eta: u64,
    pub total_size: u64,
    pub downloaded_size: u64,
    pub is_paused: bool,
    pub error_message: String,
}

/// A caller-issued control request.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ControlAction {
    Pause,
    Resume,
    Stop,
    Delete,
}

impl ControlAction {
    pub fn as_str(self) -> &'static str {
        match self {
            ControlAction::Pause => "pause",
            ControlAction::Resume => "resume",
            ControlAction::Stop => "stop",
            ControlAction::Delete => "delete",
        }
    }

    fn past_tense(self) -> &'static str {
        match self {
            ControlAction::Pause => "paused",
            ControlAction::Resume => "resumed",
            ControlAction::Stop => "stopped",
            ControlAction::Delete => "deleted",
        }
    }
}

impl fmt::Display for ControlAction {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("unknown control action '{0}'")]
pub struct UnknownAction(pub String);

impl FromStr for ControlAction {
    type Err = UnknownAction;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "pause" => Ok(ControlAction::Pause),
            "resume" => Ok(ControlAction::Resume),
            "stop" => Ok(ControlAction::Stop),
            "delete" => Ok(ControlAction::Delete),
            other => Err(UnknownAction(other.to_string())),
        }
    }
}

/// Structured result of a control request: never an error to the caller's caller.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ControlOutcome {
    pub success: bool,
    pub message: String,
}

impl ControlOutcome {
    pub fn succeeded(action: ControlAction) -> Self {
        Self {
            success: true,
            message: format!("Download {} successfully", action.past_tense()),
        }
    }

    pub fn failed(message: impl Into<String>) -> Self {
        Self {
            success: false,
            message: message.into(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn control_action_parses_known_names() {
        assert_eq!("pause".parse::<ControlAction>(), Ok(ControlAction::Pause));
        assert_eq!("delete".parse::<ControlAction>(), Ok(ControlAction::Delete));
        assert!("restart".parse::<ControlAction>().is_err());
    }

    #[test]
    fn success_message_uses_past_tense() {
        assert_eq!(
            ControlOutcome::succeeded(ControlAction::Stop).message,
            "Download stopped successfully"
        );
    }

    #[test]
    fn status_serializes_lowercase() {
        let json = serde_json::to_string(&JobStatus::Downloading).unwrap();
        assert_eq!(json, "\"downloading\"");
        assert!(JobStatus::Cancelled.is_terminal());
        assert!(!JobStatus::Paused.is_terminal());
    }
}
