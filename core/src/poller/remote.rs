use serde::{Deserialize, Serialize};

/// Task status as reported by the server.
///
/// Older servers report `processing`/`failed`; anything unrecognized maps to
/// `Unknown` and is treated as still in progress.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum RemoteStatus {
    Queued,
    #[serde(alias = "processing")]
    Running,
    Completed,
    #[serde(alias = "failed")]
    Error,
    Cancelled,
    #[default]
    #[serde(other)]
    Unknown,
}

impl RemoteStatus {
    pub fn is_terminal(self) -> bool {
        matches!(self, Self::Completed | Self::Error | Self::Cancelled)
    }
}

/// Subset of the task record the client cares about.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct RemoteTask {
    #[serde(default)]
    pub task_id: Option<String>,
    #[serde(default)]
    pub status: RemoteStatus,
    #[serde(default)]
    pub progress: Option<f64>,
    #[serde(default)]
    pub title: Option<String>,
    #[serde(default)]
    pub error: Option<String>,
    #[serde(default)]
    pub file_path: Option<String>,
}

impl RemoteTask {
    pub fn with_status(status: RemoteStatus) -> Self {
        Self {
            status,
            ..Self::default()
        }
    }

    /// Progress rounded into 0..=100.
    pub fn percent(&self) -> Option<u8> {
        self.progress
            .filter(|p| p.is_finite())
            .map(|p| p.round().clamp(0.0, 100.0) as u8)
    }
}
