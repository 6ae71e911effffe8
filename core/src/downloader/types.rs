use crate::task::MediaFormat;

#[derive(Debug, Clone, Copy, PartialEq, Eq, serde::Serialize, serde::Deserialize)]
pub enum Signal {
    Kill,
    Term,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DownloadRequest {
    pub task_id: String,
    /// Already validated and stripped of playlist parameters.
    pub url: String,
    pub format: MediaFormat,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ExitOutcome {
    pub exit_code: i32,
    pub duration_ms: Option<u64>,
}

impl ExitOutcome {
    pub fn success(&self) -> bool {
        self.exit_code == 0
    }
}
