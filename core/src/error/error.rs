use thiserror::Error;

#[derive(Error, Debug)]
pub enum ConfigError {
    #[error("cannot determine home directory")]
    NoHomeDir,
    #[error("failed to read config {path}: {source}")]
    Read {
        path: String,
        source: std::io::Error,
    },
    #[error("failed to parse config {path}: {source}")]
    Parse {
        path: String,
        source: toml::de::Error,
    },
}

/// Failures of one download session. Each maps onto the task's `error` field.
#[derive(Error, Debug)]
pub enum DownloadError {
    #[error("failed to start yt-dlp: {0}")]
    Spawn(String),
    #[error("stream io error: {stream} {source}")]
    StreamIo {
        stream: &'static str,
        source: std::io::Error,
    },
    #[error("cancelled")]
    Cancelled,
    #[error("download session failed: {0}")]
    Session(#[from] anyhow::Error),
}
