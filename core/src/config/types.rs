use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct AppConfig {
    #[serde(default)]
    pub logging: LoggingConfig,

    #[serde(default)]
    pub http_server: HttpServerConfig,

    #[serde(default)]
    pub downloads: DownloadsConfig,

    #[serde(default)]
    pub tasks: TasksConfig,

    #[serde(default)]
    pub client: ClientConfig,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LoggingConfig {
    #[serde(default = "default_logging_enabled")]
    pub enabled: bool,

    /// If true, log to stderr.
    #[serde(default = "default_logging_console")]
    pub console: bool,

    /// If true, log to a file under `directory` (or OS temp dir if unset).
    #[serde(default = "default_logging_file")]
    pub file: bool,

    /// EnvFilter string, e.g. "info" or "tubefetch_core=debug".
    #[serde(default = "default_logging_level")]
    pub level: String,

    /// Optional directory for log files. If empty or unset, uses OS temp dir.
    #[serde(default)]
    pub directory: Option<String>,
}

fn default_logging_enabled() -> bool {
    true
}

fn default_logging_console() -> bool {
    true
}

fn default_logging_file() -> bool {
    false
}

fn default_logging_level() -> String {
    "info".to_string()
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            enabled: default_logging_enabled(),
            console: default_logging_console(),
            file: default_logging_file(),
            level: default_logging_level(),
            directory: None,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct HttpServerConfig {
    #[serde(default = "default_host")]
    pub host: String,

    #[serde(default = "default_port")]
    pub port: u16,

    /// Allowed CORS origins. Empty or `["*"]` allows any origin; the Lovelace
    /// card is served from the Home Assistant origin, not ours.
    #[serde(default)]
    pub cors_origins: Vec<String>,

    #[serde(default = "default_request_timeout_secs")]
    pub request_timeout_secs: u64,
}

fn default_host() -> String {
    "0.0.0.0".to_string()
}

fn default_port() -> u16 {
    5000
}

fn default_request_timeout_secs() -> u64 {
    30
}

impl Default for HttpServerConfig {
    fn default() -> Self {
        Self {
            host: default_host(),
            port: default_port(),
            cors_origins: Vec::new(),
            request_timeout_secs: default_request_timeout_secs(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DownloadsConfig {
    /// Where yt-dlp writes finished files.
    #[serde(default = "default_download_dir")]
    pub download_dir: String,

    /// Media-library relative folder reported by `GET /config`.
    #[serde(default = "default_media_subdir")]
    pub media_subdir: String,

    /// yt-dlp executable name or path.
    #[serde(default = "default_ytdlp_bin")]
    pub ytdlp_bin: String,

    /// Upper bound on concurrently running yt-dlp processes.
    #[serde(default = "default_max_concurrent")]
    pub max_concurrent: usize,

    #[serde(default = "default_socket_timeout_secs")]
    pub socket_timeout_secs: u64,

    #[serde(default = "default_cache_dir")]
    pub cache_dir: String,

    /// Time between the terminate request and a hard kill on cancellation.
    #[serde(default = "default_kill_grace_ms")]
    pub kill_grace_ms: u64,

    /// Bytes of stderr kept for error reporting.
    #[serde(default = "default_stderr_capture_bytes")]
    pub stderr_capture_bytes: usize,

    /// Extra arguments appended before the URL.
    #[serde(default)]
    pub extra_args: Vec<String>,
}

fn default_download_dir() -> String {
    "/config/media".to_string()
}

fn default_media_subdir() -> String {
    "youtube_downloads".to_string()
}

fn default_ytdlp_bin() -> String {
    "yt-dlp".to_string()
}

fn default_max_concurrent() -> usize {
    2
}

fn default_socket_timeout_secs() -> u64 {
    1_800
}

fn default_cache_dir() -> String {
    "/tmp/yt-dlp".to_string()
}

fn default_kill_grace_ms() -> u64 {
    3_000
}

fn default_stderr_capture_bytes() -> usize {
    8 * 1024
}

impl Default for DownloadsConfig {
    fn default() -> Self {
        Self {
            download_dir: default_download_dir(),
            media_subdir: default_media_subdir(),
            ytdlp_bin: default_ytdlp_bin(),
            max_concurrent: default_max_concurrent(),
            socket_timeout_secs: default_socket_timeout_secs(),
            cache_dir: default_cache_dir(),
            kill_grace_ms: default_kill_grace_ms(),
            stderr_capture_bytes: default_stderr_capture_bytes(),
            extra_args: Vec::new(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TasksConfig {
    /// Seconds a finished task stays visible before eviction. 0 keeps tasks forever.
    #[serde(default = "default_retention_secs")]
    pub retention_secs: u64,

    #[serde(default = "default_sweep_interval_secs")]
    pub sweep_interval_secs: u64,
}

fn default_retention_secs() -> u64 {
    3_600
}

fn default_sweep_interval_secs() -> u64 {
    60
}

impl Default for TasksConfig {
    fn default() -> Self {
        Self {
            retention_secs: default_retention_secs(),
            sweep_interval_secs: default_sweep_interval_secs(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ClientConfig {
    #[serde(default = "default_poll_interval_ms")]
    pub poll_interval_ms: u64,

    #[serde(default = "default_client_timeout_ms")]
    pub request_timeout_ms: u64,
}

fn default_poll_interval_ms() -> u64 {
    2_000
}

fn default_client_timeout_ms() -> u64 {
    10_000
}

impl Default for ClientConfig {
    fn default() -> Self {
        Self {
            poll_interval_ms: default_poll_interval_ms(),
            request_timeout_ms: default_client_timeout_ms(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn empty_toml_yields_defaults() {
        let cfg: AppConfig = toml::from_str("").unwrap();
        assert_eq!(cfg.http_server.port, 5000);
        assert_eq!(cfg.downloads.max_concurrent, 2);
        assert_eq!(cfg.downloads.media_subdir, "youtube_downloads");
        assert_eq!(cfg.tasks.retention_secs, 3_600);
        assert_eq!(cfg.client.poll_interval_ms, 2_000);
    }

    #[test]
    fn partial_section_keeps_other_defaults() {
        let cfg: AppConfig = toml::from_str(
            r#"
            [downloads]
            download_dir = "/media/yt"
            max_concurrent = 4
            "#,
        )
        .unwrap();
        assert_eq!(cfg.downloads.download_dir, "/media/yt");
        assert_eq!(cfg.downloads.max_concurrent, 4);
        assert_eq!(cfg.downloads.ytdlp_bin, "yt-dlp");
        assert_eq!(cfg.downloads.socket_timeout_secs, 1_800);
    }
}
