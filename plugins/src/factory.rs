use std::sync::Arc;

use tubefetch_core::api::{AppConfig, Dispatcher, DispatcherSettings, DownloaderPlugin, TaskStore};

use crate::plan::{resolve_executable_path, YtDlpOptions};
use crate::runner::YtDlpRunnerPlugin;

/// Build the yt-dlp downloader. A bare binary name is resolved on `PATH` when
/// possible; otherwise it is kept as configured so spawn errors surface per task.
pub fn build_downloader(cfg: &AppConfig) -> Arc<dyn DownloaderPlugin> {
    let mut options = YtDlpOptions::from_config(&cfg.downloads);
    match resolve_executable_path(&options.bin) {
        Ok(path) => {
            tracing::info!(bin = %path, "using yt-dlp");
            options.bin = path;
        }
        Err(e) => {
            tracing::warn!(bin = %options.bin, error = %e, "yt-dlp not found; downloads will fail until it is installed");
        }
    }
    Arc::new(YtDlpRunnerPlugin::new(options))
}

pub fn build_dispatcher(cfg: &AppConfig, store: TaskStore) -> Dispatcher {
    Dispatcher::new(
        store,
        build_downloader(cfg),
        DispatcherSettings::from_config(&cfg.downloads),
    )
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn unresolvable_binary_is_kept_as_configured() {
        let mut cfg = AppConfig::default();
        cfg.downloads.ytdlp_bin = "tubefetch-test-no-such-binary".into();
        let d = build_downloader(&cfg);
        assert_eq!(d.name(), "yt-dlp");
    }

    #[tokio::test]
    async fn dispatcher_uses_download_limits() {
        let mut cfg = AppConfig::default();
        cfg.downloads.max_concurrent = 4;
        let d = build_dispatcher(&cfg, TaskStore::new());
        assert_eq!(d.settings().max_concurrent, 4);
        assert_eq!(d.downloader_name(), "yt-dlp");
    }
}
