use async_trait::async_trait;
use tokio::io::AsyncRead;

use super::types::{DownloadRequest, ExitOutcome, Signal};

/// One running external download.
#[async_trait]
pub trait DownloadSession: Send {
    fn stdout(&mut self) -> Option<Box<dyn AsyncRead + Unpin + Send>>;
    fn stderr(&mut self) -> Option<Box<dyn AsyncRead + Unpin + Send>>;
    fn pid(&self) -> Option<u32> {
        None
    }
    async fn signal(&mut self, signal: Signal) -> anyhow::Result<()>;
    async fn wait(&mut self) -> anyhow::Result<ExitOutcome>;
}

/// Starts download sessions. The yt-dlp implementation lives in `tubefetch-plugins`.
#[async_trait]
pub trait DownloaderPlugin: Send + Sync {
    fn name(&self) -> &str;
    async fn start_session(&self, request: &DownloadRequest)
        -> anyhow::Result<Box<dyn DownloadSession>>;
}
