use std::process::Stdio;
use std::time::Instant;

use anyhow::{Context, Result};
use async_trait::async_trait;
use tokio::io::AsyncRead;
use tokio::process::{Child, Command};

use tubefetch_core::api::{DownloadRequest, DownloadSession, DownloaderPlugin, ExitOutcome, Signal};

use crate::plan::{build_ytdlp_plan, YtDlpOptions};

/// Runs each download as a `yt-dlp` child process.
pub struct YtDlpRunnerPlugin {
    options: YtDlpOptions,
}

impl YtDlpRunnerPlugin {
    pub fn new(options: YtDlpOptions) -> Self {
        Self { options }
    }

    pub fn options(&self) -> &YtDlpOptions {
        &self.options
    }
}

#[async_trait]
impl DownloaderPlugin for YtDlpRunnerPlugin {
    fn name(&self) -> &str {
        "yt-dlp"
    }

    async fn start_session(&self, request: &DownloadRequest) -> Result<Box<dyn DownloadSession>> {
        let plan = build_ytdlp_plan(&self.options, request);

        tokio::fs::create_dir_all(&plan.output_dir)
            .await
            .with_context(|| format!("cannot create {}", plan.output_dir.display()))?;

        tracing::debug!(
            task_id = %request.task_id,
            program = %plan.program,
            args = ?plan.args,
            "spawning yt-dlp"
        );

        let child = Command::new(&plan.program)
            .args(&plan.args)
            .env("PYTHONUNBUFFERED", "1")
            .stdin(Stdio::null())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .kill_on_drop(true)
            .spawn()?;

        Ok(Box::new(YtDlpSession {
            child,
            started: Instant::now(),
        }))
    }
}

struct YtDlpSession {
    child: Child,
    started: Instant,
}

#[async_trait]
impl DownloadSession for YtDlpSession {
    fn stdout(&mut self) -> Option<Box<dyn AsyncRead + Unpin + Send>> {
        self.child
            .stdout
            .take()
            .map(|s| Box::new(s) as Box<dyn AsyncRead + Unpin + Send>)
    }

    fn stderr(&mut self) -> Option<Box<dyn AsyncRead + Unpin + Send>> {
        self.child
            .stderr
            .take()
            .map(|s| Box::new(s) as Box<dyn AsyncRead + Unpin + Send>)
    }

    fn pid(&self) -> Option<u32> {
        self.child.id()
    }

    async fn signal(&mut self, signal: Signal) -> Result<()> {
        // tokio only exposes a hard kill; Term and Kill both end the process.
        tracing::debug!(?signal, pid = self.child.id(), "stopping yt-dlp");
        match self.child.start_kill() {
            Ok(()) => Ok(()),
            // Already exited.
            Err(e) if e.kind() == std::io::ErrorKind::InvalidInput => Ok(()),
            Err(e) => Err(e.into()),
        }
    }

    async fn wait(&mut self) -> Result<ExitOutcome> {
        let status = self.child.wait().await?;
        Ok(ExitOutcome {
            exit_code: status.code().unwrap_or(-1),
            duration_ms: Some(self.started.elapsed().as_millis() as u64),
        })
    }
}
