use std::sync::Arc;
use std::time::Duration;

use tokio::sync::Semaphore;
use tokio_util::sync::CancellationToken;

use super::session::{run_download_session, DownloadSessionInput, SessionOutcome};
use crate::config::DownloadsConfig;
use crate::downloader::{summarize_failure, DownloadRequest, DownloaderPlugin};
use crate::error::{DispatchError, DownloadError};
use crate::input::normalize_url;
use crate::store::TaskStore;
use crate::task::{MediaFormat, Task, TaskStatus};

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DispatcherSettings {
    pub max_concurrent: usize,
    pub kill_grace: Duration,
    pub stderr_capture_bytes: usize,
}

impl DispatcherSettings {
    pub fn from_config(cfg: &DownloadsConfig) -> Self {
        Self {
            max_concurrent: cfg.max_concurrent.max(1),
            kill_grace: Duration::from_millis(cfg.kill_grace_ms),
            stderr_capture_bytes: cfg.stderr_capture_bytes,
        }
    }
}

impl Default for DispatcherSettings {
    fn default() -> Self {
        Self::from_config(&DownloadsConfig::default())
    }
}

/// Accepts download requests and runs each one as a background task.
#[derive(Clone)]
pub struct Dispatcher {
    inner: Arc<DispatcherInner>,
}

struct DispatcherInner {
    store: TaskStore,
    downloader: Arc<dyn DownloaderPlugin>,
    limiter: Arc<Semaphore>,
    settings: DispatcherSettings,
}

impl Dispatcher {
    pub fn new(
        store: TaskStore,
        downloader: Arc<dyn DownloaderPlugin>,
        settings: DispatcherSettings,
    ) -> Self {
        let permits = settings.max_concurrent.max(1);
        Self {
            inner: Arc::new(DispatcherInner {
                store,
                downloader,
                limiter: Arc::new(Semaphore::new(permits)),
                settings,
            }),
        }
    }

    pub fn store(&self) -> &TaskStore {
        &self.inner.store
    }

    pub fn downloader_name(&self) -> &str {
        self.inner.downloader.name()
    }

    pub fn settings(&self) -> &DispatcherSettings {
        &self.inner.settings
    }

    /// Validate `url`, register a `queued` task and start its download in the
    /// background. Returns as soon as the task exists.
    ///
    /// A rejected request leaves the store untouched and starts nothing.
    pub async fn submit(&self, url: &str, format: MediaFormat) -> Result<Task, DispatchError> {
        let url = normalize_url(url)?;
        let task = Task::new(url, format);
        let cancel = self.inner.store.insert(task.clone()).await?;

        tracing::info!(
            target: "tubefetch.task",
            task_id = %task.task_id,
            url = %task.url,
            format = %task.format,
            "download accepted"
        );

        let request = DownloadRequest {
            task_id: task.task_id.clone(),
            url: task.url.clone(),
            format,
        };
        let worker = self.clone();
        tokio::spawn(async move {
            worker.run_task(request, cancel).await;
        });

        Ok(task)
    }

    /// Cancel every active task and refuse to start new processes.
    pub async fn shutdown(&self) -> usize {
        let cancelled = self.inner.store.cancel_all_active().await;
        self.inner.limiter.close();
        if cancelled > 0 {
            tracing::info!(cancelled, "cancelled active downloads on shutdown");
        }
        cancelled
    }

    async fn run_task(self, request: DownloadRequest, cancel: CancellationToken) {
        let task_id = request.task_id.clone();

        let _permit = tokio::select! {
            _ = cancel.cancelled() => {
                tracing::debug!(task_id = %task_id, "cancelled while queued");
                return;
            }
            permit = self.inner.limiter.clone().acquire_owned() => match permit {
                Ok(p) => p,
                Err(_) => {
                    self.finalize(&task_id, Err(DownloadError::Cancelled)).await;
                    return;
                }
            },
        };

        if let Err(e) = self
            .inner
            .store
            .transition(&task_id, TaskStatus::Running, |t| t.progress = Some(0))
            .await
        {
            tracing::debug!(task_id = %task_id, error = %e, "task left queue before starting");
            return;
        }

        let result = match self.inner.downloader.start_session(&request).await {
            Ok(session) => {
                tracing::debug!(
                    task_id = %task_id,
                    downloader = self.inner.downloader.name(),
                    pid = session.pid(),
                    "download process started"
                );
                run_download_session(DownloadSessionInput {
                    session,
                    store: self.inner.store.clone(),
                    task_id: task_id.clone(),
                    cancel,
                    kill_grace: self.inner.settings.kill_grace,
                    stderr_capture_bytes: self.inner.settings.stderr_capture_bytes,
                })
                .await
            }
            Err(e) => Err(DownloadError::Spawn(format!("{e:#}"))),
        };

        self.finalize(&task_id, result).await;
    }

    /// Record the single terminal state of a task. Attempts on a task that
    /// already finished are ignored.
    async fn finalize(&self, task_id: &str, result: Result<SessionOutcome, DownloadError>) {
        let (status, error) = match result {
            Ok(SessionOutcome::Exited { exit, .. }) if exit.success() => {
                (TaskStatus::Completed, None)
            }
            Ok(SessionOutcome::Exited { exit, stderr_tail }) => (
                TaskStatus::Error,
                Some(summarize_failure(&stderr_tail, exit.exit_code)),
            ),
            Ok(SessionOutcome::Cancelled) | Err(DownloadError::Cancelled) => {
                (TaskStatus::Cancelled, Some("Cancelled by user".to_string()))
            }
            Err(e) => (TaskStatus::Error, Some(e.to_string())),
        };

        let message = error.clone();
        match self
            .inner
            .store
            .transition(task_id, status, move |t| {
                if let Some(msg) = error {
                    t.error = Some(msg);
                }
            })
            .await
        {
            Ok(task) => match task.status {
                TaskStatus::Error => tracing::warn!(
                    target: "tubefetch.task",
                    task_id = %task_id,
                    error = message.as_deref().unwrap_or_default(),
                    "download failed"
                ),
                _ => tracing::info!(
                    target: "tubefetch.task",
                    task_id = %task_id,
                    status = %task.status,
                    title = task.title.as_deref().unwrap_or_default(),
                    "download finished"
                ),
            },
            Err(e) => match e.terminal_status() {
                Some(current) => tracing::debug!(
                    task_id = %task_id,
                    current = %current,
                    attempted = %status,
                    "finalize ignored; task already finished"
                ),
                None => tracing::warn!(task_id = %task_id, error = %e, "finalize failed"),
            },
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn settings_follow_downloads_config() {
        let cfg = DownloadsConfig {
            max_concurrent: 0,
            kill_grace_ms: 250,
            stderr_capture_bytes: 1024,
            ..DownloadsConfig::default()
        };
        let s = DispatcherSettings::from_config(&cfg);
        assert_eq!(s.max_concurrent, 1);
        assert_eq!(s.kill_grace, Duration::from_millis(250));
        assert_eq!(s.stderr_capture_bytes, 1024);
    }

    #[test]
    fn default_settings_cap_two_downloads() {
        let s = DispatcherSettings::default();
        assert_eq!(s.max_concurrent, 2);
        assert_eq!(s.kill_grace, Duration::from_millis(3000));
    }
}
