//! 下载会话运行时：泵送 stdout/stderr，把进度/标题/文件路径写回任务，处理取消与终止。
use std::time::Duration;

use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;

use crate::downloader::{
    parse_output_line, pump_lines, DownloadSession, ExitOutcome, LineStream, LineTap,
    OutputLine, Signal,
};
use crate::error::DownloadError;
use crate::store::TaskStore;
use crate::util::RingBytes;

const LINE_CHANNEL_CAPACITY: usize = 256;

pub struct DownloadSessionInput {
    pub session: Box<dyn DownloadSession>,
    pub store: TaskStore,
    pub task_id: String,
    pub cancel: CancellationToken,
    pub kill_grace: Duration,
    pub stderr_capture_bytes: usize,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SessionOutcome {
    Exited {
        exit: ExitOutcome,
        stderr_tail: String,
    },
    Cancelled,
}

pub async fn run_download_session(
    input: DownloadSessionInput,
) -> Result<SessionOutcome, DownloadError> {
    let DownloadSessionInput {
        mut session,
        store,
        task_id,
        cancel,
        kill_grace,
        stderr_capture_bytes,
    } = input;

    let stdout = session
        .stdout()
        .ok_or_else(|| DownloadError::Spawn("no stdout".into()))?;
    let stderr = session
        .stderr()
        .ok_or_else(|| DownloadError::Spawn("no stderr".into()))?;

    let stderr_ring = RingBytes::new(stderr_capture_bytes);
    let (line_tx, line_rx) = mpsc::channel::<LineTap>(LINE_CHANNEL_CAPACITY);

    let out_task = pump_lines(stdout, LineStream::Stdout, line_tx.clone(), None);
    let err_task = pump_lines(
        stderr,
        LineStream::Stderr,
        line_tx,
        Some(stderr_ring.clone()),
    );
    let apply_task = tokio::spawn(apply_output(store, task_id.clone(), line_rx));

    let waited = tokio::select! {
        res = session.wait() => Some(res),
        _ = cancel.cancelled() => None,
    };

    let Some(res) = waited else {
        tracing::info!(target: "tubefetch.task", task_id = %task_id, "stopping cancelled download");
        terminate(&mut session, kill_grace).await;
        out_task.abort();
        err_task.abort();
        let _ = apply_task.await;
        return Ok(SessionOutcome::Cancelled);
    };

    let exit = res?;
    drain_pump(out_task, kill_grace, &task_id).await;
    drain_pump(err_task, kill_grace, &task_id).await;
    let _ = apply_task.await;

    tracing::debug!(
        target: "tubefetch.task",
        task_id = %task_id,
        exit_code = exit.exit_code,
        duration_ms = exit.duration_ms,
        "download process exited"
    );

    Ok(SessionOutcome::Exited {
        exit,
        stderr_tail: stderr_ring.tail_string(),
    })
}

/// `Term`, then `Kill` if the process outlives the grace period.
async fn terminate(session: &mut Box<dyn DownloadSession>, grace: Duration) {
    if let Err(e) = session.signal(Signal::Term).await {
        tracing::debug!(error = %e, "term signal failed");
    }
    match tokio::time::timeout(grace, session.wait()).await {
        Ok(_) => {}
        Err(_) => {
            tracing::warn!(grace_ms = grace.as_millis() as u64, "download ignored term; killing");
            if let Err(e) = session.signal(Signal::Kill).await {
                tracing::warn!(error = %e, "kill signal failed");
            }
            let _ = session.wait().await;
        }
    }
}

/// Pipes can outlive the process when a grandchild (ffmpeg) inherits them.
async fn drain_pump(
    mut task: JoinHandle<Result<u64, DownloadError>>,
    grace: Duration,
    task_id: &str,
) {
    match tokio::time::timeout(grace, &mut task).await {
        Ok(Ok(Ok(_))) => {}
        Ok(Ok(Err(e))) => tracing::warn!(task_id = %task_id, error = %e, "output pump failed"),
        Ok(Err(e)) => tracing::warn!(task_id = %task_id, error = %e, "output pump panicked"),
        Err(_) => {
            tracing::debug!(task_id = %task_id, "output pump still open after exit; aborting");
            task.abort();
        }
    }
}

async fn apply_output(store: TaskStore, task_id: String, mut rx: mpsc::Receiver<LineTap>) {
    // `--print` puts yt-dlp in quiet mode, which sends progress to stderr;
    // markers are accepted from either stream.
    while let Some(tap) = rx.recv().await {
        let res = match parse_output_line(&tap.line) {
            OutputLine::Progress(pct) => {
                store
                    .update_running(&task_id, |t| match t.progress {
                        Some(cur) if cur >= pct => {}
                        _ => t.progress = Some(pct),
                    })
                    .await
            }
            OutputLine::Title(title) => {
                store
                    .update_running(&task_id, |t| t.title = Some(title))
                    .await
            }
            OutputLine::File(path) => {
                store
                    .update_running(&task_id, |t| t.file_path = Some(path))
                    .await
            }
            OutputLine::Other => {
                match tap.stream {
                    LineStream::Stdout => {
                        tracing::debug!(target: "tubefetch.ytdlp", task_id = %task_id, line = %tap.line, "stdout")
                    }
                    LineStream::Stderr => {
                        tracing::debug!(target: "tubefetch.ytdlp", task_id = %task_id, line = %tap.line, "stderr")
                    }
                }
                continue;
            }
        };

        if let Err(e) = res {
            // Task finished (usually cancelled) while output was still arriving.
            tracing::debug!(task_id = %task_id, error = %e, "dropping output update");
        }
    }
}
