#![allow(dead_code)]

use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use async_trait::async_trait;
use tokio::io::{AsyncRead, AsyncWriteExt};
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;

use tubefetch_core::api::{
    DownloadRequest, DownloadSession, DownloaderPlugin, ExitOutcome, Signal, Task, TaskStatus,
    TaskStore,
};

/// What one fake yt-dlp run prints and how it ends.
#[derive(Debug, Clone, Default)]
pub struct Script {
    pub stdout: Vec<String>,
    pub stderr: Vec<String>,
    pub exit_code: i32,
    /// Keep running until signalled or released.
    pub hold: bool,
    /// Ignore `Term`; only `Kill` stops the run.
    pub ignore_term: bool,
    pub spawn_error: Option<String>,
}

impl Script {
    pub fn success(title: &str) -> Self {
        Self {
            stdout: vec![
                format!("[title] {title}"),
                "[progress]  12.0%".into(),
                "[progress]  40.5%".into(),
                "[progress] 100.0%".into(),
                format!("[file] /media/youtube_downloads/{title}.mp4"),
            ],
            ..Self::default()
        }
    }

    pub fn failure(stderr: &[&str], exit_code: i32) -> Self {
        Self {
            stderr: stderr.iter().map(|s| s.to_string()).collect(),
            exit_code,
            ..Self::default()
        }
    }

    pub fn held() -> Self {
        Self {
            stdout: vec!["[title] Long Video".into(), "[progress]   5.0%".into()],
            hold: true,
            ..Self::default()
        }
    }
}

#[derive(Default)]
pub struct Recorder {
    pub started: AtomicUsize,
    pub requests: Mutex<Vec<DownloadRequest>>,
    pub signals: Mutex<Vec<Signal>>,
}

impl Recorder {
    pub fn started(&self) -> usize {
        self.started.load(Ordering::SeqCst)
    }

    pub fn requests(&self) -> Vec<DownloadRequest> {
        self.requests.lock().unwrap().clone()
    }

    pub fn signals(&self) -> Vec<Signal> {
        self.signals.lock().unwrap().clone()
    }
}

/// Downloader that replays a fixed script instead of spawning a process.
pub struct ScriptedDownloader {
    script: Script,
    pub recorder: Arc<Recorder>,
    /// Lets held sessions exit normally with `script.exit_code`.
    pub release: CancellationToken,
}

impl ScriptedDownloader {
    pub fn new(script: Script) -> Arc<Self> {
        Arc::new(Self {
            script,
            recorder: Arc::new(Recorder::default()),
            release: CancellationToken::new(),
        })
    }
}

#[async_trait]
impl DownloaderPlugin for ScriptedDownloader {
    fn name(&self) -> &str {
        "scripted"
    }

    async fn start_session(
        &self,
        request: &DownloadRequest,
    ) -> anyhow::Result<Box<dyn DownloadSession>> {
        if let Some(err) = &self.script.spawn_error {
            anyhow::bail!("{err}");
        }
        self.recorder.started.fetch_add(1, Ordering::SeqCst);
        self.recorder.requests.lock().unwrap().push(request.clone());
        Ok(Box::new(ScriptedSession::start(
            self.script.clone(),
            self.recorder.clone(),
            self.release.clone(),
        )))
    }
}

struct ScriptedSession {
    stdout: Option<tokio::io::DuplexStream>,
    stderr: Option<tokio::io::DuplexStream>,
    writers: Option<JoinHandle<()>>,
    script: Script,
    recorder: Arc<Recorder>,
    stopped: CancellationToken,
    release: CancellationToken,
    term_seen: bool,
}

impl ScriptedSession {
    fn start(script: Script, recorder: Arc<Recorder>, release: CancellationToken) -> Self {
        let (mut out_w, out_r) = tokio::io::duplex(64 * 1024);
        let (mut err_w, err_r) = tokio::io::duplex(64 * 1024);
        let stopped = CancellationToken::new();

        let out_lines = script.stdout.clone();
        let err_lines = script.stderr.clone();
        let hold = script.hold;
        let keep_open = stopped.clone();
        let released = release.clone();
        let writers = tokio::spawn(async move {
            for line in out_lines {
                let _ = out_w.write_all(format!("{line}\n").as_bytes()).await;
            }
            for line in err_lines {
                let _ = err_w.write_all(format!("{line}\n").as_bytes()).await;
            }
            if hold {
                tokio::select! {
                    _ = keep_open.cancelled() => {}
                    _ = released.cancelled() => {}
                }
            }
        });

        Self {
            stdout: Some(out_r),
            stderr: Some(err_r),
            writers: Some(writers),
            script,
            recorder,
            stopped,
            release,
            term_seen: false,
        }
    }
}

#[async_trait]
impl DownloadSession for ScriptedSession {
    fn stdout(&mut self) -> Option<Box<dyn AsyncRead + Unpin + Send>> {
        self.stdout
            .take()
            .map(|s| Box::new(s) as Box<dyn AsyncRead + Unpin + Send>)
    }

    fn stderr(&mut self) -> Option<Box<dyn AsyncRead + Unpin + Send>> {
        self.stderr
            .take()
            .map(|s| Box::new(s) as Box<dyn AsyncRead + Unpin + Send>)
    }

    async fn signal(&mut self, signal: Signal) -> anyhow::Result<()> {
        self.recorder.signals.lock().unwrap().push(signal);
        match signal {
            Signal::Term => {
                self.term_seen = true;
                if !self.script.ignore_term {
                    self.stopped.cancel();
                }
            }
            Signal::Kill => self.stopped.cancel(),
        }
        Ok(())
    }

    async fn wait(&mut self) -> anyhow::Result<ExitOutcome> {
        if self.script.hold {
            tokio::select! {
                _ = self.stopped.cancelled() => {
                    return Ok(ExitOutcome { exit_code: 143, duration_ms: None });
                }
                _ = self.release.cancelled() => {}
            }
        }
        if let Some(writers) = self.writers.take() {
            let _ = writers.await;
        }
        Ok(ExitOutcome {
            exit_code: self.script.exit_code,
            duration_ms: Some(1),
        })
    }
}

/// Poll the store until `task_id` reaches `status` or the deadline passes.
pub async fn wait_for_status(store: &TaskStore, task_id: &str, status: TaskStatus) -> Task {
    let deadline = tokio::time::Instant::now() + Duration::from_secs(5);
    loop {
        let task = store.get(task_id).await.expect("task exists");
        if task.status == status {
            return task;
        }
        assert!(
            tokio::time::Instant::now() < deadline,
            "task {task_id} stuck in {} (wanted {status})",
            task.status
        );
        tokio::time::sleep(Duration::from_millis(10)).await;
    }
}
