//! 客户端轮询状态机：纯状态转换，计时器与网络请求由驱动方执行。

use std::time::Duration;

use super::remote::{RemoteStatus, RemoteTask};

pub const DEFAULT_POLL_INTERVAL: Duration = Duration::from_millis(2000);

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PollerPhase {
    Idle,
    Submitting,
    Polling {
        task_id: String,
        detail: Option<String>,
        warning: Option<String>,
    },
    Completed {
        task_id: String,
        title: Option<String>,
        file_path: Option<String>,
    },
    Error {
        message: String,
    },
    Cancelled {
        task_id: Option<String>,
    },
}

impl PollerPhase {
    pub fn is_terminal(&self) -> bool {
        matches!(
            self,
            Self::Completed { .. } | Self::Error { .. } | Self::Cancelled { .. }
        )
    }

    pub fn task_id(&self) -> Option<&str> {
        match self {
            Self::Polling { task_id, .. } | Self::Completed { task_id, .. } => Some(task_id),
            Self::Cancelled { task_id } => task_id.as_deref(),
            _ => None,
        }
    }

    /// One-line status for display.
    pub fn message(&self) -> String {
        match self {
            Self::Idle => String::new(),
            Self::Submitting => "Loading…".to_string(),
            Self::Polling {
                detail, warning, ..
            } => match (detail, warning) {
                (_, Some(w)) => format!("Processing… ({w})"),
                (Some(d), None) => format!("Processing… {d}"),
                (None, None) => "Processing…".to_string(),
            },
            Self::Completed { title, .. } => match title {
                Some(t) => format!("Saved to media library: {t}"),
                None => "Saved to media library".to_string(),
            },
            Self::Error { message } => format!("Failed: {message}"),
            Self::Cancelled { .. } => "Cancelled".to_string(),
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub enum PollerEvent {
    Submit,
    SubmitAccepted { task_id: String },
    SubmitFailed(String),
    PollResponse(RemoteTask),
    PollFailed(String),
    CancelRequested,
    Reset,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PollerEffect {
    StartTimer(Duration),
    StopTimer,
    SendDelete(String),
}

/// Submission and polling lifecycle of a single client request.
///
/// At most one timer is ever running: every path that starts one stops the
/// previous one first, and every terminal phase stops it.
#[derive(Debug, Clone)]
pub struct PollerMachine {
    phase: PollerPhase,
    interval: Duration,
    timer_running: bool,
}

impl Default for PollerMachine {
    fn default() -> Self {
        Self::new(DEFAULT_POLL_INTERVAL)
    }
}

impl PollerMachine {
    pub fn new(interval: Duration) -> Self {
        Self {
            phase: PollerPhase::Idle,
            interval,
            timer_running: false,
        }
    }

    pub fn phase(&self) -> &PollerPhase {
        &self.phase
    }

    pub fn timer_running(&self) -> bool {
        self.timer_running
    }

    /// Submission is disabled only while a request is in flight or being polled.
    pub fn can_submit(&self) -> bool {
        !matches!(
            self.phase,
            PollerPhase::Submitting | PollerPhase::Polling { .. }
        )
    }

    pub fn handle(&mut self, event: PollerEvent) -> Vec<PollerEffect> {
        let mut effects = Vec::new();

        match event {
            PollerEvent::Submit => {
                self.stop_timer(&mut effects);
                self.phase = PollerPhase::Submitting;
            }
            PollerEvent::SubmitAccepted { task_id } => {
                if self.phase == PollerPhase::Submitting {
                    self.stop_timer(&mut effects);
                    self.phase = PollerPhase::Polling {
                        task_id,
                        detail: None,
                        warning: None,
                    };
                    effects.push(PollerEffect::StartTimer(self.interval));
                    self.timer_running = true;
                }
            }
            PollerEvent::SubmitFailed(message) => {
                if self.phase == PollerPhase::Submitting {
                    self.stop_timer(&mut effects);
                    self.phase = PollerPhase::Error { message };
                }
            }
            PollerEvent::PollResponse(task) => self.on_poll_response(task, &mut effects),
            PollerEvent::PollFailed(message) => {
                if let PollerPhase::Polling { warning, .. } = &mut self.phase {
                    *warning = Some(format!("retrying: {message}"));
                }
            }
            PollerEvent::CancelRequested => {
                if let PollerPhase::Polling { task_id, .. } = &self.phase {
                    let task_id = task_id.clone();
                    effects.push(PollerEffect::SendDelete(task_id.clone()));
                    self.stop_timer(&mut effects);
                    self.phase = PollerPhase::Cancelled {
                        task_id: Some(task_id),
                    };
                }
            }
            PollerEvent::Reset => {
                self.stop_timer(&mut effects);
                self.phase = PollerPhase::Idle;
            }
        }

        effects
    }

    fn on_poll_response(&mut self, task: RemoteTask, effects: &mut Vec<PollerEffect>) {
        // Late responses after cancel/reset are dropped.
        let PollerPhase::Polling { task_id, .. } = &self.phase else {
            return;
        };
        let task_id = task_id.clone();

        match task.status {
            RemoteStatus::Completed => {
                self.stop_timer(effects);
                self.phase = PollerPhase::Completed {
                    task_id,
                    title: task.title,
                    file_path: task.file_path,
                };
            }
            RemoteStatus::Error => {
                self.stop_timer(effects);
                self.phase = PollerPhase::Error {
                    message: task
                        .error
                        .filter(|e| !e.trim().is_empty())
                        .unwrap_or_else(|| "unknown error".to_string()),
                };
            }
            RemoteStatus::Cancelled => {
                self.stop_timer(effects);
                self.phase = PollerPhase::Cancelled {
                    task_id: Some(task_id),
                };
            }
            RemoteStatus::Queued | RemoteStatus::Running | RemoteStatus::Unknown => {
                let detail = match (task.status, task.percent()) {
                    (RemoteStatus::Queued, _) => Some("queued".to_string()),
                    (_, Some(pct)) => Some(format!("{pct}%")),
                    _ => None,
                };
                self.phase = PollerPhase::Polling {
                    task_id,
                    detail,
                    warning: None,
                };
            }
        }
    }

    fn stop_timer(&mut self, effects: &mut Vec<PollerEffect>) {
        if self.timer_running {
            effects.push(PollerEffect::StopTimer);
            self.timer_running = false;
        }
    }
}
