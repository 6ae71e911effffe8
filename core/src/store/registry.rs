//! In-process task registry

use std::collections::HashMap;
use std::sync::Arc;

use chrono::{DateTime, Utc};
use serde::Serialize;
use tokio::sync::{broadcast, RwLock};
use tokio_util::sync::CancellationToken;

use crate::error::StoreError;
use crate::task::{Task, TaskStatus, TaskTransition, TransitionError};

/// Notifications emitted on every accepted mutation.
#[derive(Debug, Clone, Serialize)]
pub enum TaskEvent {
    Created {
        task_id: String,
        timestamp: DateTime<Utc>,
    },
    StatusChanged {
        task_id: String,
        old_status: TaskStatus,
        new_status: TaskStatus,
        timestamp: DateTime<Utc>,
    },
    Evicted {
        task_id: String,
        timestamp: DateTime<Utc>,
    },
}

impl TaskEvent {
    pub fn task_id(&self) -> &str {
        match self {
            Self::Created { task_id, .. }
            | Self::StatusChanged { task_id, .. }
            | Self::Evicted { task_id, .. } => task_id,
        }
    }
}

/// Result of a cancellation request.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum CancelOutcome {
    /// The task was active and is now `cancelled`; its worker has been signalled.
    Cancelled(Task),
    /// The task had already finished; nothing changed.
    AlreadyFinished(Task),
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct StatusCounts {
    pub queued: usize,
    pub running: usize,
    pub completed: usize,
    pub error: usize,
    pub cancelled: usize,
}

impl StatusCounts {
    pub fn total(&self) -> usize {
        self.queued + self.running + self.completed + self.error + self.cancelled
    }

    pub fn active(&self) -> usize {
        self.queued + self.running
    }
}

struct Entry {
    task: Task,
    cancel: CancellationToken,
}

struct TaskStoreInner {
    tasks: RwLock<HashMap<String, Entry>>,
    event_tx: broadcast::Sender<TaskEvent>,
}

/// Shared task registry. Clones share the same records.
///
/// Every mutation runs under one write lock, so a reader never sees a task
/// whose status and detail fields disagree.
#[derive(Clone)]
pub struct TaskStore {
    inner: Arc<TaskStoreInner>,
}

impl TaskStore {
    pub fn new() -> Self {
        let (event_tx, _) = broadcast::channel(1024);
        Self {
            inner: Arc::new(TaskStoreInner {
                tasks: RwLock::new(HashMap::new()),
                event_tx,
            }),
        }
    }

    pub fn subscribe(&self) -> broadcast::Receiver<TaskEvent> {
        self.inner.event_tx.subscribe()
    }

    fn emit(&self, event: TaskEvent) {
        let _ = self.inner.event_tx.send(event);
    }

    /// Register a new task and hand back the token its worker should watch.
    pub async fn insert(&self, task: Task) -> Result<CancellationToken, StoreError> {
        let task_id = task.task_id.clone();
        let cancel = CancellationToken::new();
        {
            let mut tasks = self.inner.tasks.write().await;
            if tasks.contains_key(&task_id) {
                return Err(StoreError::Duplicate(task_id));
            }
            tasks.insert(
                task_id.clone(),
                Entry {
                    task,
                    cancel: cancel.clone(),
                },
            );
        }

        self.emit(TaskEvent::Created {
            task_id,
            timestamp: Utc::now(),
        });
        Ok(cancel)
    }

    pub async fn get(&self, task_id: &str) -> Result<Task, StoreError> {
        let tasks = self.inner.tasks.read().await;
        tasks
            .get(task_id)
            .map(|e| e.task.clone())
            .ok_or_else(|| StoreError::NotFound(task_id.to_string()))
    }

    /// All tasks, oldest first.
    pub async fn list(&self) -> Vec<Task> {
        let tasks = self.inner.tasks.read().await;
        let mut out: Vec<Task> = tasks.values().map(|e| e.task.clone()).collect();
        out.sort_by(|a, b| {
            a.created_at
                .cmp(&b.created_at)
                .then_with(|| a.task_id.cmp(&b.task_id))
        });
        out
    }

    pub async fn len(&self) -> usize {
        self.inner.tasks.read().await.len()
    }

    pub async fn is_empty(&self) -> bool {
        self.len().await == 0
    }

    pub async fn cancel_token(&self, task_id: &str) -> Option<CancellationToken> {
        let tasks = self.inner.tasks.read().await;
        tasks.get(task_id).map(|e| e.cancel.clone())
    }

    /// Move a task to `to` and apply `f` to it in the same critical section.
    ///
    /// Leaving `running` clears `progress`; entering a terminal state stamps
    /// `finished_at`. Returns the updated snapshot.
    pub async fn transition<F>(
        &self,
        task_id: &str,
        to: TaskStatus,
        f: F,
    ) -> Result<Task, StoreError>
    where
        F: FnOnce(&mut Task),
    {
        let (snapshot, old_status) = {
            let mut tasks = self.inner.tasks.write().await;
            let entry = tasks
                .get_mut(task_id)
                .ok_or_else(|| StoreError::NotFound(task_id.to_string()))?;

            let from = entry.task.status;
            TaskTransition::validate(from, to)?;

            let now = Utc::now();
            let task = &mut entry.task;
            task.status = to;
            task.updated_at = now;
            if to != TaskStatus::Running {
                task.progress = None;
            }
            if to.is_terminal() {
                task.finished_at = Some(now);
            }
            f(task);
            if let Some(p) = task.progress {
                task.progress = Some(p.min(100));
            }

            (task.clone(), from)
        };

        if old_status != to {
            tracing::debug!(
                target: "tubefetch.task",
                task_id = %task_id,
                from = %old_status,
                to = %to,
                "task transition"
            );
            self.emit(TaskEvent::StatusChanged {
                task_id: task_id.to_string(),
                old_status,
                new_status: to,
                timestamp: Utc::now(),
            });
        }

        Ok(snapshot)
    }

    /// Apply `f` to an active task without changing its status.
    ///
    /// Finished tasks are frozen; the closure is not run and the refusal is
    /// reported as a transition error.
    pub async fn update<F>(&self, task_id: &str, f: F) -> Result<Task, StoreError>
    where
        F: FnOnce(&mut Task),
    {
        let mut tasks = self.inner.tasks.write().await;
        let entry = tasks
            .get_mut(task_id)
            .ok_or_else(|| StoreError::NotFound(task_id.to_string()))?;
        let task = &mut entry.task;
        if task.is_terminal() {
            return Err(TransitionError::FromTerminalState { state: task.status }.into());
        }

        let status = task.status;
        f(task);
        task.status = status;
        task.updated_at = Utc::now();
        if let Some(p) = task.progress {
            task.progress = Some(p.min(100));
        }
        Ok(task.clone())
    }

    /// Update detail fields of a running task.
    pub async fn update_running<F>(&self, task_id: &str, f: F) -> Result<Task, StoreError>
    where
        F: FnOnce(&mut Task),
    {
        self.transition(task_id, TaskStatus::Running, f).await
    }

    /// Cancel an active task, or report that it had already finished.
    ///
    /// Idempotent: repeated calls on a finished task return `AlreadyFinished`.
    pub async fn request_cancel(&self, task_id: &str) -> Result<CancelOutcome, StoreError> {
        let cancel = {
            let tasks = self.inner.tasks.read().await;
            let entry = tasks
                .get(task_id)
                .ok_or_else(|| StoreError::NotFound(task_id.to_string()))?;
            if entry.task.is_terminal() {
                return Ok(CancelOutcome::AlreadyFinished(entry.task.clone()));
            }
            entry.cancel.clone()
        };

        let outcome = match self
            .transition(task_id, TaskStatus::Cancelled, |t| {
                t.error = Some("Cancelled by user".to_string());
            })
            .await
        {
            Ok(task) => CancelOutcome::Cancelled(task),
            // Finished between the read and the write: report it as already done.
            Err(StoreError::Transition(_)) => CancelOutcome::AlreadyFinished(self.get(task_id).await?),
            Err(e) => return Err(e),
        };

        if matches!(outcome, CancelOutcome::Cancelled(_)) {
            cancel.cancel();
        }
        Ok(outcome)
    }

    /// Drop finished tasks whose `finished_at` is older than `retention`.
    pub async fn evict_expired(&self, now: DateTime<Utc>, retention: chrono::Duration) -> usize {
        let evicted: Vec<String> = {
            let mut tasks = self.inner.tasks.write().await;
            let expired: Vec<String> = tasks
                .iter()
                .filter(|(_, e)| {
                    e.task
                        .finished_at
                        .map(|at| e.task.is_terminal() && now - at >= retention)
                        .unwrap_or(false)
                })
                .map(|(id, _)| id.clone())
                .collect();
            for id in &expired {
                tasks.remove(id);
            }
            expired
        };

        for task_id in &evicted {
            self.emit(TaskEvent::Evicted {
                task_id: task_id.clone(),
                timestamp: now,
            });
        }
        evicted.len()
    }

    pub async fn counts(&self) -> StatusCounts {
        let tasks = self.inner.tasks.read().await;
        let mut counts = StatusCounts::default();
        for e in tasks.values() {
            match e.task.status {
                TaskStatus::Queued => counts.queued += 1,
                TaskStatus::Running => counts.running += 1,
                TaskStatus::Completed => counts.completed += 1,
                TaskStatus::Error => counts.error += 1,
                TaskStatus::Cancelled => counts.cancelled += 1,
            }
        }
        counts
    }

    /// Fire every active task's cancellation token (used on shutdown).
    pub async fn cancel_all_active(&self) -> usize {
        let ids: Vec<String> = {
            let tasks = self.inner.tasks.read().await;
            tasks
                .values()
                .filter(|e| e.task.status.is_active())
                .map(|e| e.task.task_id.clone())
                .collect()
        };
        let mut n = 0;
        for id in ids {
            if let Ok(CancelOutcome::Cancelled(_)) = self.request_cancel(&id).await {
                n += 1;
            }
        }
        n
    }
}

impl Default for TaskStore {
    fn default() -> Self {
        Self::new()
    }
}
