//! 轮询驱动：计时器与 HTTP 请求，状态转换交给 `PollerMachine`

use std::time::Duration;

use indicatif::{ProgressBar, ProgressStyle};
use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tokio::time::{interval_at, Instant, MissedTickBehavior};
use tokio_util::sync::CancellationToken;
use tubefetch_core::api::{PollerEvent, PollerPhase};

use crate::http::client::TaskApiClient;

/// Polls `GET /tasks/{id}` on a fixed interval and forwards each result as a
/// `PollerEvent`. Dropping the poller stops its timer.
pub struct TaskPoller {
    cancel: CancellationToken,
    handle: Option<JoinHandle<()>>,
    events: mpsc::Receiver<PollerEvent>,
}

impl TaskPoller {
    /// The first request goes out one `period` after start.
    pub fn start(client: TaskApiClient, task_id: String, period: Duration) -> Self {
        let cancel = CancellationToken::new();
        let (tx, events) = mpsc::channel(8);
        let stop = cancel.clone();

        let handle = tokio::spawn(async move {
            let mut ticker = interval_at(Instant::now() + period, period);
            ticker.set_missed_tick_behavior(MissedTickBehavior::Skip);

            loop {
                tokio::select! {
                    _ = stop.cancelled() => break,
                    _ = ticker.tick() => {}
                }

                let event = tokio::select! {
                    _ = stop.cancelled() => break,
                    res = client.get_task(&task_id) => match res {
                        Ok(task) => PollerEvent::PollResponse(task),
                        Err(e) => {
                            tracing::debug!(target: "tubefetch.client", task_id = %task_id, error = %e, "poll failed");
                            PollerEvent::PollFailed(e.user_message())
                        }
                    },
                };

                if tx.send(event).await.is_err() {
                    break;
                }
            }
        });

        Self {
            cancel,
            handle: Some(handle),
            events,
        }
    }

    pub async fn next_event(&mut self) -> Option<PollerEvent> {
        self.events.recv().await
    }

    pub fn is_running(&self) -> bool {
        self.handle.as_ref().is_some_and(|h| !h.is_finished())
    }

    /// Stop the timer and wait for the loop to exit.
    pub async fn stop(&mut self) {
        self.cancel.cancel();
        if let Some(handle) = self.handle.take() {
            let _ = handle.await;
        }
    }
}

impl Drop for TaskPoller {
    fn drop(&mut self) {
        self.cancel.cancel();
    }
}

/// Single-line spinner mirroring the phase message.
pub struct StatusDisplay {
    bar: ProgressBar,
    enabled: bool,
}

impl StatusDisplay {
    pub fn new(enabled: bool) -> Self {
        if !enabled {
            return Self {
                bar: ProgressBar::hidden(),
                enabled: false,
            };
        }

        let bar = ProgressBar::new_spinner();
        bar.set_style(
            ProgressStyle::default_spinner()
                .template("{spinner:.green} {msg}")
                .unwrap_or_else(|_| ProgressStyle::default_spinner())
                .tick_strings(&["⠋", "⠙", "⠹", "⠸", "⠼", "⠴", "⠦", "⠧", "⠇", "⠏"]),
        );
        bar.enable_steady_tick(Duration::from_millis(100));
        Self { bar, enabled: true }
    }

    pub fn show(&self, phase: &PollerPhase) {
        if self.enabled {
            self.bar.set_message(phase.message());
        }
    }

    /// Remove the spinner line; the caller prints the final result.
    pub fn clear(&self) {
        if self.enabled {
            self.bar.finish_and_clear();
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use mockito::Server;
    use tubefetch_core::api::RemoteStatus;

    #[tokio::test]
    async fn test_poller_forwards_status_and_failures() {
        let mut server = Server::new_async().await;
        let _ok = server
            .mock("GET", "/tasks/t-1")
            .with_status(200)
            .with_body(r#"{"task_id":"t-1","status":"running","progress":12}"#)
            .expect_at_least(1)
            .create_async()
            .await;

        let client = TaskApiClient::new(&server.url(), 1_000).unwrap();
        let mut poller = TaskPoller::start(client, "t-1".into(), Duration::from_millis(20));

        match poller.next_event().await {
            Some(PollerEvent::PollResponse(task)) => {
                assert_eq!(task.status, RemoteStatus::Running);
                assert_eq!(task.percent(), Some(12));
            }
            other => panic!("unexpected event: {other:?}"),
        }

        poller.stop().await;
        assert!(!poller.is_running());
    }

    #[tokio::test]
    async fn test_poll_failure_is_reported_not_fatal() {
        let mut server = Server::new_async().await;
        let _err = server
            .mock("GET", "/tasks/t-2")
            .with_status(500)
            .with_body(r#"{"error":"boom"}"#)
            .create_async()
            .await;

        let client = TaskApiClient::new(&server.url(), 1_000).unwrap();
        let mut poller = TaskPoller::start(client, "t-2".into(), Duration::from_millis(20));

        for _ in 0..2 {
            match poller.next_event().await {
                Some(PollerEvent::PollFailed(msg)) => assert_eq!(msg, "boom"),
                other => panic!("unexpected event: {other:?}"),
            }
        }
        assert!(poller.is_running());
    }

    #[tokio::test]
    async fn test_drop_stops_timer() {
        let server = Server::new_async().await;
        let client = TaskApiClient::new(&server.url(), 1_000).unwrap();
        let poller = TaskPoller::start(client, "t-3".into(), Duration::from_secs(60));
        let cancel = poller.cancel.clone();
        drop(poller);
        assert!(cancel.is_cancelled());
    }

    #[test]
    fn test_hidden_display_is_noop() {
        let display = StatusDisplay::new(false);
        display.show(&PollerPhase::Submitting);
        display.clear();
    }
}
