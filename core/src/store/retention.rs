use std::time::Duration;

use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;

use super::TaskStore;
use crate::config::TasksConfig;

/// Periodically evict finished tasks older than `retention_secs`.
///
/// Returns `None` when retention is disabled (`retention_secs = 0`).
pub fn spawn_retention_sweeper(
    store: TaskStore,
    cfg: &TasksConfig,
    shutdown: CancellationToken,
) -> Option<JoinHandle<()>> {
    if cfg.retention_secs == 0 {
        tracing::info!("task retention disabled; finished tasks are kept for the process lifetime");
        return None;
    }

    let Some(retention) = retention_window(cfg.retention_secs) else {
        tracing::warn!(
            retention_secs = cfg.retention_secs,
            "task retention exceeds the representable range; finished tasks are kept for the process lifetime"
        );
        return None;
    };
    let period = Duration::from_secs(cfg.sweep_interval_secs.max(1));

    Some(tokio::spawn(async move {
        let mut ticker = tokio::time::interval(period);
        ticker.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Skip);
        loop {
            tokio::select! {
                _ = shutdown.cancelled() => break,
                _ = ticker.tick() => {
                    let evicted = store.evict_expired(chrono::Utc::now(), retention).await;
                    if evicted > 0 {
                        tracing::info!(target: "tubefetch.task", evicted, "evicted expired tasks");
                    }
                }
            }
        }
    }))
}

/// `retention_secs` as a chrono duration, `None` when it does not fit.
fn retention_window(retention_secs: u64) -> Option<chrono::Duration> {
    let secs = i64::try_from(retention_secs).ok()?;
    chrono::Duration::try_seconds(secs)
}
