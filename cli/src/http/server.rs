//! HTTP服务器生命周期管理

use super::{
    middleware::{create_middleware_stack, request_logger},
    routes::create_router,
    AppState,
};
use crate::commands::cli::ServeArgs;
use crate::error::CliError;
use axum::middleware;
use tokio::net::TcpListener;
use tokio::signal;
use tokio::sync::broadcast::error::RecvError;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};
use tubefetch_core::api::{spawn_retention_sweeper, AppConfig, TaskEvent, TaskStore};

/// HTTP服务器配置
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ServerConfig {
    pub host: String,
    pub port: u16,
}

impl ServerConfig {
    /// 合并配置：CLI 参数优先，配置文件作为默认值
    pub fn resolve(args: &ServeArgs, cfg: &AppConfig) -> Self {
        Self {
            host: args
                .host
                .clone()
                .unwrap_or_else(|| cfg.http_server.host.clone()),
            port: args.port.unwrap_or(cfg.http_server.port),
        }
    }
}

/// 处理 serve 命令
pub async fn handle_serve(args: ServeArgs, cfg: AppConfig) -> Result<(), CliError> {
    let server = ServerConfig::resolve(&args, &cfg);

    let store = TaskStore::new();
    spawn_event_logger(&store);
    let dispatcher = tubefetch_plugins::factory::build_dispatcher(&cfg, store.clone());

    let sweeper_stop = CancellationToken::new();
    let sweeper = spawn_retention_sweeper(store, &cfg.tasks, sweeper_stop.clone());

    let state = AppState::new(dispatcher.clone(), cfg);
    let result = start_server(server, state).await;

    // 无论服务器如何退出，都要停止子进程
    let cancelled = dispatcher.shutdown().await;
    sweeper_stop.cancel();
    if let Some(handle) = sweeper {
        let _ = handle.await;
    }
    info!(cancelled, "Server shutdown complete");

    result
}

/// 任务状态变化写入 debug 日志
fn spawn_event_logger(store: &TaskStore) {
    let mut event_rx = store.subscribe();
    tokio::spawn(async move {
        loop {
            match event_rx.recv().await {
                Ok(TaskEvent::Created { task_id, .. }) => {
                    debug!(target: "tubefetch.task", task_id = %task_id, "task created");
                }
                Ok(TaskEvent::StatusChanged {
                    task_id,
                    old_status,
                    new_status,
                    ..
                }) => {
                    debug!(target: "tubefetch.task", task_id = %task_id, from = %old_status, to = %new_status, "task status changed");
                }
                Ok(TaskEvent::Evicted { task_id, .. }) => {
                    debug!(target: "tubefetch.task", task_id = %task_id, "task evicted");
                }
                Err(RecvError::Lagged(skipped)) => {
                    debug!(skipped, "task event logger lagged");
                }
                Err(RecvError::Closed) => break,
            }
        }
    });
}

/// 启动HTTP服务器，直到收到 Ctrl+C 或 SIGTERM
pub async fn start_server(config: ServerConfig, state: AppState) -> Result<(), CliError> {
    let app = create_router(state.clone())
        .layer(middleware::from_fn(request_logger))
        .layer(create_middleware_stack(&state.config.http_server));

    let listener = bind_listener(&config).await?;
    let addr = listener
        .local_addr()
        .map_err(|e| CliError::Server(format!("failed to read listen address: {e}")))?;

    info!(
        downloader = state.dispatcher.downloader_name(),
        max_concurrent = state.dispatcher.settings().max_concurrent,
        download_dir = %state.config.downloads.download_dir,
        "HTTP server listening on http://{}",
        addr
    );

    axum::serve(listener, app)
        .with_graceful_shutdown(async move {
            tokio::select! {
                _ = wait_for_ctrl_c() => {
                    info!("Received Ctrl+C signal");
                }
                _ = wait_for_sigterm() => {
                    info!("Received SIGTERM signal");
                }
            }

            info!("Starting graceful shutdown...");
        })
        .await
        .map_err(|e| CliError::Server(e.to_string()))
}

/// 绑定监听端口；`host` 可以是 IP 或主机名（如 `localhost`）
pub async fn bind_listener(config: &ServerConfig) -> Result<TcpListener, CliError> {
    TcpListener::bind((config.host.as_str(), config.port))
        .await
        .map_err(|e| {
            CliError::Server(format!(
                "failed to bind {}:{}: {e}",
                config.host, config.port
            ))
        })
}

async fn wait_for_ctrl_c() {
    if let Err(e) = signal::ctrl_c().await {
        warn!(error = %e, "failed to listen for Ctrl+C");
        std::future::pending::<()>().await
    }
}

/// 等待 SIGTERM 信号（Unix系统）
#[cfg(unix)]
async fn wait_for_sigterm() {
    use tokio::signal::unix::{signal, SignalKind};

    match signal(SignalKind::terminate()) {
        Ok(mut sigterm) => {
            sigterm.recv().await;
        }
        Err(e) => {
            warn!(error = %e, "failed to install SIGTERM handler");
            std::future::pending::<()>().await
        }
    }
}

/// Windows 系统不支持 SIGTERM，使用空操作
#[cfg(not(unix))]
async fn wait_for_sigterm() {
    std::future::pending::<()>().await
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_cli_args_override_config() {
        let mut cfg = AppConfig::default();
        cfg.http_server.port = 8123;

        let args = ServeArgs {
            host: Some("127.0.0.1".into()),
            port: None,
        };
        assert_eq!(
            ServerConfig::resolve(&args, &cfg),
            ServerConfig {
                host: "127.0.0.1".into(),
                port: 8123
            }
        );

        let args = ServeArgs {
            host: None,
            port: Some(9000),
        };
        let resolved = ServerConfig::resolve(&args, &cfg);
        assert_eq!(resolved.host, "0.0.0.0");
        assert_eq!(resolved.port, 9000);
    }

    #[tokio::test]
    async fn test_bind_accepts_hostname() {
        let config = ServerConfig {
            host: "localhost".into(),
            port: 0,
        };
        let listener = bind_listener(&config).await.unwrap();
        let addr = listener.local_addr().unwrap();
        assert!(addr.ip().is_loopback());
        assert_ne!(addr.port(), 0);
    }

    #[tokio::test]
    async fn test_bind_unknown_host_is_server_error() {
        let config = ServerConfig {
            host: "no-such-host.invalid".into(),
            port: 0,
        };
        assert!(matches!(
            bind_listener(&config).await,
            Err(CliError::Server(_))
        ));
    }
}
