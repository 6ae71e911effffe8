//! 客户端命令：submit / status / cancel / list

use std::path::Path;
use std::time::Duration;

use tubefetch_core::api::{
    is_youtube_watch_url, ClientConfig, PollerEffect, PollerEvent, PollerMachine, PollerPhase,
    RemoteTask,
};

use super::cli::{ServerArgs, SubmitArgs, TaskArgs};
use crate::error::CliError;
use crate::http::client::TaskApiClient;
use crate::poll::{StatusDisplay, TaskPoller};
use crate::settings::ClientSettings;

/// Loaded settings plus whether this run changed them.
struct ClientSession {
    client: TaskApiClient,
    settings: ClientSettings,
    dirty: bool,
}

impl ClientSession {
    fn open(settings_path: &Path, server: &ServerArgs, cfg: &ClientConfig) -> Result<Self, CliError> {
        let mut settings = ClientSettings::load_from(settings_path)?;
        let mut dirty = false;
        if let Some(url) = server.server.as_deref() {
            settings.set_api_url(url)?;
            dirty = true;
        }
        let client = TaskApiClient::new(&settings.api_url, cfg.request_timeout_ms)?;
        Ok(Self {
            client,
            settings,
            dirty,
        })
    }

    fn save_if_changed(&self, settings_path: &Path) {
        if !self.dirty {
            return;
        }
        if let Err(e) = self.settings.save_to(settings_path) {
            tracing::warn!(path = %settings_path.display(), error = %e, "failed to save client settings");
        }
    }
}

/// Local checks before anything is sent.
pub fn check_submit_url(url: &str, youtube_only: bool) -> Result<String, CliError> {
    let url = url.trim();
    if url.is_empty() {
        return Err(CliError::Command("Please enter a URL.".to_string()));
    }
    if youtube_only && !is_youtube_watch_url(url) {
        return Err(CliError::Command(
            "Not a YouTube video URL (expected youtube.com/watch?v=...).".to_string(),
        ));
    }
    Ok(url.to_string())
}

pub fn format_task_line(task: &RemoteTask) -> String {
    let mut line = format!(
        "{}  {}",
        task.task_id.as_deref().unwrap_or("-"),
        serde_json::to_value(task.status)
            .ok()
            .and_then(|v| v.as_str().map(str::to_string))
            .unwrap_or_else(|| "unknown".to_string())
    );
    if let Some(pct) = task.percent() {
        line.push_str(&format!("  {pct}%"));
    }
    if let Some(title) = task.title.as_deref() {
        line.push_str(&format!("  {title}"));
    }
    if let Some(err) = task.error.as_deref() {
        line.push_str(&format!("  ({err})"));
    }
    line
}

/// Lines printed once polling stops.
pub fn completion_lines(phase: &PollerPhase, frontend_url: Option<&str>) -> Vec<String> {
    let mut lines = vec![phase.message()];
    if let PollerPhase::Completed { file_path, .. } = phase {
        if let Some(path) = file_path {
            lines.push(path.clone());
        }
        if let Some(url) = frontend_url {
            lines.push(format!("Open: {url}"));
        }
    }
    lines
}

/// Exit code for a finished submit: 0 saved, 1 failed, 130 cancelled.
pub fn exit_code_for_phase(phase: &PollerPhase) -> i32 {
    match phase {
        PollerPhase::Completed { .. } => 0,
        PollerPhase::Cancelled { .. } => 130,
        _ => 1,
    }
}

/// 处理 submit 命令：提交并轮询直到任务结束
pub async fn handle_submit(
    args: SubmitArgs,
    settings_path: &Path,
    cfg: &ClientConfig,
) -> Result<i32, CliError> {
    let url = check_submit_url(&args.url, args.youtube_only)?;

    let mut session = ClientSession::open(settings_path, &args.server, cfg)?;
    let format = args
        .format
        .map(Into::into)
        .unwrap_or(session.settings.format);
    if format != session.settings.format {
        session.settings.format = format;
        session.dirty = true;
    }
    if let Some(frontend) = args.frontend_url.as_deref() {
        session.settings.set_frontend_url(frontend);
        session.dirty = true;
    }
    session.save_if_changed(settings_path);

    let interval = Duration::from_millis(cfg.poll_interval_ms.max(1));
    let mut machine = PollerMachine::new(interval);
    let display = StatusDisplay::new(!args.no_wait && atty::is(atty::Stream::Stderr));

    machine.handle(PollerEvent::Submit);
    display.show(machine.phase());

    let accepted = match session.client.submit(&url, format).await {
        Ok(accepted) => accepted,
        Err(e) => {
            machine.handle(PollerEvent::SubmitFailed(e.user_message()));
            display.clear();
            return Err(e.into());
        }
    };
    tracing::info!(target: "tubefetch.client", task_id = %accepted.task_id, %format, "download submitted");

    if args.no_wait {
        println!("{}", accepted.task_id);
        return Ok(0);
    }

    let effects = machine.handle(PollerEvent::SubmitAccepted {
        task_id: accepted.task_id,
    });
    display.show(machine.phase());

    let mut poller: Option<TaskPoller> = None;
    apply_effects(effects, machine.phase().task_id(), &session.client, &mut poller).await;

    while !machine.phase().is_terminal() {
        let Some(active) = poller.as_mut() else {
            break;
        };
        let event = tokio::select! {
            ev = active.next_event() => match ev {
                Some(ev) => ev,
                None => break,
            },
            _ = tokio::signal::ctrl_c() => PollerEvent::CancelRequested,
        };

        let effects = machine.handle(event);
        display.show(machine.phase());
        apply_effects(effects, machine.phase().task_id(), &session.client, &mut poller).await;
    }

    if let Some(mut active) = poller.take() {
        active.stop().await;
    }
    display.clear();

    let phase = machine.phase();
    for line in completion_lines(phase, session.settings.frontend_url.as_deref()) {
        println!("{line}");
    }
    Ok(exit_code_for_phase(phase))
}

async fn apply_effects(
    effects: Vec<PollerEffect>,
    task_id: Option<&str>,
    client: &TaskApiClient,
    poller: &mut Option<TaskPoller>,
) {
    for effect in effects {
        match effect {
            PollerEffect::StartTimer(period) => {
                if let Some(mut old) = poller.take() {
                    old.stop().await;
                }
                if let Some(task_id) = task_id {
                    *poller = Some(TaskPoller::start(client.clone(), task_id.to_string(), period));
                }
            }
            PollerEffect::StopTimer => {
                if let Some(mut old) = poller.take() {
                    old.stop().await;
                }
            }
            PollerEffect::SendDelete(task_id) => match client.cancel(&task_id).await {
                Ok(reply) => {
                    tracing::info!(target: "tubefetch.client", task_id = %task_id, status = %reply.status, "cancel sent")
                }
                Err(e) => {
                    tracing::warn!(target: "tubefetch.client", task_id = %task_id, error = %e, "cancel request failed")
                }
            },
        }
    }
}

/// 处理 status 命令
pub async fn handle_status(
    args: TaskArgs,
    settings_path: &Path,
    cfg: &ClientConfig,
) -> Result<i32, CliError> {
    let session = ClientSession::open(settings_path, &args.server, cfg)?;
    session.save_if_changed(settings_path);

    let task = session.client.get_task(&args.task_id).await?;
    println!("{}", format_task_line(&task));
    if let Some(path) = task.file_path.as_deref() {
        println!("{path}");
    }
    Ok(0)
}

/// 处理 cancel 命令
pub async fn handle_cancel(
    args: TaskArgs,
    settings_path: &Path,
    cfg: &ClientConfig,
) -> Result<i32, CliError> {
    let session = ClientSession::open(settings_path, &args.server, cfg)?;
    session.save_if_changed(settings_path);

    let reply = session.client.cancel(&args.task_id).await?;
    match reply.message.as_deref() {
        Some(msg) => println!("{}: {}", reply.status, msg),
        None => println!("{}", reply.status),
    }
    Ok(0)
}

/// 处理 list 命令
pub async fn handle_list(
    args: ServerArgs,
    settings_path: &Path,
    cfg: &ClientConfig,
) -> Result<i32, CliError> {
    let session = ClientSession::open(settings_path, &args, cfg)?;
    session.save_if_changed(settings_path);

    let tasks = session.client.list().await?;
    if tasks.is_empty() {
        println!("No tasks.");
    }
    for task in &tasks {
        println!("{}", format_task_line(task));
    }
    Ok(0)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::commands::cli::FormatArg;
    use mockito::{Matcher, Server};
    use pretty_assertions::assert_eq;
    use tubefetch_core::api::{MediaFormat, RemoteStatus};

    fn fast_client_config() -> ClientConfig {
        ClientConfig {
            poll_interval_ms: 10,
            request_timeout_ms: 1_000,
        }
    }

    #[test]
    fn test_check_submit_url() {
        assert!(matches!(check_submit_url("   ", false), Err(CliError::Command(_))));
        assert_eq!(
            check_submit_url(" https://vimeo.com/1 ", false).unwrap(),
            "https://vimeo.com/1"
        );
        assert!(check_submit_url("https://vimeo.com/1", true).is_err());
        assert!(check_submit_url("https://youtu.be/abc", true).is_err());
        assert!(check_submit_url("https://www.youtube.com/watch?v=abc", true).is_ok());
    }

    #[test]
    fn test_format_task_line() {
        let task = RemoteTask {
            task_id: Some("t-1".into()),
            progress: Some(39.6),
            title: Some("Example Video".into()),
            ..RemoteTask::with_status(RemoteStatus::Running)
        };
        assert_eq!(format_task_line(&task), "t-1  running  40%  Example Video");

        let task = RemoteTask {
            error: Some("boom".into()),
            ..RemoteTask::with_status(RemoteStatus::Error)
        };
        assert_eq!(format_task_line(&task), "-  error  (boom)");
    }

    #[test]
    fn test_completion_lines_link_frontend() {
        let done = PollerPhase::Completed {
            task_id: "t".into(),
            title: Some("Example Video".into()),
            file_path: Some("/media/Example Video.mp4".into()),
        };
        let lines = completion_lines(&done, Some("http://ha.local:8123/media"));
        assert_eq!(
            lines,
            vec![
                done.message(),
                "/media/Example Video.mp4".to_string(),
                "Open: http://ha.local:8123/media".to_string(),
            ]
        );

        let failed = PollerPhase::Error {
            message: "boom".into(),
        };
        assert_eq!(
            completion_lines(&failed, Some("http://ha.local:8123/media")),
            vec![failed.message()]
        );
    }

    #[test]
    fn test_exit_code_for_phase() {
        assert_eq!(
            exit_code_for_phase(&PollerPhase::Completed {
                task_id: "t".into(),
                title: None,
                file_path: None
            }),
            0
        );
        assert_eq!(
            exit_code_for_phase(&PollerPhase::Error {
                message: "x".into()
            }),
            1
        );
        assert_eq!(
            exit_code_for_phase(&PollerPhase::Cancelled { task_id: None }),
            130
        );
    }

    #[tokio::test]
    async fn test_submit_polls_until_completed_and_saves_settings() {
        let mut server = Server::new_async().await;
        let _post = server
            .mock("POST", "/download_video")
            .match_body(Matcher::PartialJson(serde_json::json!({"format": "mp3"})))
            .with_status(202)
            .with_body(r#"{"status":"processing","task_id":"t-1"}"#)
            .create_async()
            .await;
        let _get = server
            .mock("GET", "/tasks/t-1")
            .with_status(200)
            .with_body(r#"{"task_id":"t-1","status":"completed","title":"Example Video"}"#)
            .create_async()
            .await;

        let dir = tempfile::tempdir().unwrap();
        let settings_path = dir.path().join("client.toml");
        let args = SubmitArgs {
            url: "https://www.youtube.com/watch?v=abc123".into(),
            format: Some(FormatArg::Mp3),
            youtube_only: true,
            no_wait: false,
            frontend_url: Some("http://ha.local:8123/media/".into()),
            server: ServerArgs {
                server: Some(format!("{}/", server.url())),
            },
        };

        let code = handle_submit(args, &settings_path, &fast_client_config())
            .await
            .unwrap();
        assert_eq!(code, 0);

        let saved = ClientSettings::load_from(&settings_path).unwrap();
        assert_eq!(saved.api_url, server.url());
        assert_eq!(saved.format, MediaFormat::Mp3);
        assert_eq!(saved.frontend_url.as_deref(), Some("http://ha.local:8123/media"));
    }

    #[tokio::test]
    async fn test_submit_reports_task_error() {
        let mut server = Server::new_async().await;
        let _post = server
            .mock("POST", "/download_video")
            .with_status(202)
            .with_body(r#"{"status":"processing","task_id":"t-9"}"#)
            .create_async()
            .await;
        let _get = server
            .mock("GET", "/tasks/t-9")
            .with_status(200)
            .with_body(r#"{"task_id":"t-9","status":"failed","error":"ERROR: Video unavailable"}"#)
            .create_async()
            .await;

        let dir = tempfile::tempdir().unwrap();
        let args = SubmitArgs {
            url: "https://youtu.be/abc123".into(),
            format: None,
            youtube_only: false,
            no_wait: false,
            frontend_url: None,
            server: ServerArgs {
                server: Some(server.url()),
            },
        };

        let code = handle_submit(args, &dir.path().join("client.toml"), &fast_client_config())
            .await
            .unwrap();
        assert_eq!(code, 1);
    }

    #[tokio::test]
    async fn test_submit_rejection_is_client_error() {
        let mut server = Server::new_async().await;
        let _post = server
            .mock("POST", "/download_video")
            .with_status(400)
            .with_body(r#"{"error":"Playlist URLs are not allowed. Use a single video URL (e.g. youtube.com/watch?v=...)."}"#)
            .create_async()
            .await;

        let dir = tempfile::tempdir().unwrap();
        let args = SubmitArgs {
            url: "https://www.youtube.com/playlist?list=PL1".into(),
            format: None,
            youtube_only: false,
            no_wait: false,
            frontend_url: None,
            server: ServerArgs {
                server: Some(server.url()),
            },
        };

        let err = handle_submit(args, &dir.path().join("client.toml"), &fast_client_config())
            .await
            .unwrap_err();
        match err {
            CliError::Client(e) => assert!(e.user_message().starts_with("Playlist URLs")),
            other => panic!("unexpected error: {other:?}"),
        }
    }

    #[tokio::test]
    async fn test_empty_url_sends_nothing() {
        let dir = tempfile::tempdir().unwrap();
        let args = SubmitArgs {
            url: "  ".into(),
            format: None,
            youtube_only: false,
            no_wait: false,
            frontend_url: None,
            server: ServerArgs::default(),
        };
        let err = handle_submit(args, &dir.path().join("client.toml"), &fast_client_config())
            .await
            .unwrap_err();
        assert!(matches!(err, CliError::Command(_)));
        assert!(!dir.path().join("client.toml").exists());
    }
}
