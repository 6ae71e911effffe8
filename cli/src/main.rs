use clap::Parser;
use tracing_subscriber::layer::SubscriberExt;
use tracing_subscriber::util::SubscriberInitExt;
use tracing_subscriber::EnvFilter;
use tubefetch_cli::commands::{cli, client};
use tubefetch_cli::error::CliError;
use tubefetch_cli::http;
use tubefetch_cli::settings::ClientSettings;
use tubefetch_core::api::{AppConfig, LoggingConfig};

static LOG_GUARD: std::sync::OnceLock<tracing_appender::non_blocking::WorkerGuard> =
    std::sync::OnceLock::new();

#[tokio::main]
async fn main() {
    let exit = match real_main().await {
        Ok(code) => code,
        Err(e) => {
            match &e {
                CliError::Client(api) => eprintln!("{}", api.user_message()),
                other => eprintln!("{other}"),
            }
            exit_code_for_error(&e)
        }
    };

    std::process::exit(exit);
}

async fn real_main() -> Result<i32, CliError> {
    let args = cli::Args::parse();
    let cfg = tubefetch_core::api::load_default().map_err(|e| CliError::Config(e.to_string()))?;
    init_tracing(&cfg.logging).map_err(CliError::Command)?;

    dispatch(args, cfg).await
}

fn exit_code_for_error(e: &CliError) -> i32 {
    // 0: success
    // 1: download failed (returned as a normal exit code, not as an error)
    // 11: config error
    // 20: server / IO error
    // 30: API request failed
    // 50: internal/uncategorized
    match e {
        CliError::Config(_) => 11,
        CliError::Io(_) => 20,
        CliError::Server(_) => 20,
        CliError::Client(_) => 30,
        CliError::Command(_) => 20,
        CliError::Anyhow(_) => 50,
    }
}

async fn dispatch(args: cli::Args, cfg: AppConfig) -> Result<i32, CliError> {
    // serve 不读取客户端设置，不需要 home 目录
    let settings_path = || ClientSettings::resolve_path(args.client_config.as_deref());

    match args.command {
        cli::Commands::Serve(serve_args) => {
            http::handle_serve(serve_args, cfg).await?;
            Ok(0)
        }
        cli::Commands::Submit(submit_args) => {
            client::handle_submit(submit_args, &settings_path()?, &cfg.client).await
        }
        cli::Commands::Status(task_args) => {
            client::handle_status(task_args, &settings_path()?, &cfg.client).await
        }
        cli::Commands::Cancel(task_args) => {
            client::handle_cancel(task_args, &settings_path()?, &cfg.client).await
        }
        cli::Commands::List(server_args) => {
            client::handle_list(server_args, &settings_path()?, &cfg.client).await
        }
    }
}

fn init_tracing(logging: &LoggingConfig) -> Result<(), String> {
    if !logging.enabled {
        return Ok(());
    }

    let filter = match std::env::var("RUST_LOG") {
        Ok(v) if !v.trim().is_empty() => EnvFilter::from_default_env(),
        _ => EnvFilter::try_new(logging.level.clone()).map_err(|e| e.to_string())?,
    };

    let mut maybe_writer = None;

    if logging.file {
        let dir = match logging
            .directory
            .as_deref()
            .map(str::trim)
            .filter(|s| !s.is_empty())
        {
            Some(d) => std::path::PathBuf::from(d),
            None => std::env::temp_dir().join("tubefetch"),
        };

        std::fs::create_dir_all(&dir).map_err(|e| format!("create log dir failed: {e}"))?;
        let file_name = format!("tubefetch.{}.log", std::process::id());
        let appender = tracing_appender::rolling::never(dir, file_name);
        let (non_blocking, guard) = tracing_appender::non_blocking(appender);
        let _ = LOG_GUARD.set(guard);
        maybe_writer = Some(non_blocking);
    }

    if !logging.console && maybe_writer.is_none() {
        return Err("logging disabled for both console and file".to_string());
    }

    let console_layer = logging.console.then(|| {
        tracing_subscriber::fmt::layer()
            .with_writer(std::io::stderr)
            .with_ansi(atty::is(atty::Stream::Stderr))
    });

    let file_layer = maybe_writer.map(|w| {
        tracing_subscriber::fmt::layer()
            .with_writer(w)
            .with_ansi(false)
    });

    tracing_subscriber::registry()
        .with(filter)
        .with(console_layer)
        .with(file_layer)
        .init();

    Ok(())
}
