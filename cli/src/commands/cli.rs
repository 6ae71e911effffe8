use clap::{Args as ClapArgs, Parser, Subcommand};
use tubefetch_core::api::MediaFormat;

#[derive(clap::ValueEnum, Debug, Clone, Copy, PartialEq, Eq)]
pub enum FormatArg {
    Mp4,
    Mp3,
}

impl From<FormatArg> for MediaFormat {
    fn from(f: FormatArg) -> Self {
        match f {
            FormatArg::Mp4 => MediaFormat::Mp4,
            FormatArg::Mp3 => MediaFormat::Mp3,
        }
    }
}

#[derive(Parser, Debug)]
#[command(name = "tubefetch", version, about = "yt-dlp download task service and client")]
pub struct Args {
    #[command(subcommand)]
    pub command: Commands,

    /// Path to the client settings file (default: ~/.tubefetch/client.toml).
    #[arg(long, global = true)]
    pub client_config: Option<String>,
}

#[derive(Subcommand, Debug)]
pub enum Commands {
    /// Run the HTTP task service.
    Serve(ServeArgs),
    /// Submit a URL and poll until the download finishes.
    Submit(SubmitArgs),
    /// Show one task.
    Status(TaskArgs),
    /// Cancel a task.
    Cancel(TaskArgs),
    /// List all tasks known to the service.
    List(ServerArgs),
}

#[derive(ClapArgs, Debug, Clone, Default)]
pub struct ServeArgs {
    /// Overrides `http_server.host`.
    #[arg(long)]
    pub host: Option<String>,

    /// Overrides `http_server.port`.
    #[arg(long)]
    pub port: Option<u16>,
}

#[derive(ClapArgs, Debug, Clone, Default)]
pub struct ServerArgs {
    /// API base URL; saved for later runs.
    #[arg(long)]
    pub server: Option<String>,
}

#[derive(ClapArgs, Debug, Clone)]
pub struct SubmitArgs {
    pub url: String,

    /// Defaults to the last format used.
    #[arg(long, value_enum)]
    pub format: Option<FormatArg>,

    /// Only accept youtube.com/watch?v= URLs.
    #[arg(long)]
    pub youtube_only: bool,

    /// Print the task id and return without polling.
    #[arg(long)]
    pub no_wait: bool,

    /// Media browser URL shown after a download completes; saved for later
    /// runs. An empty value clears it.
    #[arg(long)]
    pub frontend_url: Option<String>,

    #[command(flatten)]
    pub server: ServerArgs,
}

#[derive(ClapArgs, Debug, Clone)]
pub struct TaskArgs {
    pub task_id: String,

    #[command(flatten)]
    pub server: ServerArgs,
}
