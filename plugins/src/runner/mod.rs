pub mod ytdlp;

pub use ytdlp::YtDlpRunnerPlugin;
