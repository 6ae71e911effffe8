//! Planner：把下载请求与 `downloads` 配置合并为一次 yt-dlp 调用（程序 + 参数）。
use std::path::{Path, PathBuf};

use anyhow::Result;

use tubefetch_core::api as core_api;

/// Player clients that keep working when the default web client is throttled.
const YOUTUBE_EXTRACTOR_ARGS: &str = "youtube:player_client=default,web_safari,web_embedded";
const OUTPUT_TEMPLATE: &str = "%(title)s.%(ext)s";

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct YtDlpOptions {
    pub bin: String,
    pub output_dir: PathBuf,
    pub cache_dir: String,
    pub socket_timeout_secs: u64,
    pub extra_args: Vec<String>,
}

impl YtDlpOptions {
    pub fn from_config(cfg: &core_api::DownloadsConfig) -> Self {
        Self {
            bin: cfg.ytdlp_bin.clone(),
            output_dir: PathBuf::from(&cfg.download_dir),
            cache_dir: cfg.cache_dir.clone(),
            socket_timeout_secs: cfg.socket_timeout_secs,
            extra_args: cfg.extra_args.clone(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct YtDlpPlan {
    pub program: String,
    pub args: Vec<String>,
    pub output_dir: PathBuf,
}

pub fn build_ytdlp_plan(opts: &YtDlpOptions, request: &core_api::DownloadRequest) -> YtDlpPlan {
    let mut args: Vec<String> = vec![
        "--no-playlist".into(),
        "--newline".into(),
        "--progress".into(),
        "--progress-template".into(),
        core_api::PROGRESS_TEMPLATE.into(),
        "--no-simulate".into(),
        "--print".into(),
        core_api::TITLE_TEMPLATE.into(),
        "--print".into(),
        core_api::FILE_TEMPLATE.into(),
        "-o".into(),
        output_template(&opts.output_dir),
    ];

    args.extend(format_args(request.format).iter().map(|s| s.to_string()));

    args.extend([
        "--cache-dir".to_string(),
        opts.cache_dir.clone(),
        "--extractor-args".to_string(),
        YOUTUBE_EXTRACTOR_ARGS.to_string(),
        "--socket-timeout".to_string(),
        opts.socket_timeout_secs.to_string(),
    ]);
    args.extend(opts.extra_args.iter().cloned());

    // Terminate option parsing so a URL can never be read as a flag.
    args.push("--".into());
    args.push(request.url.clone());

    YtDlpPlan {
        program: opts.bin.clone(),
        args,
        output_dir: opts.output_dir.clone(),
    }
}

fn format_args(format: core_api::MediaFormat) -> &'static [&'static str] {
    match format {
        core_api::MediaFormat::Mp4 => &[
            "-f",
            "bestvideo[ext=mp4]+bestaudio[ext=m4a]/bestvideo+bestaudio/best[ext=mp4]/best",
            "--merge-output-format",
            "mp4",
        ],
        core_api::MediaFormat::Mp3 => &[
            "-f",
            "bestaudio/best",
            "-x",
            "--audio-format",
            "mp3",
            "--audio-quality",
            "192K",
        ],
    }
}

fn output_template(dir: &Path) -> String {
    dir.join(OUTPUT_TEMPLATE).to_string_lossy().into_owned()
}

/// Resolve the downloader executable: absolute paths are used as-is, bare
/// names are looked up on `PATH`.
pub fn resolve_executable_path(bin: &str) -> Result<String> {
    let path = Path::new(bin);
    if path.is_absolute() {
        if path.exists() {
            return Ok(bin.to_string());
        }
        anyhow::bail!("executable not found: {bin}");
    }

    let found = which::which(bin).map_err(|e| anyhow::anyhow!("{bin} not found in PATH: {e}"))?;
    Ok(found.to_string_lossy().into_owned())
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    fn opts() -> YtDlpOptions {
        YtDlpOptions {
            bin: "yt-dlp".into(),
            output_dir: PathBuf::from("/config/media"),
            cache_dir: "/tmp/yt-dlp".into(),
            socket_timeout_secs: 1800,
            extra_args: vec!["--restrict-filenames".into()],
        }
    }

    fn request(format: core_api::MediaFormat) -> core_api::DownloadRequest {
        core_api::DownloadRequest {
            task_id: "t1".into(),
            url: "https://www.youtube.com/watch?v=abc123".into(),
            format,
        }
    }

    fn value_after<'a>(args: &'a [String], flag: &str) -> Option<&'a str> {
        args.iter()
            .position(|a| a == flag)
            .and_then(|i| args.get(i + 1))
            .map(String::as_str)
    }

    #[test]
    fn mp4_plan() {
        let plan = build_ytdlp_plan(&opts(), &request(core_api::MediaFormat::Mp4));
        assert_eq!(plan.program, "yt-dlp");
        assert_eq!(
            value_after(&plan.args, "-f"),
            Some("bestvideo[ext=mp4]+bestaudio[ext=m4a]/bestvideo+bestaudio/best[ext=mp4]/best")
        );
        assert_eq!(value_after(&plan.args, "--merge-output-format"), Some("mp4"));
        assert!(!plan.args.contains(&"-x".to_string()));
    }

    #[test]
    fn mp3_plan() {
        let plan = build_ytdlp_plan(&opts(), &request(core_api::MediaFormat::Mp3));
        assert_eq!(value_after(&plan.args, "-f"), Some("bestaudio/best"));
        assert!(plan.args.contains(&"-x".to_string()));
        assert_eq!(value_after(&plan.args, "--audio-format"), Some("mp3"));
        assert_eq!(value_after(&plan.args, "--audio-quality"), Some("192K"));
    }

    #[test]
    fn common_arguments() {
        let plan = build_ytdlp_plan(&opts(), &request(core_api::MediaFormat::Mp4));
        let args = &plan.args;

        assert!(args.contains(&"--no-playlist".to_string()));
        assert!(args.contains(&"--newline".to_string()));
        assert_eq!(
            value_after(args, "-o"),
            Some("/config/media/%(title)s.%(ext)s")
        );
        assert_eq!(value_after(args, "--cache-dir"), Some("/tmp/yt-dlp"));
        assert_eq!(value_after(args, "--socket-timeout"), Some("1800"));
        assert_eq!(
            value_after(args, "--extractor-args"),
            Some("youtube:player_client=default,web_safari,web_embedded")
        );
        assert_eq!(
            value_after(args, "--progress-template"),
            Some(core_api::PROGRESS_TEMPLATE)
        );
        assert!(args.contains(&"--restrict-filenames".to_string()));

        let n = args.len();
        assert_eq!(args[n - 2], "--");
        assert_eq!(args[n - 1], "https://www.youtube.com/watch?v=abc123");
    }

    #[test]
    fn options_follow_config() {
        let cfg = core_api::DownloadsConfig {
            download_dir: "/media/youtube_downloads".into(),
            ytdlp_bin: "/usr/local/bin/yt-dlp".into(),
            socket_timeout_secs: 60,
            ..core_api::DownloadsConfig::default()
        };
        let o = YtDlpOptions::from_config(&cfg);
        assert_eq!(o.bin, "/usr/local/bin/yt-dlp");
        assert_eq!(o.output_dir, PathBuf::from("/media/youtube_downloads"));
        assert_eq!(o.socket_timeout_secs, 60);
    }

    #[test]
    fn missing_absolute_executable_is_an_error() {
        let err = resolve_executable_path("/definitely/not/here/yt-dlp").unwrap_err();
        assert!(err.to_string().contains("executable not found"));
    }
}
