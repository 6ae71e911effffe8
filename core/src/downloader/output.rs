//! Parsing of the downloader's stdout and stderr.
//!
//! The yt-dlp plugin prints progress, title and final path with fixed
//! prefixes (see `PROGRESS_TEMPLATE`, `TITLE_TEMPLATE`, `FILE_TEMPLATE`),
//! so one parser serves every session.

use std::sync::OnceLock;

use regex::Regex;

pub const PROGRESS_PREFIX: &str = "[progress]";
pub const TITLE_PREFIX: &str = "[title] ";
pub const FILE_PREFIX: &str = "[file] ";

/// `--progress-template` value. yt-dlp consumes the leading `download:` as the
/// progress type, so lines arrive as `[progress]  42.0%`.
pub const PROGRESS_TEMPLATE: &str = "download:[progress] %(progress._percent_str)s";
/// `--print` value emitted once metadata is known, before the download starts.
pub const TITLE_TEMPLATE: &str = "before_dl:[title] %(title)s";
/// `--print` value emitted after post-processing moved the file into place.
pub const FILE_TEMPLATE: &str = "after_move:[file] %(filepath)s";

const STDERR_SUMMARY_LINES: usize = 20;

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum OutputLine {
    Progress(u8),
    Title(String),
    File(String),
    Other,
}

fn percent_re() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| Regex::new(r"(\d{1,3}(?:\.\d+)?)\s*%").expect("static regex"))
}

/// A line that is nothing but a percentage, e.g. `  45.2%`.
fn bare_percent_re() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| Regex::new(r"^(\d{1,3}(?:\.\d+)?)\s*%$").expect("static regex"))
}

pub fn parse_output_line(line: &str) -> OutputLine {
    let trimmed = line.trim_end();

    if let Some(title) = trimmed.strip_prefix(TITLE_PREFIX) {
        let title = title.trim();
        return if title.is_empty() || title == "NA" {
            OutputLine::Other
        } else {
            OutputLine::Title(title.to_string())
        };
    }

    if let Some(path) = trimmed.strip_prefix(FILE_PREFIX) {
        let path = path.trim();
        return if path.is_empty() || path == "NA" {
            OutputLine::Other
        } else {
            OutputLine::File(path.to_string())
        };
    }

    let body = trimmed.trim_start();
    if let Some(rest) = body.strip_prefix(PROGRESS_PREFIX) {
        return parse_percent(rest)
            .map(OutputLine::Progress)
            .unwrap_or(OutputLine::Other);
    }
    // Default progress output: "[download]  45.2% of 10.00MiB at ..."
    if let Some(rest) = body.strip_prefix("[download]") {
        return parse_percent(rest)
            .map(OutputLine::Progress)
            .unwrap_or(OutputLine::Other);
    }
    // Older templates without a marker print only the percent string.
    if bare_percent_re().is_match(body) {
        return parse_percent(body)
            .map(OutputLine::Progress)
            .unwrap_or(OutputLine::Other);
    }

    OutputLine::Other
}

fn parse_percent(s: &str) -> Option<u8> {
    let caps = percent_re().captures(s)?;
    let pct: f64 = caps.get(1)?.as_str().parse().ok()?;
    if !(0.0..=100.0).contains(&pct) {
        return None;
    }
    Some(pct.floor() as u8)
}

/// Message recorded on a failed task: the last `ERROR:` line if any, otherwise
/// the tail of stderr, otherwise the exit code.
pub fn summarize_failure(stderr: &str, exit_code: i32) -> String {
    let lines: Vec<&str> = stderr
        .lines()
        .map(str::trim)
        .filter(|l| !l.is_empty())
        .collect();

    if let Some(err) = lines.iter().rev().find(|l| l.starts_with("ERROR:")) {
        return err.to_string();
    }

    if lines.is_empty() {
        return format!("yt-dlp exited with code {exit_code}");
    }

    let start = lines.len().saturating_sub(STDERR_SUMMARY_LINES);
    lines[start..].join("\n")
}
