//! Input Validation Module
//!
//! Turns a user-supplied URL into the exact single-video URL handed to the
//! downloader, or rejects it before any task is created.

mod url;

pub use self::url::{is_youtube_watch_url, normalize_url};
