//! Stable re-exports for consumers (`cli`, `plugins`, and external crates).
//!
//! Prefer importing from `tubefetch_core::api` instead of reaching into internal modules.

pub use crate::config::{
    load_default, AppConfig, ClientConfig, DownloadsConfig, HttpServerConfig, LoggingConfig,
    TasksConfig,
};
pub use crate::dispatcher::{Dispatcher, DispatcherSettings};
pub use crate::downloader::{
    DownloadRequest, DownloadSession, DownloaderPlugin, ExitOutcome, Signal, FILE_TEMPLATE,
    PROGRESS_TEMPLATE, TITLE_TEMPLATE,
};
pub use crate::error::{
    ConfigError, DispatchError, DownloadError, ErrorCode, StoreError, ValidationError,
};
pub use crate::input::{is_youtube_watch_url, normalize_url};
pub use crate::poller::{
    PollerEffect, PollerEvent, PollerMachine, PollerPhase, RemoteStatus, RemoteTask,
    DEFAULT_POLL_INTERVAL,
};
pub use crate::store::{spawn_retention_sweeper, CancelOutcome, StatusCounts, TaskEvent, TaskStore};
pub use crate::task::{MediaFormat, Task, TaskStatus};
