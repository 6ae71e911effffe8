//! # 下载调度器
//!
//! 校验 URL、创建任务、异步启动外部下载进程并立即返回任务 id。

mod dispatch;
mod session;

pub use dispatch::{Dispatcher, DispatcherSettings};
pub use session::{run_download_session, DownloadSessionInput, SessionOutcome};
