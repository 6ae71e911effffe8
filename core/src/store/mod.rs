//! # 任务存储
//!
//! 任务记录的唯一所有者。创建由 Dispatcher 完成，状态推进由下载会话或取消请求完成。

mod registry;
mod retention;

pub use registry::{CancelOutcome, StatusCounts, TaskEvent, TaskStore};
pub use retention::spawn_retention_sweeper;
