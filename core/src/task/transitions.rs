//! 任务状态转换规则

use super::types::TaskStatus;
use thiserror::Error;

/// 状态转换错误
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum TransitionError {
    #[error("Invalid transition from {from} to {to}")]
    InvalidTransition { from: TaskStatus, to: TaskStatus },
    #[error("Cannot transition from terminal state {state}")]
    FromTerminalState { state: TaskStatus },
}

/// 状态转换
pub struct TaskTransition;

impl TaskTransition {
    /// 验证状态转换是否合法
    pub fn validate(from: TaskStatus, to: TaskStatus) -> Result<(), TransitionError> {
        // 终态不能转换
        if from.is_terminal() {
            return Err(TransitionError::FromTerminalState { state: from });
        }

        let is_valid = match (from, to) {
            (TaskStatus::Queued, TaskStatus::Running) => true,

            // 排队中就失败（例如进程无法启动）或被取消
            (TaskStatus::Queued, TaskStatus::Error | TaskStatus::Cancelled) => true,

            // 运行中的进度/标题更新
            (TaskStatus::Running, TaskStatus::Running) => true,

            (TaskStatus::Running, TaskStatus::Completed)
            | (TaskStatus::Running, TaskStatus::Error)
            | (TaskStatus::Running, TaskStatus::Cancelled) => true,

            _ => false,
        };

        if is_valid {
            Ok(())
        } else {
            Err(TransitionError::InvalidTransition { from, to })
        }
    }
}
