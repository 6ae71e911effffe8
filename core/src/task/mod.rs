pub mod transitions;
pub mod types;

pub use transitions::{TaskTransition, TransitionError};
pub use types::{MediaFormat, Task, TaskStatus};
