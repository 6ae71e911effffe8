#[allow(clippy::module_inception)]
pub mod error;
pub mod task;

pub use error::{ConfigError, DownloadError};
pub use task::{DispatchError, ErrorCode, StoreError, ValidationError};
