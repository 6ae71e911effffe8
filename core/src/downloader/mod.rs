mod output;
mod pump;
mod traits;
mod types;

pub use output::{
    parse_output_line, summarize_failure, OutputLine, FILE_PREFIX, FILE_TEMPLATE,
    PROGRESS_PREFIX, PROGRESS_TEMPLATE, TITLE_PREFIX, TITLE_TEMPLATE,
};
pub use pump::{pump_lines, LineStream, LineTap};
pub use traits::{DownloadSession, DownloaderPlugin};
pub use types::{DownloadRequest, ExitOutcome, Signal};
