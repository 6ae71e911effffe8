mod remote;

pub use remote::{ApiClientError, ApiClientErrorKind, CancelReply, SubmitAccepted, TaskApiClient};
