mod machine;
mod remote;

pub use machine::{PollerEffect, PollerEvent, PollerMachine, PollerPhase, DEFAULT_POLL_INTERVAL};
pub use remote::{RemoteStatus, RemoteTask};
