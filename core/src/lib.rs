//! Task lifecycle core for tubefetch: URL policy, task store, download
//! dispatcher, downloader plugin seam and the client poller state machine.

pub mod api;
pub mod config;
pub mod dispatcher;
pub mod downloader;
pub mod error;
pub mod input;
pub mod poller;
pub mod store;
pub mod task;
pub mod util;
