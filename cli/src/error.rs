use thiserror::Error;

use crate::http::client::ApiClientError;

#[derive(Error, Debug)]
pub enum CliError {
    #[error("config error: {0}")]
    Config(String),
    #[error("io error: {0}")]
    Io(#[from] std::io::Error),
    #[error("server error: {0}")]
    Server(String),
    #[error("{0}")]
    Client(#[from] ApiClientError),
    #[error("{0}")]
    Command(String),
    #[error(transparent)]
    Anyhow(#[from] anyhow::Error),
}
