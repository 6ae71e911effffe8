use thiserror::Error;

use crate::task::{TaskStatus, TransitionError};

/// Stable machine-readable codes returned in HTTP error bodies.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorCode {
    InvalidRequest,
    PlaylistNotAllowed,
    NotFound,
    Conflict,
    Internal,
}

impl ErrorCode {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::InvalidRequest => "INVALID_REQUEST",
            Self::PlaylistNotAllowed => "PLAYLIST_NOT_ALLOWED",
            Self::NotFound => "NOT_FOUND",
            Self::Conflict => "CONFLICT",
            Self::Internal => "INTERNAL_ERROR",
        }
    }
}

/// Rejections raised before a task exists.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum ValidationError {
    #[error("url is required")]
    MissingUrl,
    #[error("invalid url")]
    InvalidUrl,
    #[error(
        "Playlist URLs are not allowed. Use a single video URL (e.g. youtube.com/watch?v=...)."
    )]
    PlaylistNotAllowed,
    #[error("invalid request body: {0}")]
    MalformedBody(String),
}

impl ValidationError {
    pub fn error_code(&self) -> ErrorCode {
        match self {
            Self::PlaylistNotAllowed => ErrorCode::PlaylistNotAllowed,
            _ => ErrorCode::InvalidRequest,
        }
    }
}

#[derive(Error, Debug)]
pub enum StoreError {
    #[error("task not found")]
    NotFound(String),
    #[error("task id already exists: {0}")]
    Duplicate(String),
    #[error(transparent)]
    Transition(#[from] TransitionError),
}

impl StoreError {
    pub fn error_code(&self) -> ErrorCode {
        match self {
            Self::NotFound(_) => ErrorCode::NotFound,
            Self::Duplicate(_) | Self::Transition(_) => ErrorCode::Conflict,
        }
    }

    /// Status of the task when a transition was refused because it had already finished.
    pub fn terminal_status(&self) -> Option<TaskStatus> {
        match self {
            Self::Transition(TransitionError::FromTerminalState { state }) => Some(*state),
            _ => None,
        }
    }
}

#[derive(Error, Debug)]
pub enum DispatchError {
    #[error(transparent)]
    Validation(#[from] ValidationError),
    #[error(transparent)]
    Store(#[from] StoreError),
}

impl DispatchError {
    pub fn error_code(&self) -> ErrorCode {
        match self {
            Self::Validation(e) => e.error_code(),
            Self::Store(e) => e.error_code(),
        }
    }
}
