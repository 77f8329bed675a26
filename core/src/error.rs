//! Error types for the datasource API client and store.
//!
//! # Design
//! `ApiError` keeps the three failure families apart (transport, HTTP
//! status, decode) plus the outgoing-serialization case. The `Display` text of
//! a `Status` error is exactly the message the backend supplied in `detail`,
//! or `API error: <status>` when it supplied none, so that text can be shown
//! to a user unchanged.
//!
//! `StoreError` is what the store records after absorbing a failure: the
//! message plus an `ErrorKind` tag consumers can branch on.

use std::fmt;

use thiserror::Error;

/// Errors returned by `DatasourceClient` and `DatasourceApi`.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ApiError {
    /// The request never produced an HTTP response (connection refused, DNS,
    /// I/O, or the blocking worker died).
    #[error("{0}")]
    Transport(String),

    /// The server answered with a non-2xx status.
    #[error("{message}")]
    Status { status: u16, message: String },

    /// A success response carried a body that is not the expected JSON.
    #[error("failed to decode response: {0}")]
    Decode(String),

    /// The request payload could not be serialized to JSON.
    #[error("failed to serialize request: {0}")]
    Serialization(String),
}

impl ApiError {
    /// Build a `Status` error from the status code and the optional `detail`
    /// field of the error body.
    pub fn status(status: u16, detail: Option<&str>) -> Self {
        let message = match detail {
            Some(detail) if !detail.is_empty() => detail.to_string(),
            _ => format!("API error: {status}"),
        };
        ApiError::Status { status, message }
    }

    pub fn kind(&self) -> ErrorKind {
        match self {
            ApiError::Transport(_) => ErrorKind::Transport,
            ApiError::Status { .. } => ErrorKind::Status,
            ApiError::Decode(_) => ErrorKind::Decode,
            ApiError::Serialization(_) => ErrorKind::Serialization,
        }
    }

    /// HTTP status code, if the failure came from a response.
    pub fn status_code(&self) -> Option<u16> {
        match self {
            ApiError::Status { status, .. } => Some(*status),
            _ => None,
        }
    }
}

/// Failure category of a recorded store error.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ErrorKind {
    Transport,
    Status,
    Decode,
    Serialization,
}

impl ErrorKind {
    pub fn as_str(self) -> &'static str {
        match self {
            ErrorKind::Transport => "transport",
            ErrorKind::Status => "status",
            ErrorKind::Decode => "decode",
            ErrorKind::Serialization => "serialization",
        }
    }
}

impl fmt::Display for ErrorKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// The last failure absorbed by `DatasourceStore`.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("{message}")]
pub struct StoreError {
    pub kind: ErrorKind,
    pub message: String,
}

impl From<&ApiError> for StoreError {
    fn from(err: &ApiError) -> Self {
        StoreError {
            kind: err.kind(),
            message: err.to_string(),
        }
    }
}

impl From<ApiError> for StoreError {
    fn from(err: ApiError) -> Self {
        StoreError::from(&err)
    }
}
