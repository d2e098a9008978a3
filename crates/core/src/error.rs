//! Collaborator errors and the user-facing notification they turn into.

use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Failure talking to the registrar backend.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum ApiError {
    /// The request never produced a response (connect, timeout, TLS...).
    #[error("network error: {0}")]
    Network(String),
    /// The backend answered with a status the caller does not handle.
    #[error("server returned {status}: {body}")]
    Server {
        /// HTTP status code.
        status: u16,
        /// Response body, possibly empty.
        body: String,
    },
    /// The response body did not have the expected shape.
    #[error("malformed response: {0}")]
    Decode(String),
}

impl From<reqwest::Error> for ApiError {
    fn from(err: reqwest::Error) -> Self {
        if err.is_decode() {
            ApiError::Decode(err.to_string())
        } else if let Some(status) = err.status() {
            ApiError::Server {
                status: status.as_u16(),
                body: err.to_string(),
            }
        } else {
            ApiError::Network(err.to_string())
        }
    }
}

/// Result alias for collaborator calls.
pub type ApiResult<T> = Result<T, ApiError>;

/// Category of a user-facing notification.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum NotificationKind {
    /// Duplicate course or time overlap, detected locally.
    ValidationConflict,
    /// The backend confirmed a prerequisite is not met.
    PrerequisiteRejected,
    /// The backend answered with an unexpected status or body.
    ServerError,
    /// The request failed before a response arrived.
    NetworkError,
    /// The backend rejected a cart save with its own message.
    SaveRejected,
    /// Informational, e.g. a successful save.
    Info,
}

impl NotificationKind {
    /// Errors are shown with the danger colour and block the modal.
    pub fn is_error(self) -> bool {
        !matches!(self, NotificationKind::Info)
    }
}

/// Header plus message shown to the student.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Notification {
    /// Category.
    pub kind: NotificationKind,
    /// Short title.
    pub header: String,
    /// Body text.
    pub message: String,
}

impl Notification {
    /// Build a notification of any kind.
    pub fn new(kind: NotificationKind, header: impl Into<String>, message: impl Into<String>) -> Self {
        Self {
            kind,
            header: header.into(),
            message: message.into(),
        }
    }

    /// Informational notification.
    pub fn info(header: impl Into<String>, message: impl Into<String>) -> Self {
        Self::new(NotificationKind::Info, header, message)
    }

    /// Map a collaborator failure onto a notification with the given header.
    pub fn from_api_error(header: impl Into<String>, err: &ApiError) -> Self {
        match err {
            ApiError::Network(detail) => Self::new(
                NotificationKind::NetworkError,
                header,
                format!("Could not reach the registrar: {detail}"),
            ),
            ApiError::Server { status, .. } => Self::new(
                NotificationKind::ServerError,
                header,
                format!("The registrar returned an error (HTTP {status}). Please try again."),
            ),
            ApiError::Decode(detail) => Self::new(
                NotificationKind::ServerError,
                header,
                format!("The registrar sent an unexpected response: {detail}"),
            ),
        }
    }
}
