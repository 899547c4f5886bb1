//! Handler failure type.
//!
//! A handler returns `Err(HandlerError)` to fail a request. The dispatcher
//! turns every failure into a JSON `{"error": ...}` body. The status is
//! `500 Internal Server Error` unless the handler chose one explicitly with
//! [`HandlerError::with_status`].

use thiserror::Error;

use crate::context::WriterError;
use crate::http::StatusCode;

/// Result type returned by route handlers.
pub type HandlerResult = Result<(), HandlerError>;

/// Why a handler did not complete normally.
///
/// Only [`HandlerError::Status`] carries a status of its own; every other
/// variant is reported as a 500.
///
/// # Examples
///
/// ```
/// use nanoserver::{HandlerError, StatusCode};
///
/// let err = HandlerError::with_status(StatusCode::BadRequest, "Missing 'name' field");
/// assert_eq!(err.status(), StatusCode::BadRequest);
/// assert_eq!(err.to_string(), "Missing 'name' field");
///
/// let err = HandlerError::msg("database unavailable");
/// assert_eq!(err.status(), StatusCode::InternalServerError);
/// ```
#[derive(Debug, Error)]
pub enum HandlerError {
    /// A failure the handler wants reported with a specific status.
    #[error("{message}")]
    Status { status: StatusCode, message: String },

    /// The request body or a response value could not be (de)serialized.
    #[error(transparent)]
    Json(#[from] serde_json::Error),

    /// The response writer was driven out of order.
    #[error(transparent)]
    Writer(#[from] WriterError),

    #[error("{0}")]
    Message(String),

    #[error(transparent)]
    Other(Box<dyn std::error::Error + Send + Sync>),
}

impl HandlerError {
    pub fn msg(message: impl Into<String>) -> Self {
        Self::Message(message.into())
    }

    /// A failure reported to the client with `status` instead of 500.
    pub fn with_status(status: StatusCode, message: impl Into<String>) -> Self {
        Self::Status {
            status,
            message: message.into(),
        }
    }

    /// Wraps any error; its `Display` text becomes the failure message.
    pub fn other(err: impl std::error::Error + Send + Sync + 'static) -> Self {
        Self::Other(Box::new(err))
    }

    /// Status the dispatcher responds with for this failure.
    pub fn status(&self) -> StatusCode {
        match self {
            Self::Status { status, .. } => *status,
            _ => StatusCode::InternalServerError,
        }
    }
}

impl From<String> for HandlerError {
    fn from(message: String) -> Self {
        Self::Message(message)
    }
}

impl From<&str> for HandlerError {
    fn from(message: &str) -> Self {
        Self::Message(message.to_owned())
    }
}
