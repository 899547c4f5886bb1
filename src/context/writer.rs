//! Buffered response writer handed to handlers through their [`Context`].
//!
//! Writes are collected in memory and only reach the socket after the
//! handler finishes, so a failing handler's partial output can be dropped
//! and replaced by an error response.
//!
//! [`Context`]: super::Context

use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

use serde::Serialize;
use thiserror::Error;

use crate::error::HandlerError;
use crate::http::{Headers, Response, StatusCode};

/// Misuse of the response writer's status → headers → body ordering.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum WriterError {
    #[error("response status already sent ({0})")]
    StatusAlreadySent(StatusCode),

    #[error("header {0:?} sent before the response status")]
    HeaderBeforeStatus(String),

    #[error("header {0:?} sent after the response body started")]
    HeaderAfterBody(String),

    #[error("response body written before the response status")]
    BodyBeforeStatus,
}

#[derive(Debug, Default)]
struct Pending {
    status: Option<StatusCode>,
    headers: Headers,
    body: Vec<u8>,
    body_started: bool,
}

/// The response half of a request context.
///
/// Cloning is cheap and every clone writes into the same response. The
/// dispatcher keeps one clone to collect the result once the handler is done.
///
/// # Examples
///
/// ```
/// use nanoserver::StatusCode;
/// use nanoserver::context::ResponseWriter;
///
/// let writer = ResponseWriter::new();
/// writer.send_status(StatusCode::Ok).unwrap();
/// writer.send_header("Content-Type", "text/csv").unwrap();
/// writer.write_body("id,name\n").unwrap();
/// writer.write_body("1,pen\n").unwrap();
///
/// // A second status line is refused rather than written twice.
/// assert!(writer.send_status(StatusCode::Ok).is_err());
/// ```
#[derive(Debug, Clone, Default)]
pub struct ResponseWriter {
    pending: Arc<Mutex<Pending>>,
}

impl ResponseWriter {
    pub fn new() -> Self {
        Self::default()
    }

    // Nothing panics while the lock is held, so a poisoned lock still holds
    // consistent data.
    fn pending(&self) -> MutexGuard<'_, Pending> {
        self.pending.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Starts the response with `status`.
    ///
    /// # Errors
    ///
    /// [`WriterError::StatusAlreadySent`] if a status was already sent.
    pub fn send_status(&self, status: StatusCode) -> Result<(), WriterError> {
        let mut pending = self.pending();
        if let Some(sent) = pending.status {
            return Err(WriterError::StatusAlreadySent(sent));
        }
        pending.status = Some(status);
        Ok(())
    }

    /// Queues a response header.
    ///
    /// # Errors
    ///
    /// Fails if no status was sent yet, or if body bytes were already written.
    pub fn send_header(
        &self,
        name: impl Into<String>,
        value: impl Into<String>,
    ) -> Result<(), WriterError> {
        let name = name.into();
        let mut pending = self.pending();
        if pending.status.is_none() {
            return Err(WriterError::HeaderBeforeStatus(name));
        }
        if pending.body_started {
            return Err(WriterError::HeaderAfterBody(name));
        }
        pending.headers.insert(name, value);
        Ok(())
    }

    /// Appends raw bytes to the body. Ends the header section.
    pub fn write_body(&self, bytes: impl AsRef<[u8]>) -> Result<(), WriterError> {
        let mut pending = self.pending();
        if pending.status.is_none() {
            return Err(WriterError::BodyBeforeStatus);
        }
        pending.body_started = true;
        pending.body.extend_from_slice(bytes.as_ref());
        Ok(())
    }

    /// Sends `data` as a JSON body with `status` and `Content-Type: application/json`.
    ///
    /// `data` is serialized before anything is written, so a serialization
    /// failure leaves the response untouched.
    ///
    /// # Errors
    ///
    /// [`HandlerError::Json`] if `data` cannot be serialized, or
    /// [`HandlerError::Writer`] if a response was already started.
    pub fn send_json<T>(&self, data: &T, status: StatusCode) -> Result<(), HandlerError>
    where
        T: Serialize + ?Sized,
    {
        let body = serde_json::to_vec(data)?;
        self.send_status(status)?;
        self.send_header("Content-Type", "application/json")?;
        self.write_body(body)?;
        Ok(())
    }

    /// Returns `true` once a status has been sent.
    pub fn is_started(&self) -> bool {
        self.pending().status.is_some()
    }

    /// Takes the collected response, leaving the writer empty.
    ///
    /// Returns `None` if no status was ever sent.
    pub(crate) fn take(&self) -> Option<Response> {
        let pending = std::mem::take(&mut *self.pending());
        let status = pending.status?;
        Some(Response::from_parts(status, pending.headers, pending.body))
    }

    /// Drops anything written so far.
    pub(crate) fn discard(&self) {
        *self.pending() = Pending::default();
    }
}
