//! Request dispatch: route lookup, failure isolation and JSON error mapping.
//!
//! Every request yields exactly one [`Response`]:
//!
//! | Outcome                                  | Status | Body                                      |
//! |------------------------------------------|--------|-------------------------------------------|
//! | no route for (path, method)              | 404    | `{"error": "Not Found"}`                  |
//! | handler returned `Ok` after responding   | as written | as written                              |
//! | handler returned `Ok` without responding | 500    | `{"error": "handler produced no response"}` |
//! | handler returned `Err(e)`                | `e.status()` (500 unless overridden) | `{"error": e.to_string()}` |
//! | handler panicked                         | 500    | `{"error": <panic message>}`              |
//!
//! On failure anything the handler wrote is thrown away first.

use std::any::Any;
use std::sync::Arc;

use serde_json::json;
use tokio::task::JoinError;
use tracing::{debug, error, warn};

use crate::config::ErrorExposure;
use crate::context::{Context, ResponseWriter};
use crate::http::{Request, Response, StatusCode};
use crate::router::{RouteMatch, RouteTable};

/// Body message for unmatched routes.
pub const NOT_FOUND_MESSAGE: &str = "Not Found";

/// Body message when a handler finishes without writing a response.
pub const NO_RESPONSE_MESSAGE: &str = "handler produced no response";

/// Client-facing message for 5xx failures under [`ErrorExposure::Generic`].
pub const GENERIC_MESSAGE: &str = "Internal Server Error";

/// Resolves requests against a [`RouteTable`] and runs the matched handler.
///
/// # Examples
///
/// ```rust
/// use std::sync::Arc;
/// use nanoserver::{
///     Context, Dispatcher, ErrorExposure, HandlerError, HandlerResult, Request, RouteTable,
///     StatusCode,
/// };
///
/// async fn boom(_ctx: Context) -> HandlerResult {
///     Err(HandlerError::msg("boom"))
/// }
///
/// # #[tokio::main] async fn main() {
/// let mut routes = RouteTable::new();
/// routes.get("/boom", boom);
/// let dispatcher = Dispatcher::new(Arc::new(routes), ErrorExposure::Detailed);
///
/// let (request, _) = Request::parse(b"GET /boom HTTP/1.1\r\n\r\n").unwrap();
/// let response = dispatcher.dispatch(request).await;
/// assert_eq!(response.status(), StatusCode::InternalServerError);
/// assert_eq!(response.payload(), br#"{"error":"boom"}"#);
/// # }
/// ```
#[derive(Clone)]
pub struct Dispatcher {
    routes: Arc<RouteTable>,
    exposure: ErrorExposure,
}

impl Dispatcher {
    pub fn new(routes: Arc<RouteTable>, exposure: ErrorExposure) -> Self {
        Self { routes, exposure }
    }

    /// Handles one request and returns the response to send.
    ///
    /// The handler runs on its own Tokio task, so a panic inside it is
    /// contained here and reported like any other failure.
    pub async fn dispatch(&self, request: Request) -> Response {
        let writer = ResponseWriter::new();

        let Some(RouteMatch { handler, params }) =
            self.routes.lookup(request.target(), request.method())
        else {
            return error_response(&writer, StatusCode::NotFound, NOT_FOUND_MESSAGE);
        };

        let method = request.method().clone();
        let path = request.path().to_owned();
        let ctx = Context::new(request, params, writer.clone());

        let failure = match tokio::spawn(handler(ctx)).await {
            Ok(Ok(())) => match writer.take() {
                Some(response) => {
                    debug!(%method, %path, status = response.status().as_u16(), "request handled");
                    return response;
                }
                None => {
                    warn!(%method, %path, "handler finished without writing a response");
                    (StatusCode::InternalServerError, NO_RESPONSE_MESSAGE.to_owned())
                }
            },
            Ok(Err(err)) => {
                let status = err.status();
                if status.is_server_error() {
                    error!(%method, %path, status = status.as_u16(), error = %err, "handler failed");
                } else {
                    debug!(%method, %path, status = status.as_u16(), error = %err, "handler rejected request");
                }
                (status, err.to_string())
            }
            Err(join_err) => {
                let message = join_failure_message(join_err);
                error!(%method, %path, error = %message, "handler panicked");
                (StatusCode::InternalServerError, message)
            }
        };

        let (status, detail) = failure;
        error_response(&writer, status, self.client_message(status, &detail))
    }

    // Applies the exposure policy to a failure message.
    fn client_message<'a>(&self, status: StatusCode, detail: &'a str) -> &'a str {
        match self.exposure {
            ErrorExposure::Generic if status.is_server_error() => GENERIC_MESSAGE,
            _ => detail,
        }
    }
}

// Replaces whatever `writer` holds with `{"error": message}`.
fn error_response(writer: &ResponseWriter, status: StatusCode, message: &str) -> Response {
    writer.discard();
    if let Err(err) = writer.send_json(&json!({ "error": message }), status) {
        error!(error = %err, "failed to write error response");
    }
    writer.take().unwrap_or_else(|| Response::new(status))
}

fn join_failure_message(err: JoinError) -> String {
    if !err.is_panic() {
        return "handler task was cancelled".to_owned();
    }
    panic_message(err.into_panic().as_ref())
}

fn panic_message(payload: &(dyn Any + Send)) -> String {
    if let Some(message) = payload.downcast_ref::<&str>() {
        (*message).to_owned()
    } else if let Some(message) = payload.downcast_ref::<String>() {
        message.clone()
    } else {
        "handler panicked".to_owned()
    }
}
