//! # nanoserver
//!
//! A minimal HTTP/1.1 routing micro-framework: a route table keyed by
//! (path, method), a per-request context with a JSON response helper, and a
//! dispatcher that turns every handler failure into a JSON error response.
//!
//! ## Quick Start
//!
//! ```rust,no_run
//! use nanoserver::{Context, HandlerResult, NanoServer, StatusCode};
//! use serde_json::json;
//!
//! async fn hello(ctx: Context) -> HandlerResult {
//!     ctx.send_json_ok(&json!({"message": "Hello from NanoServer!"}))
//! }
//!
//! async fn show_item(ctx: Context) -> HandlerResult {
//!     let id = ctx.param("id").unwrap_or_default();
//!     ctx.send_json(&json!({"id": id}), StatusCode::Ok)
//! }
//!
//! #[tokio::main]
//! async fn main() -> Result<(), Box<dyn std::error::Error>> {
//!     let mut server = NanoServer::new(8080);
//!     server.get("/", hello);
//!     server.route_pattern("/items/:id", "GET", show_item);
//!     server.run().await?;
//!     Ok(())
//! }
//! ```
//!
//! ## Responses produced by the framework itself
//!
//! - `404 {"error": "Not Found"}` when no route matches.
//! - `500 {"error": <message>}` when a handler fails or panics, unless the
//!   handler returned [`HandlerError::with_status`].
//! - `400` / `413` for requests that cannot be framed or are too large.
//!
//! Everything else is written by handlers through their [`Context`].

pub mod config;
pub mod context;
pub mod dispatch;
pub mod error;
pub mod http;
pub mod router;
pub mod server;

// ── Convenience re-exports ────────────────────────────────────────────────────
pub use config::{ConfigError, ErrorExposure, ServerConfig};
pub use context::{Context, PathParams, ResponseWriter, WriterError};
pub use dispatch::Dispatcher;
pub use error::{HandlerError, HandlerResult};
pub use http::{Headers, Method, Request, Response, StatusCode};
pub use router::{IntoHandler, RouteKey, RouteTable};
pub use server::{BoundServer, NanoServer, ServerError};
