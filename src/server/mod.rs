//! Async TCP transport using Tokio.
//!
//! Accepts TCP connections, frames HTTP/1.1 requests off each one and hands
//! them to the [`Dispatcher`] one at a time per connection. Every connection
//! runs on its own task; persistent connections (keep-alive) and pipelined
//! requests are supported.

use std::future::Future;
use std::net::SocketAddr;
use std::sync::Arc;

use bytes::BytesMut;
use serde_json::json;
use thiserror::Error;
use tokio::io::{AsyncReadExt, AsyncWriteExt};
use tokio::net::{TcpListener, TcpStream};
use tracing::{debug, error, info, warn};

use crate::config::ServerConfig;
use crate::dispatch::Dispatcher;
use crate::http::{
    Method, StatusCode,
    request::{Request, RequestError},
    response::Response,
};
use crate::router::{IntoHandler, RouteTable};

/// Errors produced by the server.
#[derive(Debug, Error)]
pub enum ServerError {
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("failed to bind to {addr}: {source}")]
    Bind {
        addr: String,
        #[source]
        source: std::io::Error,
    },
}

/// Initial read buffer capacity per connection.
const INITIAL_BUF_SIZE: usize = 4096;

/// A server under construction: configuration plus the routes registered so far.
///
/// Routes are registered with `&mut self` before [`run`](Self::run) or
/// [`bind`](Self::bind); both consume the server, so the route table can no
/// longer change once requests are being served.
///
/// # Examples
///
/// ```rust,no_run
/// use nanoserver::{Context, NanoServer};
///
/// #[tokio::main]
/// async fn main() -> Result<(), Box<dyn std::error::Error>> {
///     let mut server = NanoServer::new(8080);
///     server.route("/", "GET", |ctx: Context| async move {
///         ctx.send_json_ok(&serde_json::json!({"message": "Hello from NanoServer!"}))
///     });
///     server.run().await?;
///     Ok(())
/// }
/// ```
pub struct NanoServer {
    config: ServerConfig,
    routes: RouteTable,
}

impl NanoServer {
    /// A server listening on `port` on all interfaces, with default settings.
    pub fn new(port: u16) -> Self {
        Self::with_config(ServerConfig::new(port))
    }

    pub fn with_config(config: ServerConfig) -> Self {
        Self {
            config,
            routes: RouteTable::new(),
        }
    }

    pub fn config(&self) -> &ServerConfig {
        &self.config
    }

    pub fn routes(&self) -> &RouteTable {
        &self.routes
    }

    /// Registers an exact route. See [`RouteTable::register`].
    pub fn route(
        &mut self,
        path: impl Into<String>,
        method: impl Into<Method>,
        handler: impl IntoHandler,
    ) -> &mut Self {
        self.routes.register(path, method, handler);
        self
    }

    /// Registers a pattern route. See [`RouteTable::register_pattern`].
    pub fn route_pattern(
        &mut self,
        pattern: &str,
        method: impl Into<Method>,
        handler: impl IntoHandler,
    ) -> &mut Self {
        self.routes.register_pattern(pattern, method, handler);
        self
    }

    pub fn get(&mut self, path: impl Into<String>, handler: impl IntoHandler) -> &mut Self {
        self.route(path, Method::Get, handler)
    }

    pub fn post(&mut self, path: impl Into<String>, handler: impl IntoHandler) -> &mut Self {
        self.route(path, Method::Post, handler)
    }

    pub fn put(&mut self, path: impl Into<String>, handler: impl IntoHandler) -> &mut Self {
        self.route(path, Method::Put, handler)
    }

    pub fn delete(&mut self, path: impl Into<String>, handler: impl IntoHandler) -> &mut Self {
        self.route(path, Method::Delete, handler)
    }

    pub fn patch(&mut self, path: impl Into<String>, handler: impl IntoHandler) -> &mut Self {
        self.route(path, Method::Patch, handler)
    }

    /// Binds the listening socket and freezes the route table.
    ///
    /// # Errors
    ///
    /// Returns [`ServerError::Bind`] if the address cannot be bound
    /// (e.g. port already in use, insufficient permissions).
    pub async fn bind(self) -> Result<BoundServer, ServerError> {
        let addr = self.config.bind_addr();
        let listener = TcpListener::bind(&addr)
            .await
            .map_err(|source| ServerError::Bind {
                addr: addr.clone(),
                source,
            })?;
        let local_addr = listener.local_addr()?;

        Ok(BoundServer {
            listener,
            local_addr,
            dispatcher: Arc::new(Dispatcher::new(
                Arc::new(self.routes),
                self.config.error_exposure,
            )),
            max_request_size: self.config.max_request_size,
        })
    }

    /// Binds and serves until the process is terminated.
    pub async fn run(self) -> Result<(), ServerError> {
        self.bind().await?.serve().await
    }
}

/// A bound server, ready to accept connections.
pub struct BoundServer {
    listener: TcpListener,
    local_addr: SocketAddr,
    dispatcher: Arc<Dispatcher>,
    max_request_size: usize,
}

impl BoundServer {
    /// Returns the local address the server is bound to.
    pub fn local_addr(&self) -> SocketAddr {
        self.local_addr
    }

    /// Accepts connections forever. Accept failures are logged and skipped.
    pub async fn serve(self) -> Result<(), ServerError> {
        self.serve_with_shutdown(std::future::pending()).await
    }

    /// Accepts connections until `signal` resolves.
    ///
    /// Stopping only closes the listener. Connections already accepted run
    /// to completion on their own tasks.
    pub async fn serve_with_shutdown<S>(self, signal: S) -> Result<(), ServerError>
    where
        S: Future<Output = ()> + Send,
    {
        info!(address = %self.local_addr, "nanoserver listening");
        tokio::pin!(signal);

        loop {
            let (stream, peer_addr) = tokio::select! {
                () = &mut signal => {
                    info!(address = %self.local_addr, "shutdown signal received, no longer accepting");
                    return Ok(());
                }
                accepted = self.listener.accept() => match accepted {
                    Ok(pair) => pair,
                    Err(e) => {
                        error!(error = %e, "failed to accept connection");
                        continue;
                    }
                },
            };

            debug!(peer = %peer_addr, "connection accepted");
            let dispatcher = Arc::clone(&self.dispatcher);
            let max_request_size = self.max_request_size;

            tokio::spawn(async move {
                if let Err(e) =
                    handle_connection(stream, peer_addr, dispatcher, max_request_size).await
                {
                    warn!(peer = %peer_addr, error = %e, "connection closed with error");
                }
            });
        }
    }
}

/// Handles a single TCP connection over its lifetime.
///
/// Every complete request already buffered is served before reading again,
/// so pipelined requests are answered in order. `max_request_size` bounds
/// the one request still being received, not the whole buffer. The loop ends
/// when the peer closes the connection, a request asks for
/// `Connection: close`, or the request cannot be framed.
async fn handle_connection(
    mut stream: TcpStream,
    peer_addr: SocketAddr,
    dispatcher: Arc<Dispatcher>,
    max_request_size: usize,
) -> Result<(), std::io::Error> {
    let mut buf = BytesMut::with_capacity(INITIAL_BUF_SIZE);

    loop {
        let bytes_read = stream.read_buf(&mut buf).await?;
        if bytes_read == 0 {
            if !buf.is_empty() {
                debug!(peer = %peer_addr, pending = buf.len(), "peer closed mid-request");
            }
            debug!(peer = %peer_addr, "connection closed by peer");
            return Ok(());
        }

        loop {
            let (request, consumed) = match Request::parse(&buf) {
                Ok((_, consumed)) if consumed > max_request_size => {
                    return reject_too_large(&mut stream, peer_addr, max_request_size).await;
                }
                Ok(pair) => pair,
                // Only the unfinished request is left in the buffer.
                Err(RequestError::Incomplete) if buf.len() > max_request_size => {
                    return reject_too_large(&mut stream, peer_addr, max_request_size).await;
                }
                Err(RequestError::Incomplete) => break,
                Err(e) => {
                    warn!(peer = %peer_addr, error = %e, "bad request, sending 400");
                    let response = framing_error(StatusCode::BadRequest, &e);
                    stream.write_all(&response.into_bytes()).await?;
                    return Ok(());
                }
            };
            let _ = buf.split_to(consumed);

            let keep_alive = request.is_keep_alive();
            let is_head = *request.method() == Method::Head;
            debug!(
                peer = %peer_addr,
                method = %request.method(),
                path = %request.path(),
                "dispatching request"
            );

            let mut response = dispatcher.dispatch(request).await.keep_alive(keep_alive);
            if is_head {
                response = response.head_only();
            }
            stream.write_all(&response.into_bytes()).await?;
            stream.flush().await?;

            if !keep_alive {
                debug!(peer = %peer_addr, "Connection: close, shutting down");
                stream.shutdown().await?;
                return Ok(());
            }
        }
    }
}

async fn reject_too_large(
    stream: &mut TcpStream,
    peer_addr: SocketAddr,
    max_request_size: usize,
) -> Result<(), std::io::Error> {
    let e = RequestError::BodyTooLarge {
        max_bytes: max_request_size,
    };
    warn!(peer = %peer_addr, error = %e, "request too large, sending 413");
    let response = framing_error(StatusCode::PayloadTooLarge, &e);
    stream.write_all(&response.into_bytes()).await
}

// JSON error response for requests that never reach the dispatcher.
fn framing_error(status: StatusCode, err: &RequestError) -> Response {
    Response::new(status)
        .header("Content-Type", "application/json")
        .body(json!({ "error": err.to_string() }).to_string())
        .keep_alive(false)
}
