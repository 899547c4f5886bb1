//! Per-request context: inbound request data plus the response writer.
//!
//! A fresh [`Context`] is built by the dispatcher for every request and moved
//! into the matched handler. It is dropped when the handler finishes or fails.

use std::collections::HashMap;

use bytes::Bytes;
use serde::Serialize;
use serde::de::DeserializeOwned;

use crate::error::HandlerError;
use crate::http::{Headers, Method, Request, StatusCode};

mod writer;

pub use writer::{ResponseWriter, WriterError};

/// Values captured by a pattern route, e.g. `id` for `/items/:id`.
///
/// Empty for exact routes.
#[derive(Default, Debug, Clone, PartialEq, Eq)]
pub struct PathParams {
    map: HashMap<String, String>,
}

impl PathParams {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn insert(&mut self, key: impl Into<String>, value: impl Into<String>) {
        self.map.insert(key.into(), value.into());
    }

    pub fn get(&self, key: &str) -> Option<&str> {
        self.map.get(key).map(String::as_str)
    }

    pub fn len(&self) -> usize {
        self.map.len()
    }

    pub fn is_empty(&self) -> bool {
        self.map.is_empty()
    }
}

/// What a handler sees of one request.
///
/// # Examples
///
/// ```rust,no_run
/// use nanoserver::{Context, HandlerResult, StatusCode};
/// use serde::Deserialize;
///
/// #[derive(Deserialize)]
/// struct NewItem {
///     name: String,
/// }
///
/// async fn create(ctx: Context) -> HandlerResult {
///     let item: NewItem = ctx.json()?;
///     ctx.send_json(&serde_json::json!({ "name": item.name }), StatusCode::Created)
/// }
/// ```
#[derive(Debug)]
pub struct Context {
    request: Request,
    params: PathParams,
    response: ResponseWriter,
}

impl Context {
    pub fn new(request: Request, params: PathParams, response: ResponseWriter) -> Self {
        Self {
            request,
            params,
            response,
        }
    }

    pub fn request(&self) -> &Request {
        &self.request
    }

    pub fn path(&self) -> &str {
        self.request.path()
    }

    pub fn method(&self) -> &Method {
        self.request.method()
    }

    pub fn headers(&self) -> &Headers {
        self.request.headers()
    }

    /// Returns a request header value; `name` is matched case-insensitively.
    pub fn header(&self, name: &str) -> Option<&str> {
        self.request.headers().get(name)
    }

    pub fn body(&self) -> &Bytes {
        self.request.body()
    }

    pub fn query_param(&self, key: &str) -> Option<&str> {
        self.request.query_param(key)
    }

    /// Returns a value captured by the matched pattern route.
    pub fn param(&self, name: &str) -> Option<&str> {
        self.params.get(name)
    }

    pub fn params(&self) -> &PathParams {
        &self.params
    }

    /// Deserializes the request body as JSON.
    pub fn json<T>(&self) -> Result<T, serde_json::Error>
    where
        T: DeserializeOwned,
    {
        serde_json::from_slice(self.request.body())
    }

    pub fn response(&self) -> &ResponseWriter {
        &self.response
    }

    /// See [`ResponseWriter::send_json`].
    pub fn send_json<T>(&self, data: &T, status: StatusCode) -> Result<(), HandlerError>
    where
        T: Serialize + ?Sized,
    {
        self.response.send_json(data, status)
    }

    /// [`send_json`](Self::send_json) with `200 OK`.
    pub fn send_json_ok<T>(&self, data: &T) -> Result<(), HandlerError>
    where
        T: Serialize + ?Sized,
    {
        self.response.send_json(data, StatusCode::Ok)
    }

    pub fn send_status(&self, status: StatusCode) -> Result<(), WriterError> {
        self.response.send_status(status)
    }

    pub fn send_header(
        &self,
        name: impl Into<String>,
        value: impl Into<String>,
    ) -> Result<(), WriterError> {
        self.response.send_header(name, value)
    }

    pub fn write_body(&self, bytes: impl AsRef<[u8]>) -> Result<(), WriterError> {
        self.response.write_body(bytes)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde::Deserialize;

    fn context(raw: &[u8]) -> Context {
        let (request, _) = Request::parse(raw).unwrap();
        let mut params = PathParams::new();
        params.insert("id", "42");
        Context::new(request, params, ResponseWriter::new())
    }

    #[derive(Debug, Deserialize, PartialEq)]
    struct NewItem {
        name: String,
    }

    #[test]
    fn exposes_request_data() {
        let ctx = context(b"PUT /items/42?x=1 HTTP/1.1\r\nX-Trace: abc\r\n\r\n");
        assert_eq!(ctx.path(), "/items/42");
        assert_eq!(ctx.method(), &Method::Put);
        assert_eq!(ctx.header("x-trace"), Some("abc"));
        assert_eq!(ctx.query_param("x"), Some("1"));
        assert_eq!(ctx.param("id"), Some("42"));
        assert_eq!(ctx.param("missing"), None);
    }

    #[test]
    fn decodes_json_body() {
        let ctx = context(
            b"POST /items HTTP/1.1\r\nContent-Length: 14\r\n\r\n{\"name\":\"pen\"}",
        );
        let item: NewItem = ctx.json().unwrap();
        assert_eq!(item, NewItem { name: "pen".to_owned() });
    }

    #[test]
    fn invalid_json_body_is_an_error() {
        let ctx = context(b"POST /items HTTP/1.1\r\nContent-Length: 2\r\n\r\n{}");
        assert!(ctx.json::<NewItem>().is_err());
    }

    #[test]
    fn send_json_ok_defaults_to_200() {
        let ctx = context(b"GET / HTTP/1.1\r\n\r\n");
        ctx.send_json_ok(&serde_json::json!({"ok": true})).unwrap();
        let response = ctx.response().take().unwrap();
        assert_eq!(response.status(), StatusCode::Ok);
    }
}
