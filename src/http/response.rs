//! HTTP/1.1 response builder and serializer.

use bytes::{BufMut, BytesMut};

use super::{Headers, StatusCode};

/// An HTTP/1.1 response, ready to be serialized and sent.
///
/// Handlers do not build these directly; the dispatcher assembles one from
/// whatever the handler wrote through its
/// [`ResponseWriter`](crate::context::ResponseWriter). The transport also
/// builds a few itself for framing errors.
///
/// # Examples
///
/// ```
/// use nanoserver::http::{Response, StatusCode};
///
/// let response = Response::new(StatusCode::Created)
///     .header("Content-Type", "application/json")
///     .body(r#"{"id":3}"#);
///
/// let bytes = response.into_bytes();
/// let text = std::str::from_utf8(&bytes).unwrap();
/// assert!(text.starts_with("HTTP/1.1 201 Created\r\n"));
/// assert!(text.contains("Content-Length: 8\r\n"));
/// ```
#[derive(Debug, Clone)]
pub struct Response {
    status: StatusCode,
    headers: Headers,
    body: Vec<u8>,
    keep_alive: bool,
    head_only: bool,
}

impl Response {
    /// Creates a new response with the given status and an empty body.
    pub fn new(status: StatusCode) -> Self {
        Self {
            status,
            headers: Headers::new(),
            body: Vec::new(),
            keep_alive: true,
            head_only: false,
        }
    }

    /// Assembles a response from already collected parts.
    pub fn from_parts(status: StatusCode, headers: Headers, body: Vec<u8>) -> Self {
        Self {
            status,
            headers,
            body,
            keep_alive: true,
            head_only: false,
        }
    }

    /// Appends a response header. Multiple calls with the same name are additive.
    #[must_use]
    pub fn header(mut self, name: impl Into<String>, value: impl Into<String>) -> Self {
        self.headers.insert(name, value);
        self
    }

    /// Sets the response body from a string.
    #[must_use]
    pub fn body(mut self, body: impl Into<String>) -> Self {
        self.body = body.into().into_bytes();
        self
    }

    /// Controls whether `Connection: keep-alive` or `Connection: close` is written.
    #[must_use]
    pub fn keep_alive(mut self, keep_alive: bool) -> Self {
        self.keep_alive = keep_alive;
        self
    }

    /// Marks this as the answer to a `HEAD` request: the headers, including
    /// `Content-Length`, describe the body but the body itself is not sent.
    #[must_use]
    pub fn head_only(mut self) -> Self {
        self.head_only = true;
        self
    }

    pub fn status(&self) -> StatusCode {
        self.status
    }

    pub fn headers(&self) -> &Headers {
        &self.headers
    }

    /// Returns the body bytes as they will be sent.
    pub fn payload(&self) -> &[u8] {
        &self.body
    }

    /// Serializes the response into a `BytesMut` buffer using HTTP/1.1 wire format.
    ///
    /// `Content-Length` and `Connection` are always computed here; values for
    /// them set earlier are dropped. A non-empty body without a
    /// `Content-Type` gets `text/plain; charset=utf-8`.
    pub fn into_bytes(mut self) -> BytesMut {
        let content_length = self.body.len();

        self.headers.remove("content-length");
        self.headers.remove("connection");

        if !self.body.is_empty() && !self.headers.contains("content-type") {
            self.headers
                .insert("Content-Type", "text/plain; charset=utf-8");
        }

        let connection = if self.keep_alive {
            "keep-alive"
        } else {
            "close"
        };
        self.headers.insert("Connection", connection);

        let estimated_size = 128 + self.headers.len() * 64 + content_length;
        let mut buf = BytesMut::with_capacity(estimated_size);

        buf.put(
            format!(
                "HTTP/1.1 {} {}\r\n",
                self.status.as_u16(),
                self.status.canonical_reason()
            )
            .as_bytes(),
        );
        buf.put(self.headers.to_string().as_bytes());
        // Content-Length is always the last header before the blank line
        buf.put(format!("Content-Length: {content_length}\r\n\r\n").as_bytes());
        if !self.head_only {
            buf.put(self.body.as_slice());
        }

        buf
    }
}

impl Default for Response {
    fn default() -> Self {
        Self::new(StatusCode::Ok)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn to_string(bytes: BytesMut) -> String {
        String::from_utf8(bytes.to_vec()).unwrap()
    }

    #[test]
    fn json_body_keeps_its_content_type() {
        let r = Response::new(StatusCode::Ok)
            .header("Content-Type", "application/json")
            .body("{}");
        let s = to_string(r.into_bytes());
        assert!(s.starts_with("HTTP/1.1 200 OK\r\n"));
        assert!(s.contains("Content-Type: application/json\r\n"));
        assert!(!s.contains("text/plain"));
        assert!(s.ends_with("Content-Length: 2\r\n\r\n{}"));
    }

    #[test]
    fn plain_body_gets_default_content_type() {
        let s = to_string(Response::new(StatusCode::Ok).body("hi").into_bytes());
        assert!(s.contains("Content-Type: text/plain; charset=utf-8\r\n"));
    }

    #[test]
    fn handler_framing_headers_are_replaced() {
        let mut headers = Headers::new();
        headers.insert("Content-Length", "999");
        headers.insert("Connection", "upgrade");
        let r = Response::from_parts(StatusCode::Ok, headers, b"abc".to_vec()).keep_alive(false);
        let s = to_string(r.into_bytes());
        assert!(!s.contains("999"));
        assert!(!s.contains("upgrade"));
        assert!(s.contains("Connection: close\r\n"));
        assert!(s.contains("Content-Length: 3\r\n"));
    }

    #[test]
    fn empty_body_has_no_content_type() {
        let s = to_string(Response::new(StatusCode::NoContent).into_bytes());
        assert!(s.starts_with("HTTP/1.1 204 No Content\r\n"));
        assert!(!s.contains("Content-Type"));
        assert!(s.contains("Content-Length: 0\r\n"));
    }

    #[test]
    fn head_response_keeps_length_but_drops_body() {
        let r = Response::new(StatusCode::NotFound)
            .header("Content-Type", "application/json")
            .body(r#"{"error":"Not Found"}"#)
            .head_only();
        let s = to_string(r.into_bytes());
        assert!(s.starts_with("HTTP/1.1 404 Not Found\r\n"));
        assert!(s.ends_with("Content-Length: 21\r\n\r\n"));
    }

    #[test]
    fn custom_status_line() {
        let r = Response::from_parts(StatusCode::Custom(418), Headers::new(), Vec::new());
        let s = to_string(r.into_bytes());
        assert!(s.starts_with("HTTP/1.1 418 \r\n"));
    }
}
