//! HTTP/1.1 request parsing using the [`httparse`] crate.

use std::collections::HashMap;

use bytes::Bytes;
use thiserror::Error;

use super::body::{self, BodyLength, Decoded};
use super::{Headers, Method};

/// Errors that can occur while parsing an HTTP/1.1 request.
#[derive(Debug, Error)]
pub enum RequestError {
    #[error("request is incomplete, more data needed")]
    Incomplete,

    #[error("HTTP parse error: {0}")]
    Parse(#[from] httparse::Error),

    #[error("missing required field: {field}")]
    MissingField { field: &'static str },

    #[error("invalid Content-Length: {0:?}")]
    InvalidContentLength(String),

    #[error("unsupported Transfer-Encoding: {0:?}")]
    UnsupportedTransferEncoding(String),

    #[error("malformed chunked body")]
    InvalidChunk,

    #[error("request exceeds maximum allowed size of {max_bytes} bytes")]
    BodyTooLarge { max_bytes: usize },
}

/// A fully framed HTTP/1.1 request.
///
/// Created by [`Request::parse`] once the head and the whole body (by
/// `Content-Length` or chunked coding) are in the buffer.
///
/// # Examples
///
/// ```
/// use nanoserver::http::request::Request;
///
/// let raw = b"POST /items?dry=1 HTTP/1.1\r\nHost: localhost\r\nContent-Length: 2\r\n\r\n{}";
/// let (request, consumed) = Request::parse(raw).unwrap();
///
/// assert_eq!(request.method().as_str(), "POST");
/// assert_eq!(request.path(), "/items");
/// assert_eq!(request.query_param("dry"), Some("1"));
/// assert_eq!(&request.body()[..], b"{}");
/// assert_eq!(consumed, raw.len());
/// ```
#[derive(Debug, Clone)]
pub struct Request {
    method: Method,
    target: String,
    path: String,
    /// HTTP minor version: 0 for HTTP/1.0, 1 for HTTP/1.1.
    version: u8,
    headers: Headers,
    query: Option<String>,
    body: Bytes,
    query_params: HashMap<String, String>,
}

impl Request {
    /// Maximum number of headers we support per request.
    const MAX_HEADERS: usize = 64;

    /// Parses one request from the front of `buf`.
    ///
    /// Returns the request and the number of bytes it occupied, head and
    /// body framing included. Bytes past that offset belong to the next
    /// pipelined request.
    ///
    /// # Errors
    ///
    /// - [`RequestError::Incomplete`]: the head or the body is not fully buffered yet.
    /// - [`RequestError::Parse`]: the head is malformed.
    /// - [`RequestError::MissingField`]: method, path or version is absent.
    /// - [`RequestError::InvalidContentLength`], [`RequestError::UnsupportedTransferEncoding`],
    ///   [`RequestError::InvalidChunk`]: the body framing is unusable.
    pub fn parse(buf: &[u8]) -> Result<(Self, usize), RequestError> {
        let mut headers = [httparse::EMPTY_HEADER; Self::MAX_HEADERS];
        let mut raw_req = httparse::Request::new(&mut headers);

        let body_offset = match raw_req.parse(buf)? {
            httparse::Status::Complete(offset) => offset,
            httparse::Status::Partial => return Err(RequestError::Incomplete),
        };

        let method = raw_req
            .method
            .ok_or(RequestError::MissingField { field: "method" })?;
        let method = match method.parse::<Method>() {
            Ok(method) => method,
            Err(never) => match never {},
        };

        let raw_path = raw_req
            .path
            .ok_or(RequestError::MissingField { field: "path" })?;

        let (path, query) = match raw_path.split_once('?') {
            Some((path, query)) => (path.to_owned(), Some(query.to_owned())),
            None => (raw_path.to_owned(), None),
        };

        let version = raw_req
            .version
            .ok_or(RequestError::MissingField { field: "version" })?;

        let mut header_map = Headers::with_capacity(raw_req.headers.len());
        for header in raw_req.headers.iter() {
            match std::str::from_utf8(header.value) {
                Ok(value) => header_map.insert(header.name, value),
                Err(_) => framing_header_check(header)?,
            }
        }

        let framing = BodyLength::from_headers(&header_map)?;
        let (body, body_len) = match body::decode(framing, &buf[body_offset..])? {
            Decoded::Complete { body, consumed } => (body, consumed),
            Decoded::Incomplete => return Err(RequestError::Incomplete),
        };

        let query_params = query.as_deref().map(parse_query_string).unwrap_or_default();

        Ok((
            Self {
                method,
                target: raw_path.to_owned(),
                path,
                version,
                headers: header_map,
                query,
                body,
                query_params,
            },
            body_offset + body_len,
        ))
    }

    pub fn method(&self) -> &Method {
        &self.method
    }

    /// Returns the request target exactly as sent, query string included.
    pub fn target(&self) -> &str {
        &self.target
    }

    /// Returns the request path (without the query string), exactly as sent.
    pub fn path(&self) -> &str {
        &self.path
    }

    /// Returns the HTTP minor version number (0 = HTTP/1.0, 1 = HTTP/1.1).
    pub fn version(&self) -> u8 {
        self.version
    }

    pub fn headers(&self) -> &Headers {
        &self.headers
    }

    /// Returns the raw query string (without the leading `?`), if any.
    pub fn query_string(&self) -> Option<&str> {
        self.query.as_deref()
    }

    pub fn query_param(&self, key: &str) -> Option<&str> {
        self.query_params.get(key).map(String::as_str)
    }

    /// Returns the decoded request body.
    pub fn body(&self) -> &Bytes {
        &self.body
    }

    /// Returns `true` if the connection should be kept alive after this request.
    ///
    /// HTTP/1.1 defaults to keep-alive. HTTP/1.0 defaults to close unless
    /// `Connection: keep-alive` is explicitly set.
    pub fn is_keep_alive(&self) -> bool {
        match self.headers.get("connection") {
            Some(conn) if conn.eq_ignore_ascii_case("close") => false,
            Some(conn) if conn.eq_ignore_ascii_case("keep-alive") => true,
            _ => self.version == 1,
        }
    }

    /// Returns the value of the `Content-Length` header parsed as a `usize`, if present.
    pub fn content_length(&self) -> Option<usize> {
        self.headers.get("content-length")?.trim().parse().ok()
    }
}

// Non-UTF-8 values are dropped, except on the headers that frame the body.
fn framing_header_check(header: &httparse::Header<'_>) -> Result<(), RequestError> {
    let lossy = || String::from_utf8_lossy(header.value).into_owned();
    if header.name.eq_ignore_ascii_case("content-length") {
        return Err(RequestError::InvalidContentLength(lossy()));
    }
    if header.name.eq_ignore_ascii_case("transfer-encoding") {
        return Err(RequestError::UnsupportedTransferEncoding(lossy()));
    }
    Ok(())
}

/// Parses a URL query string (`key=value&key2=value2`) into a `HashMap`.
///
/// `+` is decoded as a space; percent-escapes are left as they are.
fn parse_query_string(query: &str) -> HashMap<String, String> {
    query
        .split('&')
        .filter(|pair| !pair.is_empty())
        .map(|pair| {
            let (key, value) = pair.split_once('=').unwrap_or((pair, ""));
            (key.replace('+', " "), value.replace('+', " "))
        })
        .collect()
}
