//! Request body framing.
//!
//! HTTP/1.1 delimits a request body either with `Content-Length` or with the
//! chunked transfer coding (RFC 9112 §6). When both are present the transfer
//! coding wins and `Content-Length` is ignored.

use bytes::{BufMut, Bytes, BytesMut};

use super::{Headers, request::RequestError};

/// How the body following a request head is delimited.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BodyLength {
    /// No body (no framing headers, or `Content-Length: 0`).
    Empty,
    /// Exactly this many bytes.
    Fixed(usize),
    /// `Transfer-Encoding: chunked`.
    Chunked,
}

impl BodyLength {
    /// Determines body framing from the request headers.
    ///
    /// Repeated `Content-Length` fields (or comma-separated values) are
    /// accepted only when they all agree. Repeated `Transfer-Encoding` fields
    /// are read as one list.
    ///
    /// # Errors
    ///
    /// - [`RequestError::UnsupportedTransferEncoding`] if a transfer coding other
    ///   than `chunked` is last in the list.
    /// - [`RequestError::InvalidContentLength`] if `Content-Length` is not a
    ///   non-negative integer, or its values disagree.
    pub fn from_headers(headers: &Headers) -> Result<Self, RequestError> {
        let codings: Vec<&str> = headers.get_all("transfer-encoding").collect();
        if !codings.is_empty() {
            let last = codings
                .iter()
                .copied()
                .flat_map(|value| value.split(','))
                .map(str::trim)
                .filter(|coding| !coding.is_empty())
                .last()
                .unwrap_or_default();
            if last.eq_ignore_ascii_case("chunked") {
                return Ok(Self::Chunked);
            }
            return Err(RequestError::UnsupportedTransferEncoding(codings.join(", ")));
        }

        let lengths: Vec<&str> = headers.get_all("content-length").collect();
        let mut values = lengths
            .iter()
            .copied()
            .flat_map(|value| value.split(','))
            .map(str::trim);
        let Some(first) = values.next() else {
            return Ok(Self::Empty);
        };
        let invalid = || RequestError::InvalidContentLength(lengths.join(", "));
        if values.any(|other| other != first) {
            return Err(invalid());
        }

        let len: usize = first.parse().map_err(|_| invalid())?;
        Ok(if len == 0 { Self::Empty } else { Self::Fixed(len) })
    }
}

/// Result of decoding a body out of a possibly partial buffer.
#[derive(Debug, PartialEq, Eq)]
pub enum Decoded {
    /// The whole body is available. `consumed` counts framing bytes too.
    Complete { body: Bytes, consumed: usize },
    /// More bytes are needed.
    Incomplete,
}

/// Decodes the body at the start of `buf` according to `length`.
pub fn decode(length: BodyLength, buf: &[u8]) -> Result<Decoded, RequestError> {
    match length {
        BodyLength::Empty => Ok(Decoded::Complete {
            body: Bytes::new(),
            consumed: 0,
        }),
        BodyLength::Fixed(len) if buf.len() < len => Ok(Decoded::Incomplete),
        BodyLength::Fixed(len) => Ok(Decoded::Complete {
            body: Bytes::copy_from_slice(&buf[..len]),
            consumed: len,
        }),
        BodyLength::Chunked => decode_chunked(buf),
    }
}

/// Decodes a chunked body, dropping chunk extensions and trailer fields.
///
/// # Examples
///
/// ```
/// use nanoserver::http::body::{Decoded, decode_chunked};
///
/// let raw = b"4\r\nWiki\r\n5\r\npedia\r\n0\r\n\r\n";
/// match decode_chunked(raw).unwrap() {
///     Decoded::Complete { body, consumed } => {
///         assert_eq!(&body[..], b"Wikipedia");
///         assert_eq!(consumed, raw.len());
///     }
///     Decoded::Incomplete => unreachable!(),
/// }
/// ```
pub fn decode_chunked(buf: &[u8]) -> Result<Decoded, RequestError> {
    let mut body = BytesMut::new();
    let mut pos = 0;

    loop {
        let (data_start, size) = match httparse::parse_chunk_size(&buf[pos..]) {
            Ok(httparse::Status::Complete((offset, size))) => (pos + offset, size),
            Ok(httparse::Status::Partial) => return Ok(Decoded::Incomplete),
            Err(_) => return Err(RequestError::InvalidChunk),
        };

        if size == 0 {
            return Ok(match trailer_end(&buf[data_start..]) {
                Some(len) => Decoded::Complete {
                    body: body.freeze(),
                    consumed: data_start + len,
                },
                None => Decoded::Incomplete,
            });
        }

        let size = usize::try_from(size).map_err(|_| RequestError::InvalidChunk)?;
        let data_end = data_start
            .checked_add(size)
            .ok_or(RequestError::InvalidChunk)?;
        if buf.len() < data_end.saturating_add(2) {
            return Ok(Decoded::Incomplete);
        }
        if &buf[data_end..data_end + 2] != b"\r\n" {
            return Err(RequestError::InvalidChunk);
        }

        body.put_slice(&buf[data_start..data_end]);
        pos = data_end + 2;
    }
}

// Length of the trailer section (including the final blank line), if complete.
fn trailer_end(buf: &[u8]) -> Option<usize> {
    if buf.starts_with(b"\r\n") {
        return Some(2);
    }
    buf.windows(4)
        .position(|w| w == b"\r\n\r\n")
        .map(|i| i + 4)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn headers(pairs: &[(&str, &str)]) -> Headers {
        let mut h = Headers::new();
        for (k, v) in pairs {
            h.insert(*k, *v);
        }
        h
    }

    #[test]
    fn framing_from_headers() {
        assert_eq!(BodyLength::from_headers(&headers(&[])).unwrap(), BodyLength::Empty);
        assert_eq!(
            BodyLength::from_headers(&headers(&[("Content-Length", "0")])).unwrap(),
            BodyLength::Empty
        );
        assert_eq!(
            BodyLength::from_headers(&headers(&[("Content-Length", "17")])).unwrap(),
            BodyLength::Fixed(17)
        );
    }

    #[test]
    fn chunked_wins_over_content_length() {
        let h = headers(&[("Content-Length", "3"), ("Transfer-Encoding", "gzip, chunked")]);
        assert_eq!(BodyLength::from_headers(&h).unwrap(), BodyLength::Chunked);
    }

    #[test]
    fn rejects_bad_content_length() {
        let h = headers(&[("Content-Length", "-1")]);
        assert!(matches!(
            BodyLength::from_headers(&h),
            Err(RequestError::InvalidContentLength(_))
        ));
    }

    #[test]
    fn conflicting_content_lengths_are_rejected() {
        let h = headers(&[("Content-Length", "2"), ("Content-Length", "5")]);
        assert!(matches!(
            BodyLength::from_headers(&h),
            Err(RequestError::InvalidContentLength(_))
        ));

        let h = headers(&[("Content-Length", "2, 5")]);
        assert!(BodyLength::from_headers(&h).is_err());
    }

    #[test]
    fn repeated_equal_content_lengths_are_accepted() {
        let h = headers(&[("Content-Length", "5"), ("Content-Length", " 5")]);
        assert_eq!(BodyLength::from_headers(&h).unwrap(), BodyLength::Fixed(5));
    }

    #[test]
    fn transfer_codings_span_repeated_fields() {
        let h = headers(&[("Transfer-Encoding", "gzip"), ("Transfer-Encoding", "chunked")]);
        assert_eq!(BodyLength::from_headers(&h).unwrap(), BodyLength::Chunked);

        let h = headers(&[("Transfer-Encoding", "chunked"), ("Transfer-Encoding", "gzip")]);
        assert!(BodyLength::from_headers(&h).is_err());
    }

    #[test]
    fn rejects_unknown_transfer_coding() {
        let h = headers(&[("Transfer-Encoding", "gzip")]);
        assert!(matches!(
            BodyLength::from_headers(&h),
            Err(RequestError::UnsupportedTransferEncoding(_))
        ));
    }

    #[test]
    fn fixed_waits_for_all_bytes() {
        assert_eq!(decode(BodyLength::Fixed(5), b"hel").unwrap(), Decoded::Incomplete);
        assert_eq!(
            decode(BodyLength::Fixed(5), b"hello, extra").unwrap(),
            Decoded::Complete {
                body: Bytes::from_static(b"hello"),
                consumed: 5
            }
        );
    }

    #[test]
    fn chunked_partial_input() {
        assert_eq!(decode_chunked(b"4\r\nWi").unwrap(), Decoded::Incomplete);
        assert_eq!(decode_chunked(b"4\r\nWiki\r\n0\r\n").unwrap(), Decoded::Incomplete);
    }

    #[test]
    fn chunked_skips_trailers() {
        let raw = b"3\r\nabc\r\n0\r\nX-Checksum: 1\r\n\r\nNEXT";
        match decode_chunked(raw).unwrap() {
            Decoded::Complete { body, consumed } => {
                assert_eq!(&body[..], b"abc");
                assert_eq!(&raw[consumed..], b"NEXT");
            }
            Decoded::Incomplete => panic!("expected a complete body"),
        }
    }

    #[test]
    fn chunked_rejects_missing_crlf() {
        assert!(matches!(
            decode_chunked(b"3\r\nabcX\r\n0\r\n\r\n"),
            Err(RequestError::InvalidChunk)
        ));
        assert!(matches!(decode_chunked(b"zz\r\n"), Err(RequestError::InvalidChunk)));
    }
}
