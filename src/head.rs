//! Rendered message heads for the serializer.
//!
//! A [`Head`] is the wire form of a request or status line plus header
//! fields, rendered once into a shared byte buffer. The serializer
//! references these bytes in place for the lifetime of the message; the
//! head also carries the body layout the framing logic needs and the
//! flags derived from the fields (`Expect: 100-continue`, the content
//! coding for encoder selection).
//!
//! Obsolete line folding cannot be emitted: `http::HeaderValue` rejects
//! CR and LF, so every rendered field is a single line by construction.

use bytes::{BufMut, Bytes, BytesMut};
use http::{header, HeaderMap, Version};

use crate::error::SendError;

const INIT_HEAD_SIZE: usize = 4 * 1024;

/// How the message body is framed on the wire.
#[derive(Debug, Copy, Clone, PartialEq, Eq)]
pub enum BodyLayout {
    /// No body at all.
    Empty,
    /// A body of exactly this many bytes, declared via Content-Length.
    Length(u64),
    /// Chunked transfer encoding; the length is discovered as it goes.
    Chunked,
}

impl BodyLayout {
    /// Returns true if the layout uses chunked transfer encoding
    #[inline]
    pub fn is_chunked(&self) -> bool {
        matches!(self, BodyLayout::Chunked)
    }

    /// Returns true if the layout carries no body
    #[inline]
    pub fn is_empty(&self) -> bool {
        matches!(self, BodyLayout::Empty)
    }
}

/// A fully rendered message head.
#[derive(Debug, Clone)]
pub struct Head {
    bytes: Bytes,
    layout: BodyLayout,
    expect_continue: bool,
    coding: Option<String>,
}

impl Head {
    /// Renders a request head.
    ///
    /// The request line is written from the method, target and version in
    /// `parts`; every header except `Content-Length` and
    /// `Transfer-Encoding` is written as-is, and the framing fields are
    /// derived from `layout` so the head always agrees with the body the
    /// serializer will produce.
    pub fn request(parts: &http::request::Parts, layout: BodyLayout) -> Result<Self, SendError> {
        let mut dst = BytesMut::with_capacity(INIT_HEAD_SIZE);

        dst.put_slice(parts.method.as_str().as_bytes());
        dst.put_slice(b" ");
        dst.put_slice(target_of(&parts.uri).as_bytes());
        dst.put_slice(b" ");
        dst.put_slice(version_text(parts.version)?);
        dst.put_slice(b"\r\n");

        write_fields(&mut dst, &parts.headers, layout, false);
        dst.put_slice(b"\r\n");

        Ok(Self {
            bytes: dst.freeze(),
            layout,
            expect_continue: wants_continue(&parts.headers),
            coding: content_coding(&parts.headers),
        })
    }

    /// Renders a response head.
    pub fn response(parts: &http::response::Parts, layout: BodyLayout) -> Result<Self, SendError> {
        let mut dst = BytesMut::with_capacity(INIT_HEAD_SIZE);

        dst.put_slice(version_text(parts.version)?);
        dst.put_slice(b" ");
        dst.put_slice(parts.status.as_str().as_bytes());
        dst.put_slice(b" ");
        dst.put_slice(parts.status.canonical_reason().unwrap_or("").as_bytes());
        dst.put_slice(b"\r\n");

        write_fields(&mut dst, &parts.headers, layout, true);
        dst.put_slice(b"\r\n");

        Ok(Self { bytes: dst.freeze(), layout, expect_continue: false, coding: content_coding(&parts.headers) })
    }

    /// The rendered head bytes, start line through the terminating CRLF.
    pub fn bytes(&self) -> &Bytes {
        &self.bytes
    }

    /// The body framing this head declares.
    pub fn layout(&self) -> BodyLayout {
        self.layout
    }

    /// Whether the head carries `Expect: 100-continue`.
    pub fn is_expect_continue(&self) -> bool {
        self.expect_continue
    }

    /// The last content coding named by `Content-Encoding`, lowercased.
    pub fn content_coding(&self) -> Option<&str> {
        self.coding.as_deref()
    }
}

fn version_text(version: Version) -> Result<&'static [u8], SendError> {
    match version {
        Version::HTTP_10 => Ok(b"HTTP/1.0"),
        Version::HTTP_11 => Ok(b"HTTP/1.1"),
        v => {
            tracing::error!(http_version = ?v, "unsupported http version");
            Err(SendError::invalid_head(format!("unsupported http version {v:?}")))
        }
    }
}

fn target_of(uri: &http::Uri) -> String {
    if uri.scheme().is_some() {
        // absolute-form
        uri.to_string()
    } else {
        uri.path_and_query().map(|pq| pq.as_str()).unwrap_or("/").to_string()
    }
}

fn write_fields(dst: &mut BytesMut, headers: &HeaderMap, layout: BodyLayout, is_response: bool) {
    for (name, value) in headers.iter() {
        if name == header::CONTENT_LENGTH || name == header::TRANSFER_ENCODING {
            continue;
        }
        dst.put_slice(name.as_ref());
        dst.put_slice(b": ");
        dst.put_slice(value.as_ref());
        dst.put_slice(b"\r\n");
    }

    match layout {
        BodyLayout::Length(n) => {
            dst.put_slice(b"content-length: ");
            dst.put_slice(n.to_string().as_bytes());
            dst.put_slice(b"\r\n");
        }
        BodyLayout::Chunked => {
            // keep transfer codings the caller already applied, with
            // chunked as the final coding
            let mut te = String::new();
            for value in headers.get_all(header::TRANSFER_ENCODING) {
                if let Ok(text) = value.to_str() {
                    for coding in text.split(',') {
                        let coding = coding.trim();
                        if !coding.is_empty() && !coding.eq_ignore_ascii_case("chunked") {
                            if !te.is_empty() {
                                te.push_str(", ");
                            }
                            te.push_str(coding);
                        }
                    }
                }
            }
            if te.is_empty() {
                te.push_str("chunked");
            } else {
                te.push_str(", chunked");
            }
            dst.put_slice(b"transfer-encoding: ");
            dst.put_slice(te.as_bytes());
            dst.put_slice(b"\r\n");
        }
        BodyLayout::Empty => {
            // requests omit the field entirely; responses declare the
            // empty body so EOF framing is never assumed
            if is_response {
                dst.put_slice(b"content-length: 0\r\n");
            }
        }
    }
}

fn wants_continue(headers: &HeaderMap) -> bool {
    headers
        .get(header::EXPECT)
        .and_then(|v| v.to_str().ok())
        .map(|v| v.eq_ignore_ascii_case("100-continue"))
        .unwrap_or(false)
}

fn content_coding(headers: &HeaderMap) -> Option<String> {
    headers
        .get_all(header::CONTENT_ENCODING)
        .iter()
        .last()
        .and_then(|v| v.to_str().ok())
        .and_then(|text| text.rsplit(',').next())
        .map(|coding| coding.trim().to_ascii_lowercase())
        .filter(|coding| !coding.is_empty() && coding != "identity")
}

#[cfg(test)]
mod tests {
    use super::*;
    use http::{Method, Request, Response, StatusCode};

    fn request_parts(req: Request<()>) -> http::request::Parts {
        req.into_parts().0
    }

    #[test]
    fn request_line_and_fields() {
        let req = Request::builder()
            .method(Method::GET)
            .uri("/index.html?a=1")
            .header("host", "example.com")
            .body(())
            .unwrap();
        let head = Head::request(&request_parts(req), BodyLayout::Empty).unwrap();
        assert_eq!(
            head.bytes().as_ref(),
            b"GET /index.html?a=1 HTTP/1.1\r\nhost: example.com\r\n\r\n"
        );
        assert!(!head.is_expect_continue());
    }

    #[test]
    fn content_length_is_canonicalized() {
        let req = Request::builder()
            .method(Method::POST)
            .uri("/upload")
            // a stale length from the caller is replaced, not duplicated
            .header("content-length", "999")
            .body(())
            .unwrap();
        let head = Head::request(&request_parts(req), BodyLayout::Length(5)).unwrap();
        assert_eq!(
            head.bytes().as_ref(),
            b"POST /upload HTTP/1.1\r\ncontent-length: 5\r\n\r\n"
        );
    }

    #[test]
    fn chunked_keeps_existing_codings() {
        let req = Request::builder()
            .method(Method::POST)
            .uri("/")
            .header("transfer-encoding", "gzip")
            .body(())
            .unwrap();
        let head = Head::request(&request_parts(req), BodyLayout::Chunked).unwrap();
        assert_eq!(
            head.bytes().as_ref(),
            b"POST / HTTP/1.1\r\ntransfer-encoding: gzip, chunked\r\n\r\n"
        );
    }

    #[test]
    fn response_status_line() {
        let resp = Response::builder().status(StatusCode::NOT_FOUND).body(()).unwrap();
        let head = Head::response(&resp.into_parts().0, BodyLayout::Empty).unwrap();
        assert_eq!(head.bytes().as_ref(), b"HTTP/1.1 404 Not Found\r\ncontent-length: 0\r\n\r\n");
    }

    #[test]
    fn expect_continue_is_detected() {
        let req = Request::builder()
            .method(Method::PUT)
            .uri("/big")
            .header("expect", "100-continue")
            .body(())
            .unwrap();
        let head = Head::request(&request_parts(req), BodyLayout::Length(10)).unwrap();
        assert!(head.is_expect_continue());
    }

    #[test]
    fn content_coding_takes_the_last() {
        let req = Request::builder()
            .method(Method::POST)
            .uri("/")
            .header("content-encoding", "gzip, br")
            .body(())
            .unwrap();
        let head = Head::request(&request_parts(req), BodyLayout::Chunked).unwrap();
        assert_eq!(head.content_coding(), Some("br"));
    }

    #[test]
    fn http2_version_is_rejected() {
        let req = Request::builder()
            .method(Method::GET)
            .uri("/")
            .version(Version::HTTP_2)
            .body(())
            .unwrap();
        assert!(Head::request(&request_parts(req), BodyLayout::Empty).is_err());
    }
}
