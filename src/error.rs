//! Error types for the wire codec.
//!
//! Two error enums cover the two halves of the crate:
//!
//! - [`ParseError`]: everything the parser can reject. Every variant is
//!   fatal and sticky for the current message; the parser refuses further
//!   input until `reset()`. "Need more input" is not an error: `parse`
//!   expresses it as `Ok(None)`.
//! - [`SendError`]: failures raised while composing output. The serializer
//!   never exposes partial garbage: it either reports failure from
//!   `start_*` before any output exists, or stops at a frame boundary.
//!
//! [`WireError`] unifies both at an API boundary that handles either
//! direction.

use std::io;
use thiserror::Error;

/// The top-level error type, wrapping either direction of the codec.
#[derive(Debug, Error)]
pub enum WireError {
    /// Errors raised while parsing input
    #[error("parse error: {source}")]
    Parse {
        #[from]
        source: ParseError,
    },

    /// Errors raised while composing output
    #[error("send error: {source}")]
    Send {
        #[from]
        source: SendError,
    },
}

/// Errors raised by the message parser.
///
/// All variants are unrecoverable for the current message.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ParseError {
    /// Syntax error in the request method
    #[error("invalid method")]
    BadMethod,

    /// Syntax error in the request target
    #[error("invalid request target")]
    BadTarget,

    /// Syntax error or unsupported HTTP-Version
    #[error("invalid http version")]
    BadVersion,

    /// Syntax error in the status code
    #[error("invalid status code")]
    BadStatus,

    /// Syntax error in the reason phrase
    #[error("invalid reason phrase")]
    BadReason,

    /// Syntax error in a field name
    #[error("invalid field name")]
    BadFieldName,

    /// Syntax error in a field value
    #[error("invalid field value")]
    BadFieldValue,

    /// A CR not followed by LF, or a bare LF
    #[error("invalid line ending")]
    BadLineEnding,

    /// Invalid or conflicting Content-Length field values
    #[error("invalid content-length: {reason}")]
    BadContentLength { reason: String },

    /// Invalid or unacceptable Transfer-Encoding field values
    #[error("invalid transfer-encoding: {reason}")]
    BadTransferEncoding { reason: String },

    /// Malformed chunked framing in the message body
    #[error("invalid chunk: {reason}")]
    BadChunk { reason: String },

    /// Header section exceeds the configured limit
    #[error("header size too large, current: {current} exceed the limit {max}")]
    HeaderTooLarge { current: usize, max: usize },

    /// Decoded body exceeds the configured limit
    #[error("body size exceed the limit {max}")]
    BodyTooLarge { max: u64 },

    /// The scratch workspace cannot satisfy an allocation
    #[error("workspace exhausted")]
    WorkspaceExhausted,

    /// A content-coding transform rejected the body bytes
    #[error("invalid encoded body: {reason}")]
    BadEncoding { reason: String },

    /// End of input in the middle of a message
    #[error("incomplete message")]
    Incomplete,
}

impl ParseError {
    /// Creates a new BadContentLength error
    pub fn bad_content_length<S: ToString>(reason: S) -> Self {
        Self::BadContentLength { reason: reason.to_string() }
    }

    /// Creates a new BadTransferEncoding error
    pub fn bad_transfer_encoding<S: ToString>(reason: S) -> Self {
        Self::BadTransferEncoding { reason: reason.to_string() }
    }

    /// Creates a new BadChunk error
    pub fn bad_chunk<S: ToString>(reason: S) -> Self {
        Self::BadChunk { reason: reason.to_string() }
    }

    /// Creates a new HeaderTooLarge error
    pub fn header_too_large(current: usize, max: usize) -> Self {
        Self::HeaderTooLarge { current, max }
    }

    /// Creates a new BadEncoding error
    pub fn bad_encoding<S: ToString>(reason: S) -> Self {
        Self::BadEncoding { reason: reason.to_string() }
    }
}

/// Errors raised by the message serializer.
#[derive(Debug, Error)]
pub enum SendError {
    /// The scratch workspace cannot satisfy an allocation
    #[error("workspace exhausted")]
    WorkspaceExhausted,

    /// The message head cannot be rendered as HTTP/1 wire bytes
    #[error("invalid head: {reason}")]
    InvalidHead { reason: String },

    /// The body produced does not match the declared framing
    #[error("invalid body: {reason}")]
    BodyLength { reason: String },

    /// A content-coding transform failed
    #[error("invalid encoding: {reason}")]
    BadEncoding { reason: String },

    /// The pull source reported an error
    #[error("source error: {source}")]
    Source {
        #[from]
        source: io::Error,
    },

    /// A write was issued through a stream handle that was closed
    #[error("stream is closed")]
    Closed,
}

impl SendError {
    /// Creates a new InvalidHead error
    pub fn invalid_head<S: ToString>(reason: S) -> Self {
        Self::InvalidHead { reason: reason.to_string() }
    }

    /// Creates a new BodyLength error
    pub fn body_length<S: ToString>(reason: S) -> Self {
        Self::BodyLength { reason: reason.to_string() }
    }

    /// Creates a new BadEncoding error
    pub fn bad_encoding<S: ToString>(reason: S) -> Self {
        Self::BadEncoding { reason: reason.to_string() }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parse_errors_are_cloneable_for_sticky_reporting() {
        let e = ParseError::bad_content_length("value 12x is not u64");
        let again = e.clone();
        assert_eq!(e, again);
    }

    #[test]
    fn umbrella_conversions() {
        let p: WireError = ParseError::BadMethod.into();
        assert!(matches!(p, WireError::Parse { .. }));
        let s: WireError = SendError::body_length("body shorter than declared").into();
        assert!(matches!(s, WireError::Send { .. }));
    }

    #[test]
    fn display_strings() {
        assert_eq!(
            ParseError::header_too_large(9000, 8192).to_string(),
            "header size too large, current: 9000 exceed the limit 8192"
        );
        assert_eq!(ParseError::BadFieldName.to_string(), "invalid field name");
    }
}
