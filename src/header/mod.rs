//! Header field handling: well-known name ids, the single-field
//! tokenizer, and the indexed field table exposed to callers.
//!
//! The submodules mirror the three concerns:
//!
//! - [`name`]: compile-time table of well-known field names and the
//!   case-insensitive [`FieldId`] lookup.
//! - [`field`]: advances exactly one field (or detects the header
//!   terminator) over a byte range, per RFC 7230 §3.2.
//! - [`table`]: the zero-copy [`Fields`] view with ordered, duplicate-
//!   preserving retrieval and value combination.

pub mod field;
pub mod name;
pub mod table;

pub use name::FieldId;
pub use table::{FieldRef, Fields, Query};

use http::{Method, StatusCode, Version};

use crate::parser::Kind;
use crate::workspace::Span;

/// An immutable snapshot of a parsed message header.
///
/// All text accessors return slices of the parser's header buffer; the
/// view borrows the parser, so it cannot outlive the message it belongs
/// to. Request accessors panic on response headers and vice versa; the
/// message kind is fixed by the parser that produced the view.
#[derive(Debug, Clone, Copy)]
pub struct Header<'a> {
    pub(crate) buf: &'a [u8],
    pub(crate) kind: Kind,
    pub(crate) method: &'a Method,
    pub(crate) target: Span,
    pub(crate) version: Version,
    pub(crate) status: StatusCode,
    pub(crate) reason: Span,
    pub(crate) fields: Fields<'a>,
}

impl<'a> Header<'a> {
    /// The message kind this header was parsed as.
    pub fn kind(&self) -> Kind {
        self.kind
    }

    /// The request method.
    pub fn method(&self) -> &Method {
        assert_eq!(self.kind, Kind::Request);
        self.method
    }

    /// The request target, exactly as it appeared on the wire.
    pub fn target(&self) -> &'a str {
        assert_eq!(self.kind, Kind::Request);
        // target bytes were validated as visible ASCII during parsing
        std::str::from_utf8(&self.buf[self.target.start..self.target.end]).unwrap()
    }

    /// The HTTP version of the start line.
    pub fn version(&self) -> Version {
        self.version
    }

    /// The response status code.
    pub fn status(&self) -> StatusCode {
        assert_eq!(self.kind, Kind::Response);
        self.status
    }

    /// The response reason phrase, possibly empty.
    pub fn reason(&self) -> &'a [u8] {
        assert_eq!(self.kind, Kind::Response);
        &self.buf[self.reason.start..self.reason.end]
    }

    /// The field table.
    pub fn fields(&self) -> &Fields<'a> {
        &self.fields
    }
}
