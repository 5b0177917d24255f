//! Incremental, zero-copy HTTP/1.x wire codec.
//!
//! This crate implements the two hard pieces of an HTTP/1 stack as sans-io
//! components driven entirely by the caller:
//!
//! - [`Parser`]: an incremental request/response parser. The caller obtains
//!   writable space with [`Parser::prepare`], copies bytes arriving from any
//!   transport, calls [`Parser::commit`], then drives [`Parser::parse`].
//!   Parsed start lines and header fields are exposed as byte-range views
//!   into the parser's own buffer; nothing is copied out.
//!
//! - [`Serializer`]: composes a rendered message [`Head`] with an optional
//!   body (inline buffers, a pull [`Source`], or a caller-driven stream)
//!   into an ordered sequence of output byte ranges, applying chunked
//!   framing and an optional content-coding transform along the way.
//!
//! Neither type performs I/O or blocks. Suspension points of the protocol
//! are explicit states: `parse` returning `Ok(None)` means more input is
//! required, [`Serializer::is_expect_continue`] pauses body emission until
//! the peer's interim response, and so on.
//!
//! # Example
//!
//! ```
//! use h1_wire::{Config, Kind, Parser};
//!
//! let mut parser = Parser::new(Kind::Request, Config::default());
//! parser.start();
//!
//! // copy transport bytes into the parser
//! let msg = b"GET / HTTP/1.1\r\nHost: example.com\r\n\r\n";
//! let (dst, _) = parser.prepare();
//! dst[..msg.len()].copy_from_slice(msg);
//! parser.commit(msg.len());
//!
//! parser.parse().unwrap();
//! let header = parser.get().unwrap();
//! assert_eq!(header.target(), "/");
//! ```

pub mod buffer;
pub mod chars;
pub mod codec;
pub mod context;
pub mod header;
pub mod parser;
pub mod serializer;
pub mod source;
pub mod workspace;

mod error;
mod head;

pub use codec::{Codec, CodecError, Transform};
pub use context::Context;
pub use error::{ParseError, SendError, WireError};
pub use head::{BodyLayout, Head};
pub use header::{FieldId, Fields, Header};
pub use parser::{Advance, Config, Kind, Parser};
pub use serializer::{Output, Serializer, Stream};
pub use source::{Read, Source};

pub(crate) use help::ensure;

mod help {

    macro_rules! ensure {
        ($predicate:expr, $error:expr) => {
            if !$predicate {
                return Err($error);
            }
        };
    }
    pub(crate) use ensure;
}
