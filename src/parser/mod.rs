//! Incremental HTTP/1 message parser.
//!
//! The parser is strict: any deviation from the documented HTTP ABNFs is
//! an unrecoverable error for the current message. It is driven by a
//! polling loop with no internal I/O:
//!
//! 1. [`Parser::prepare`] returns writable space,
//! 2. the caller copies transport bytes in and calls [`Parser::commit`],
//! 3. [`Parser::parse`] consumes buffered input and advances the state
//!    machine; `Ok(None)` means more input is required.
//!
//! After the header section completes, [`Parser::get`] exposes a
//! zero-copy [`Header`] view and decoded body bytes appear under
//! [`Parser::body`]. When a message is complete, input bytes beyond it
//! are retained: [`Parser::start`] hands them to the next message of the
//! stream, which is how pipelined messages are carried.
//!
//! # State machine
//!
//! ```text
//! Reset --start()--> StartLine --CRLF--> Fields --terminator--> body
//! body is one of:
//!   BodyLengthKnown   --remaining == 0-------------> Complete
//!   BodyChunkedSize   --size line--> BodyChunkedData | BodyChunkedTrailers
//!   BodyChunkedData   --chunk consumed + CRLF------> BodyChunkedSize
//!   BodyChunkedTrailers --fields end---------------> Complete
//!   BodyUntilEof      --commit_eof()---------------> Complete
//! ```

mod chunked;

use std::sync::Arc;

use http::{Method, StatusCode, Version};
use tracing::trace;

use crate::buffer::Ring;
use crate::chars;
use crate::context::Context;
use crate::ensure;
use crate::error::ParseError;
use crate::header::field::{self, FieldEvent};
use crate::header::name::FieldId;
use crate::header::table::{FieldEntry, Fields};
use crate::header::Header;
use crate::workspace::{Span, Workspace};

use crate::codec::Codec;

/// Whether a parser reads requests or responses.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Kind {
    Request,
    Response,
}

/// Parser limits and buffer sizing.
///
/// The workspace is sized from these values once, at construction, and
/// never grows.
#[derive(Debug, Clone)]
pub struct Config {
    /// Upper bound on the header section: start line, fields, and all
    /// delimiters including the terminating CRLF. The trailer section of
    /// a chunked message is held to the same bound.
    pub max_header_bytes: usize,

    /// Upper bound on the decoded body size.
    pub max_body_bytes: u64,

    /// Sizing of the input and decoded-output staging areas. Bodies
    /// larger than this are drained incrementally with
    /// [`Parser::consume_body`].
    pub buffer_bytes: usize,
}

impl Default for Config {
    fn default() -> Self {
        Self { max_header_bytes: 8 * 1024, max_body_bytes: 64 * 1024, buffer_bytes: 8 * 1024 }
    }
}

/// Progress reported by [`Parser::parse`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Advance {
    /// The header section completed; [`Parser::get`] is now available.
    Headers,
    /// The message is fully parsed.
    Complete,
    /// The stream ended cleanly before a new message began.
    EndOfStream,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum State {
    Reset,
    StartLine,
    Fields,
    BodyLengthKnown,
    BodyChunkedSize,
    BodyChunkedData,
    BodyChunkedTrailers,
    BodyUntilEof,
    Complete,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Payload {
    Empty,
    Size(u64),
    Chunked,
    ToEof,
}

/// An incremental push parser for HTTP/1 requests or responses.
pub struct Parser {
    kind: Kind,
    cfg: Config,
    ctx: Option<Arc<Context>>,

    ws: Workspace,
    head_span: Span,
    cb0_span: Span,
    cb1_span: Span,

    state: State,
    failed: Option<ParseError>,

    // header phase
    head_len: usize,
    parsed: usize,
    append_end: usize,
    have_header: bool,

    // start line
    method: Method,
    target: Span,
    version: Version,
    status: StatusCode,
    reason: Span,

    fields: Vec<FieldEntry>,
    trailer_fields: Vec<FieldEntry>,
    trailers_parsed: bool,

    // body
    cb0: Ring,
    cb1: Ring,
    payload: Payload,
    payload_remain: u64,
    chunk_remain: u64,
    needs_chunk_close: bool,
    body_avail: usize,
    body_total: u64,
    decoder: Option<Box<dyn Codec>>,
    decoder_done: bool,

    head_response: bool,
    got_eof: bool,
}

impl Parser {
    /// Creates a parser with no codec registry.
    pub fn new(kind: Kind, cfg: Config) -> Self {
        Self::build(kind, cfg, None)
    }

    /// Creates a parser that resolves content codings against `ctx`.
    pub fn with_context(kind: Kind, cfg: Config, ctx: Arc<Context>) -> Self {
        Self::build(kind, cfg, Some(ctx))
    }

    fn build(kind: Kind, cfg: Config, ctx: Option<Arc<Context>>) -> Self {
        // | header region | input ring | decoded ring |
        //
        // The header region and input ring are both sized to hold a
        // maximal header plus one buffer of overread, so pipelined bytes
        // always fit when they move between the two.
        let head_cap = cfg.max_header_bytes + cfg.buffer_bytes;
        let cb0_cap = cfg.max_header_bytes + cfg.buffer_bytes;
        let cb1_cap = cfg.buffer_bytes;

        let mut ws = Workspace::new(head_cap + cb0_cap + cb1_cap);
        let head_span = ws.alloc(head_cap).expect("sized above");
        let cb0_span = ws.alloc(cb0_cap).expect("sized above");
        let cb1_span = ws.alloc(cb1_cap).expect("sized above");

        Self {
            kind,
            cfg,
            ctx,
            ws,
            head_span,
            cb0_span,
            cb1_span,
            state: State::Reset,
            failed: None,
            head_len: 0,
            parsed: 0,
            append_end: 0,
            have_header: false,
            method: Method::GET,
            target: Span::default(),
            version: Version::HTTP_11,
            status: StatusCode::OK,
            reason: Span::default(),
            fields: Vec::with_capacity(64),
            trailer_fields: Vec::new(),
            trailers_parsed: false,
            cb0: Ring::new(cb0_span),
            cb1: Ring::new(cb1_span),
            payload: Payload::Empty,
            payload_remain: 0,
            chunk_remain: 0,
            needs_chunk_close: false,
            body_avail: 0,
            body_total: 0,
            decoder: None,
            decoder_done: false,
            head_response: false,
            got_eof: false,
        }
    }

    /// The message kind this parser accepts.
    pub fn kind(&self) -> Kind {
        self.kind
    }

    /// Prepares the parser for a new stream.
    ///
    /// Drops any buffered input and clears a sticky error. A parser must
    /// be reset (or freshly constructed) before the first
    /// [`start`](Self::start).
    pub fn reset(&mut self) {
        self.state = State::Reset;
        self.failed = None;
        self.head_len = 0;
        self.got_eof = false;
        self.clear_message();
    }

    /// Begins parsing a new message.
    ///
    /// Buffered bytes beyond the previous message are preserved: they are
    /// the first bytes of this one.
    ///
    /// # Panics
    ///
    /// Panics if the current message is incomplete, or after a parse
    /// error without an intervening [`reset`](Self::reset).
    pub fn start(&mut self) {
        self.start_impl(false)
    }

    /// Begins parsing a response to a HEAD request.
    ///
    /// Such a response carries framing fields but never a body.
    ///
    /// # Panics
    ///
    /// Panics on request parsers, and as [`start`](Self::start) does.
    pub fn start_head_response(&mut self) {
        assert_eq!(self.kind, Kind::Response, "head responses arrive on response parsers");
        self.start_impl(true)
    }

    fn start_impl(&mut self, head_response: bool) {
        assert!(self.failed.is_none(), "reset() is required after a parse error");

        let mut leftover = 0usize;
        match self.state {
            State::Reset => {}
            State::StartLine if self.head_len == 0 => {}
            State::Complete => {
                // unread body bytes are abandoned; bytes past the message
                // belong to the next one and move to the header region
                self.cb0.consume(self.body_avail.min(self.cb0.len()));
                leftover = self.cb0.len();
                let (a, b) = self.cb0.data_spans();
                let dst = self.head_span.start;
                self.ws.copy_within(a, dst);
                self.ws.copy_within(b, dst + a.len());
            }
            _ => panic!("start() while the current message is incomplete"),
        }

        self.clear_message();
        self.head_len = leftover;
        self.head_response = head_response;
        self.state = State::StartLine;
        trace!(leftover, "start message");
    }

    fn clear_message(&mut self) {
        self.parsed = 0;
        self.append_end = 0;
        self.have_header = false;
        self.target = Span::default();
        self.reason = Span::default();
        self.fields.clear();
        self.trailer_fields.clear();
        self.trailers_parsed = false;
        self.cb0 = Ring::new(self.cb0_span);
        self.cb1 = Ring::new(self.cb1_span);
        self.payload = Payload::Empty;
        self.payload_remain = 0;
        self.chunk_remain = 0;
        self.needs_chunk_close = false;
        self.body_avail = 0;
        self.body_total = 0;
        self.decoder = None;
        self.decoder_done = false;
        self.head_response = false;
    }

    /// Returns writable space for the transport to fill.
    ///
    /// During the header phase this is the tail of the header region;
    /// during the body it is the free space of the input ring. Empty
    /// ranges mean the parser is full: drain with
    /// [`consume_body`](Self::consume_body) or finish the message.
    ///
    /// # Panics
    ///
    /// Panics before [`start`](Self::start).
    pub fn prepare(&mut self) -> (&mut [u8], &mut [u8]) {
        match self.state {
            State::Reset => panic!("start() must be called before prepare()"),
            State::StartLine | State::Fields => {
                let head_len = self.head_len;
                let span = self.head_span;
                (&mut self.ws.slice_mut(span)[head_len..], &mut [])
            }
            State::Complete => (&mut [], &mut []),
            _ => {
                let cb0 = self.cb0;
                cb0.prepare(&mut self.ws)
            }
        }
    }

    /// Commits `n` bytes written into the last [`prepare`](Self::prepare).
    ///
    /// # Panics
    ///
    /// Panics if `n` exceeds the prepared space, after
    /// [`commit_eof`](Self::commit_eof), or before [`start`](Self::start).
    pub fn commit(&mut self, n: usize) {
        assert!(!self.got_eof || n == 0, "commit after eof");
        match self.state {
            State::Reset => panic!("start() must be called before commit()"),
            State::StartLine | State::Fields => {
                assert!(n <= self.head_span.len() - self.head_len, "commit exceeds prepare");
                self.head_len += n;
            }
            State::Complete => {
                assert!(n == 0, "commit exceeds prepare");
            }
            _ => self.cb0.commit(n),
        }
    }

    /// Signals that the transport will deliver no more bytes.
    pub fn commit_eof(&mut self) {
        assert!(self.state != State::Reset, "start() must be called before commit_eof()");
        self.got_eof = true;
    }

    /// Drives the state machine over the buffered input.
    ///
    /// # Returns
    ///
    /// - `Ok(Some(Advance::Headers))`: the header section completed in
    ///   this call and the body (if any) still needs input
    /// - `Ok(Some(Advance::Complete))`: the message is fully parsed
    /// - `Ok(Some(Advance::EndOfStream))`: EOF at a message boundary
    /// - `Ok(None)`: more input is required
    /// - `Err(_)`: a protocol violation; sticky until [`reset`](Self::reset)
    pub fn parse(&mut self) -> Result<Option<Advance>, ParseError> {
        if let Some(e) = &self.failed {
            return Err(e.clone());
        }
        match self.run() {
            Err(e) => {
                self.failed = Some(e.clone());
                Err(e)
            }
            ok => ok,
        }
    }

    fn run(&mut self) -> Result<Option<Advance>, ParseError> {
        let mut headers_done = false;
        loop {
            match self.state {
                State::Reset => panic!("start() must be called before parse()"),

                State::StartLine => {
                    match self.parse_start_line()? {
                        Some(next) => {
                            self.parsed = next;
                            self.state = State::Fields;
                        }
                        None => {
                            if self.got_eof && self.head_len == 0 {
                                trace!("stream closed cleanly");
                                self.state = State::Complete;
                                return Ok(Some(Advance::EndOfStream));
                            }
                            return self.need_header_bytes();
                        }
                    }
                }

                State::Fields => {
                    let buf_span = self.head_span;
                    loop {
                        let buf = &self.ws.slice(buf_span)[..self.head_len];
                        match field::next_field(buf, self.parsed)? {
                            Some(FieldEvent::Field { name, value, has_obs_fold, next }) => {
                                let id = FieldId::lookup(&buf[name.start..name.end]);
                                self.fields.push(FieldEntry { id, name, value, has_obs_fold });
                                self.parsed = next;
                            }
                            Some(FieldEvent::End { next }) => {
                                self.parsed = next;
                                break;
                            }
                            None => return self.need_header_bytes(),
                        }
                    }
                    // the terminator itself counts toward the cap
                    ensure!(
                        self.parsed <= self.cfg.max_header_bytes,
                        ParseError::header_too_large(self.parsed, self.cfg.max_header_bytes)
                    );
                    self.on_headers()?;
                    headers_done = true;
                    trace!(fields = self.fields.len(), state = ?self.state, "headers complete");
                }

                State::BodyLengthKnown => return self.run_length(headers_done),
                State::BodyUntilEof => return self.run_to_eof(headers_done),
                State::BodyChunkedSize | State::BodyChunkedData | State::BodyChunkedTrailers => {
                    return self.run_chunked(headers_done)
                }

                State::Complete => {
                    // an eof before any message leaves no header behind
                    return Ok(Some(if self.have_header {
                        Advance::Complete
                    } else {
                        Advance::EndOfStream
                    }));
                }
            }
        }
    }

    fn need_header_bytes(&mut self) -> Result<Option<Advance>, ParseError> {
        ensure!(
            self.head_len <= self.cfg.max_header_bytes,
            ParseError::header_too_large(self.head_len, self.cfg.max_header_bytes)
        );
        ensure!(!self.got_eof, ParseError::Incomplete);
        Ok(None)
    }

    /// More input is required; at EOF the message can never complete.
    fn need_body_bytes(&self, headers_done: bool) -> Result<Option<Advance>, ParseError> {
        if self.got_eof {
            return Err(ParseError::Incomplete);
        }
        self.pending(headers_done)
    }

    /// Parsing paused without error: on input, or on the caller draining
    /// the body view.
    fn pending(&self, headers_done: bool) -> Result<Option<Advance>, ParseError> {
        if headers_done {
            Ok(Some(Advance::Headers))
        } else {
            Ok(None)
        }
    }

    //--------------------------------------------------------------------
    // start line

    fn parse_start_line(&mut self) -> Result<Option<usize>, ParseError> {
        match self.kind {
            Kind::Request => self.parse_request_line(),
            Kind::Response => self.parse_status_line(),
        }
    }

    fn parse_request_line(&mut self) -> Result<Option<usize>, ParseError> {
        let buf = &self.ws.slice(self.head_span)[..self.head_len];

        // method = 1*tchar
        let mut i = 0;
        while i < buf.len() && chars::is_token(buf[i]) {
            i += 1;
        }
        if i == buf.len() {
            return Ok(None);
        }
        if i == 0 || buf[i] != b' ' {
            return Err(ParseError::BadMethod);
        }
        let method_end = i;
        i += 1;

        // request-target = 1*VCHAR (lexical extraction only)
        let target_start = i;
        while i < buf.len() && chars::is_vchar(buf[i]) {
            i += 1;
        }
        if i == buf.len() {
            return Ok(None);
        }
        if i == target_start || buf[i] != b' ' {
            return Err(ParseError::BadTarget);
        }
        let target = Span { start: target_start, end: i };
        i += 1;

        let (version, i) = match parse_version(buf, i)? {
            Some(v) => v,
            None => return Ok(None),
        };
        let i = match parse_crlf(buf, i, ParseError::BadVersion)? {
            Some(i) => i,
            None => return Ok(None),
        };

        self.method =
            Method::from_bytes(&buf[..method_end]).map_err(|_| ParseError::BadMethod)?;
        self.target = target;
        self.version = version;
        trace!(method = %self.method, "request line");
        Ok(Some(i))
    }

    fn parse_status_line(&mut self) -> Result<Option<usize>, ParseError> {
        let buf = &self.ws.slice(self.head_span)[..self.head_len];

        let (version, mut i) = match parse_version(buf, 0)? {
            Some(v) => v,
            None => return Ok(None),
        };
        if i >= buf.len() {
            return Ok(None);
        }
        if buf[i] != b' ' {
            return Err(ParseError::BadVersion);
        }
        i += 1;

        // status-code = 3DIGIT
        if buf.len() < i + 3 {
            return Ok(None);
        }
        let digits = &buf[i..i + 3];
        if !digits.iter().all(u8::is_ascii_digit) {
            return Err(ParseError::BadStatus);
        }
        let code = (digits[0] - b'0') as u16 * 100
            + (digits[1] - b'0') as u16 * 10
            + (digits[2] - b'0') as u16;
        let status = StatusCode::from_u16(code).map_err(|_| ParseError::BadStatus)?;
        i += 3;

        // SP reason-phrase, both optional on lenient peers
        if i >= buf.len() {
            return Ok(None);
        }
        let reason_start;
        if buf[i] == b' ' {
            i += 1;
            reason_start = i;
            while i < buf.len() {
                let c = buf[i];
                if c == b'\r' || c == b'\n' {
                    break;
                }
                if !(chars::is_field_value(c)) {
                    return Err(ParseError::BadReason);
                }
                i += 1;
            }
            if i >= buf.len() {
                return Ok(None);
            }
        } else {
            reason_start = i;
        }
        let reason = Span { start: reason_start, end: i };

        let i = match parse_crlf(buf, i, ParseError::BadStatus)? {
            Some(i) => i,
            None => return Ok(None),
        };

        self.version = version;
        self.status = status;
        self.reason = reason;
        trace!(status = %status, "status line");
        Ok(Some(i))
    }

    //--------------------------------------------------------------------
    // header completion and body routing

    fn on_headers(&mut self) -> Result<(), ParseError> {
        let overread = self.head_len - self.parsed;
        self.append_end = self.head_len;
        self.have_header = true;

        let payload = self.route_payload()?;
        if let Payload::Size(n) = payload {
            if n > self.cfg.max_body_bytes {
                return Err(ParseError::BodyTooLarge { max: self.cfg.max_body_bytes });
            }
        }

        // bytes past the header move from the header region to the input
        // ring; they are body bytes or the next pipelined message
        self.cb0 = Ring::new(self.cb0_span);
        if overread > 0 {
            let src =
                Span { start: self.head_span.start + self.parsed, end: self.head_span.start + self.head_len };
            self.ws.copy_within(src, self.cb0_span.start);
            self.cb0 = Ring::with_content(self.cb0_span, overread);
        }
        self.cb1 = Ring::new(self.cb1_span);

        if payload != Payload::Empty {
            self.decoder = self.select_decoder();
        }

        self.payload = payload;
        self.state = match payload {
            Payload::Empty => State::Complete,
            Payload::Size(n) => {
                self.payload_remain = n;
                State::BodyLengthKnown
            }
            Payload::Chunked => {
                self.chunk_remain = 0;
                self.needs_chunk_close = false;
                State::BodyChunkedSize
            }
            Payload::ToEof => State::BodyUntilEof,
        };
        Ok(())
    }

    fn route_payload(&self) -> Result<Payload, ParseError> {
        if self.kind == Kind::Response {
            let code = self.status.as_u16();
            if self.head_response || code / 100 == 1 || code == 204 || code == 304 {
                return Ok(Payload::Empty);
            }
        }

        let fields = self.fields_view();
        let has_te = fields.exists(FieldId::TransferEncoding);
        let has_cl = fields.exists(FieldId::ContentLength);

        if has_te {
            let chunked = last_coding_is_chunked(&fields);
            return match self.kind {
                Kind::Request => {
                    if has_cl {
                        // RFC 7230 §3.3.3: requests carrying both are refused
                        Err(ParseError::bad_transfer_encoding(
                            "transfer-encoding and content-length both present",
                        ))
                    } else if chunked {
                        Ok(Payload::Chunked)
                    } else {
                        Err(ParseError::bad_transfer_encoding("final coding is not chunked"))
                    }
                }
                Kind::Response => {
                    // prefer chunked over content-length, read to EOF otherwise
                    if chunked {
                        Ok(Payload::Chunked)
                    } else {
                        Ok(Payload::ToEof)
                    }
                }
            };
        }

        if has_cl {
            let mut agreed: Option<u64> = None;
            for f in fields.find_all(FieldId::ContentLength) {
                // Content-Length = 1*DIGIT; sign characters and inner
                // whitespace are refused outright
                if f.value.is_empty() || !f.value.iter().all(u8::is_ascii_digit) {
                    return Err(ParseError::bad_content_length(format!(
                        "value {:?} is not 1*DIGIT",
                        String::from_utf8_lossy(f.value)
                    )));
                }
                // all digits, so the bytes are ASCII and parse can only overflow
                let text = std::str::from_utf8(f.value).unwrap();
                let n = text.parse::<u64>().map_err(|_| {
                    ParseError::bad_content_length(format!("value {text} overflows u64"))
                })?;
                match agreed {
                    None => agreed = Some(n),
                    Some(prev) if prev != n => {
                        return Err(ParseError::bad_content_length("conflicting values"))
                    }
                    Some(_) => {}
                }
            }
            return Ok(Payload::Size(agreed.expect("at least one content-length")));
        }

        Ok(match self.kind {
            Kind::Request => Payload::Empty,
            Kind::Response => Payload::ToEof,
        })
    }

    fn select_decoder(&self) -> Option<Box<dyn Codec>> {
        let ctx = self.ctx.as_ref()?;
        let fields = self.fields_view();
        let raw = fields.find(FieldId::ContentEncoding)?.value;
        let coding = std::str::from_utf8(raw).ok()?.rsplit(',').next()?.trim();
        if coding.is_empty() || coding.eq_ignore_ascii_case("identity") {
            return None;
        }
        let dec = ctx.decoder(coding);
        if dec.is_some() {
            trace!(coding, "decoding body");
        }
        dec
    }

    fn fields_view(&self) -> Fields<'_> {
        Fields::new(&self.ws.slice(self.head_span)[..self.append_end], &self.fields)
    }

    //--------------------------------------------------------------------
    // body

    fn run_length(&mut self, headers_done: bool) -> Result<Option<Advance>, ParseError> {
        if self.decoder.is_some() {
            let remain = usize::try_from(self.payload_remain).unwrap_or(usize::MAX);
            let r = self.pump_decoder(remain, true)?;
            self.payload_remain -= r.consumed as u64;
            if r.done {
                if self.payload_remain > 0 {
                    return Err(ParseError::bad_encoding("encoded body ended early"));
                }
                trace!("decoded body complete");
                self.state = State::Complete;
                return Ok(Some(Advance::Complete));
            }
            if self.got_eof && self.cb0.is_empty() && self.payload_remain > 0 {
                return Err(ParseError::Incomplete);
            }
            // otherwise the decoder is stalled on a full body view
            return self.pending(headers_done);
        }

        let new = (self.cb0.len() - self.body_avail).min(
            usize::try_from(self.payload_remain).unwrap_or(usize::MAX),
        );
        self.body_avail += new;
        self.body_total += new as u64;
        self.payload_remain -= new as u64;
        if self.payload_remain == 0 {
            trace!(total = self.body_total, "body complete");
            self.state = State::Complete;
            return Ok(Some(Advance::Complete));
        }
        self.need_body_bytes(headers_done)
    }

    fn run_to_eof(&mut self, headers_done: bool) -> Result<Option<Advance>, ParseError> {
        if self.decoder.is_some() {
            let avail = self.cb0.len();
            self.pump_decoder(avail, self.got_eof)?;
            if self.decoder_done && !self.cb0.is_empty() {
                return Err(ParseError::bad_encoding("bytes after encoded body"));
            }
            if self.got_eof && self.decoder_done {
                self.state = State::Complete;
                return Ok(Some(Advance::Complete));
            }
            // when eof arrived but the flush is stalled on a full body
            // view, the caller drains it and parses again
            return self.pending(headers_done);
        }

        let new = self.cb0.len() - self.body_avail;
        self.body_avail += new;
        self.body_total += new as u64;
        if self.body_total > self.cfg.max_body_bytes {
            return Err(ParseError::BodyTooLarge { max: self.cfg.max_body_bytes });
        }
        if self.got_eof {
            trace!(total = self.body_total, "body complete at eof");
            self.state = State::Complete;
            return Ok(Some(Advance::Complete));
        }
        self.pending(headers_done)
    }

    //--------------------------------------------------------------------
    // decoding

    fn pump_decoder(&mut self, input_limit: usize, finish: bool) -> Result<Pump, ParseError> {
        let mut result = Pump::default();
        loop {
            let cb0 = self.cb0;
            let cb1 = self.cb1;
            let (s0, s1) = self.ws.pair_mut(cb0.span(), cb1.span());
            let (src_a, src_b) = cb0.data_in(s0);
            let src = if src_a.is_empty() { src_b } else { src_a };
            let limit_now = input_limit - result.consumed;
            let src = &src[..src.len().min(limit_now)];
            let (dst_a, dst_b) = cb1.prepare_in(s1);
            let dst = if dst_a.is_empty() { dst_b } else { dst_a };

            if dst.is_empty() {
                // the caller must drain the body view before more
                // decoded bytes can land
                break;
            }
            if src.is_empty() && !finish {
                break;
            }
            let finishing = finish && src.len() == limit_now;

            let decoder = self.decoder.as_mut().expect("pump without decoder");
            let step = decoder
                .transform(src, dst, finishing)
                .map_err(|e| ParseError::bad_encoding(e.reason))?;

            self.cb0.consume(step.consumed);
            self.cb1.commit(step.produced);
            result.consumed += step.consumed;
            result.produced += step.produced;
            self.body_total += step.produced as u64;
            if self.body_total > self.cfg.max_body_bytes {
                return Err(ParseError::BodyTooLarge { max: self.cfg.max_body_bytes });
            }
            if step.done {
                result.done = true;
                self.decoder_done = true;
                break;
            }
            if step.consumed == 0 && step.produced == 0 {
                break;
            }
        }
        if result.consumed > 0 || result.produced > 0 {
            trace!(consumed = result.consumed, produced = result.produced, "decode pump");
        }
        Ok(result)
    }

    //--------------------------------------------------------------------
    // views

    /// Returns whether the complete header was parsed.
    pub fn has_header(&self) -> bool {
        self.have_header
    }

    /// Returns `true` once the current message is fully parsed.
    pub fn is_done(&self) -> bool {
        self.state == State::Complete && self.failed.is_none()
    }

    /// The header view, once the header section has completed.
    ///
    /// Values that carried obsolete line folds are returned raw; use
    /// [`get_flat`](Self::get_flat) for the rewritten form.
    pub fn get(&self) -> Option<Header<'_>> {
        if !self.have_header {
            return None;
        }
        let buf = &self.ws.slice(self.head_span)[..self.append_end];
        Some(Header {
            buf,
            kind: self.kind,
            method: &self.method,
            target: self.target,
            version: self.version,
            status: self.status,
            reason: self.reason,
            fields: Fields::new(buf, &self.fields),
        })
    }

    /// The header view with every folded value flattened in place.
    ///
    /// The rewrite replaces the CR LF of each fold with two spaces, once
    /// per field; subsequent calls are free.
    pub fn get_flat(&mut self) -> Option<Header<'_>> {
        if !self.have_header {
            return None;
        }
        let buf = self.ws.slice_mut(self.head_span);
        for entry in self.fields.iter_mut().chain(self.trailer_fields.iter_mut()) {
            if entry.has_obs_fold {
                field::flatten_folds(&mut buf[entry.value.start..entry.value.end]);
                entry.has_obs_fold = false;
            }
        }
        self.get()
    }

    /// The trailer fields of a chunked message, once it is complete.
    pub fn trailers(&self) -> Option<Fields<'_>> {
        if !self.trailers_parsed {
            return None;
        }
        let buf = &self.ws.slice(self.head_span)[..self.append_end];
        Some(Fields::new(buf, &self.trailer_fields))
    }

    /// Decoded body bytes currently buffered, as up to two ranges.
    pub fn body(&self) -> (&[u8], &[u8]) {
        if self.buffered_body() {
            self.cb1.data(&self.ws)
        } else {
            let (a, b) = self.cb0.data(&self.ws);
            // only counted bytes are body; the rest is the next message
            let n = self.body_avail;
            if n <= a.len() {
                (&a[..n], &[])
            } else {
                (a, &b[..n - a.len()])
            }
        }
    }

    /// Releases `n` bytes of the body view, freeing buffer space.
    pub fn consume_body(&mut self, n: usize) {
        if self.buffered_body() {
            self.cb1.consume(n);
        } else {
            let n = n.min(self.body_avail);
            self.cb0.consume(n);
            self.body_avail -= n;
        }
    }

    fn buffered_body(&self) -> bool {
        self.decoder.is_some() || self.payload == Payload::Chunked
    }

    // shared with the chunked submodule
    fn body_cap_add(&mut self, n: usize) -> Result<(), ParseError> {
        self.body_total += n as u64;
        if self.body_total > self.cfg.max_body_bytes {
            return Err(ParseError::BodyTooLarge { max: self.cfg.max_body_bytes });
        }
        Ok(())
    }
}

#[derive(Debug, Default, Clone, Copy)]
struct Pump {
    consumed: usize,
    produced: usize,
    done: bool,
}

fn parse_version(buf: &[u8], at: usize) -> Result<Option<(Version, usize)>, ParseError> {
    if buf.len() < at + 8 {
        // an early mismatch is reported without waiting for 8 bytes
        let have = &buf[at..];
        if !b"HTTP/".starts_with(&have[..have.len().min(5)]) {
            return Err(ParseError::BadVersion);
        }
        return Ok(None);
    }
    if &buf[at..at + 5] != b"HTTP/" {
        return Err(ParseError::BadVersion);
    }
    let version = match &buf[at + 5..at + 8] {
        b"1.1" => Version::HTTP_11,
        b"1.0" => Version::HTTP_10,
        _ => return Err(ParseError::BadVersion),
    };
    Ok(Some((version, at + 8)))
}

fn parse_crlf(buf: &[u8], at: usize, on_garbage: ParseError) -> Result<Option<usize>, ParseError> {
    if at >= buf.len() {
        return Ok(None);
    }
    if buf[at] == b'\n' {
        return Err(ParseError::BadLineEnding);
    }
    if buf[at] != b'\r' {
        return Err(on_garbage);
    }
    if at + 1 >= buf.len() {
        return Ok(None);
    }
    if buf[at + 1] != b'\n' {
        return Err(ParseError::BadLineEnding);
    }
    Ok(Some(at + 2))
}

fn last_coding_is_chunked(fields: &Fields<'_>) -> bool {
    fields
        .find_all(FieldId::TransferEncoding)
        .last()
        .and_then(|f| std::str::from_utf8(f.value).ok())
        .and_then(|encodings| encodings.rsplit(',').next())
        .map(|last| last.trim().eq_ignore_ascii_case("chunked"))
        .unwrap_or(false)
}

#[cfg(test)]
mod tests;
