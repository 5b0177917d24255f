//! Chunked transfer-coding states of the parser.
//!
//! Decodes the framing of [RFC 7230 Section
//! 4.1](https://tools.ietf.org/html/rfc7230#section-4.1): a sequence of
//! hex-sized chunks, a zero-sized terminator, and an optional trailer
//! section. Chunk extensions are skipped; a bare LF anywhere in the
//! framing is rejected. Each framing element is scanned in full over the
//! input ring before any byte is consumed, so an interrupted element
//! simply rescans when more input arrives.

use tracing::trace;

use super::{Advance, Parser, State};
use crate::chars;
use crate::ensure;
use crate::error::ParseError;
use crate::header::field::{next_field, FieldEvent};
use crate::header::name::FieldId;
use crate::header::table::FieldEntry;
use crate::workspace::Span;

/// Read-only cursor over the two readable ranges of a ring.
struct Cursor<'a> {
    a: &'a [u8],
    b: &'a [u8],
    pos: usize,
}

impl<'a> Cursor<'a> {
    fn new(a: &'a [u8], b: &'a [u8]) -> Self {
        Self { a, b, pos: 0 }
    }

    fn pos(&self) -> usize {
        self.pos
    }

    fn peek(&self) -> Option<u8> {
        if self.pos < self.a.len() {
            Some(self.a[self.pos])
        } else {
            self.b.get(self.pos - self.a.len()).copied()
        }
    }

    fn bump(&mut self) {
        self.pos += 1;
    }

    fn take(&mut self) -> Option<u8> {
        let c = self.peek()?;
        self.bump();
        Some(c)
    }
}

impl Parser {
    pub(super) fn run_chunked(
        &mut self,
        headers_done: bool,
    ) -> Result<Option<Advance>, ParseError> {
        loop {
            match self.state {
                State::BodyChunkedSize => match self.take_chunk_header()? {
                    None => return self.need_body_bytes(headers_done),
                    Some(0) => {
                        trace!("last chunk");
                        self.state = State::BodyChunkedTrailers;
                    }
                    Some(size) => {
                        trace!(size, "chunk header");
                        self.chunk_remain = size;
                        self.state = State::BodyChunkedData;
                    }
                },

                State::BodyChunkedData => {
                    let moved = self.move_chunk_payload()?;
                    if self.chunk_remain == 0 {
                        self.state = State::BodyChunkedSize;
                        continue;
                    }
                    if moved == 0 {
                        if self.cb0.is_empty() {
                            return self.need_body_bytes(headers_done);
                        }
                        // the body view is full; the caller drains it
                        return self.pending(headers_done);
                    }
                }

                State::BodyChunkedTrailers => {
                    if !self.trailers_parsed {
                        if !self.take_trailers()? {
                            return self.need_body_bytes(headers_done);
                        }
                    }
                    if self.decoder.is_some() && !self.decoder_done {
                        let flush = self.pump_decoder(0, true)?;
                        if !flush.done {
                            // stalled on a full body view
                            return self.pending(headers_done);
                        }
                    }
                    trace!(total = self.body_total, "chunked body complete");
                    self.state = State::Complete;
                    return Ok(Some(Advance::Complete));
                }

                _ => unreachable!("run_chunked outside chunked states"),
            }
        }
    }

    /// Scans one chunk-size line, consuming it only when complete.
    ///
    /// Returns the chunk size, or `None` when the line is still partial.
    fn take_chunk_header(&mut self) -> Result<Option<u64>, ParseError> {
        let (a, b) = self.cb0.data(&self.ws);
        let mut cur = Cursor::new(a, b);

        // the CRLF closing the previous chunk's data
        if self.needs_chunk_close {
            match cur.take() {
                None => return Ok(None),
                Some(b'\r') => {}
                Some(_) => return Err(ParseError::bad_chunk("missing CR after chunk data")),
            }
            match cur.take() {
                None => return Ok(None),
                Some(b'\n') => {}
                Some(_) => return Err(ParseError::bad_chunk("missing LF after chunk data")),
            }
        }

        // chunk-size = 1*HEXDIG
        let mut size: u64 = 0;
        let mut digits = 0usize;
        loop {
            let Some(c) = cur.peek() else { return Ok(None) };
            match chars::hex_digit(c) {
                Some(v) => {
                    if size > u64::MAX >> 4 {
                        return Err(ParseError::bad_chunk("chunk size overflow"));
                    }
                    size = (size << 4) | v;
                    digits += 1;
                    cur.bump();
                }
                None => break,
            }
        }
        if digits == 0 {
            return Err(ParseError::bad_chunk("invalid chunk size"));
        }

        // optional whitespace, then extensions up to the CRLF; nothing in
        // an extension is interpreted, but a bare LF is still refused
        let mut in_extension = false;
        loop {
            let Some(c) = cur.take() else { return Ok(None) };
            match c {
                b'\r' => match cur.take() {
                    None => return Ok(None),
                    Some(b'\n') => break,
                    Some(_) => return Err(ParseError::bad_chunk("missing LF in chunk size line")),
                },
                b'\n' => return Err(ParseError::bad_chunk("bare LF in chunk size line")),
                b'\t' | b' ' if !in_extension => {}
                b';' => in_extension = true,
                _ if in_extension => {}
                _ => return Err(ParseError::bad_chunk("invalid chunk size line")),
            }
        }

        self.cb0.consume(cur.pos());
        self.needs_chunk_close = true;
        Ok(Some(size))
    }

    /// Moves chunk payload from the input ring toward the body view,
    /// through the decoder when one is installed.
    ///
    /// Returns the number of input bytes moved.
    fn move_chunk_payload(&mut self) -> Result<usize, ParseError> {
        if self.decoder.is_some() {
            let limit = usize::try_from(self.chunk_remain)
                .unwrap_or(usize::MAX)
                .min(self.cb0.len());
            let pumped = self.pump_decoder(limit, false)?;
            self.chunk_remain -= pumped.consumed as u64;
            return Ok(pumped.consumed);
        }

        let total = usize::try_from(self.chunk_remain)
            .unwrap_or(usize::MAX)
            .min(self.cb0.len())
            .min(self.cb1.free());
        let mut left = total;
        while left > 0 {
            let (da, _) = self.cb0.data_spans();
            let src = da;
            let (fa, _) = self.cb1.free_spans();
            let dst = fa;
            let n = left.min(src.len()).min(dst.len());
            debug_assert!(n > 0);
            self.ws.copy_within(Span { start: src.start, end: src.start + n }, dst.start);
            self.cb0.consume(n);
            self.cb1.commit(n);
            left -= n;
        }
        self.chunk_remain -= total as u64;
        self.body_cap_add(total)?;
        Ok(total)
    }

    /// Scans the trailer section, consuming and tokenizing it only once
    /// it is complete.
    fn take_trailers(&mut self) -> Result<bool, ParseError> {
        let (a, b) = self.cb0.data(&self.ws);
        let mut cur = Cursor::new(a, b);

        // find the terminating empty line before touching anything
        let section_len = loop {
            match cur.peek() {
                None => return Ok(false),
                Some(b'\r') => {
                    cur.bump();
                    match cur.take() {
                        None => return Ok(false),
                        Some(b'\n') => break cur.pos(),
                        Some(_) => return Err(ParseError::bad_chunk("bare CR in trailers")),
                    }
                }
                Some(_) => {
                    // skip one trailer line
                    loop {
                        match cur.take() {
                            None => return Ok(false),
                            Some(b'\r') => match cur.take() {
                                None => return Ok(false),
                                Some(b'\n') => break,
                                Some(_) => {
                                    return Err(ParseError::bad_chunk("bare CR in trailers"))
                                }
                            },
                            Some(b'\n') => {
                                return Err(ParseError::bad_chunk("bare LF in trailers"))
                            }
                            Some(_) => {}
                        }
                    }
                }
            }
        };

        // the trailer section shares the header region and its size cap
        ensure!(
            section_len <= self.cfg.max_header_bytes
                && self.append_end + section_len <= self.head_span.len(),
            ParseError::header_too_large(self.append_end + section_len, self.cfg.max_header_bytes)
        );

        // copy into the header region appendix, then tokenize in place
        let dst = self.head_span.start + self.append_end;
        let (sa, sb) = self.cb0.data_spans();
        let first = section_len.min(sa.len());
        self.ws.copy_within(Span { start: sa.start, end: sa.start + first }, dst);
        if section_len > first {
            let rest = section_len - first;
            self.ws.copy_within(Span { start: sb.start, end: sb.start + rest }, dst + first);
        }
        self.cb0.consume(section_len);

        let start = self.append_end;
        self.append_end += section_len;
        let buf = &self.ws.slice(self.head_span)[..self.append_end];
        let mut at = start;
        loop {
            match next_field(buf, at)? {
                Some(FieldEvent::Field { name, value, has_obs_fold, next }) => {
                    let id = FieldId::lookup(&buf[name.start..name.end]);
                    self.trailer_fields.push(FieldEntry { id, name, value, has_obs_fold });
                    at = next;
                }
                Some(FieldEvent::End { .. }) => break,
                None => unreachable!("trailer section was scanned as complete"),
            }
        }
        trace!(trailers = self.trailer_fields.len(), "trailer section complete");
        self.trailers_parsed = true;
        Ok(true)
    }
}
