//! HTTP/1 message serializer.
//!
//! Composes one complete message per `start_*` call: a rendered [`Head`]
//! plus a body supplied as inline buffers, a pull [`Source`], or direct
//! writes through a [`Stream`] handle. [`Serializer::prepare`] exposes an
//! ordered sequence of byte ranges ready for transmission;
//! [`Serializer::consume`] reports how much of it was sent and releases
//! staging space.
//!
//! Body bytes flow through up to three optional stages, each skipped
//! when not required:
//!
//! ```text
//! source/stream -> tmp0 -> encoder -> tmp1 -> chunked framer -> output
//! ```
//!
//! Chunked frames are assembled around the body bytes in place: every
//! staged chunk reserves a fixed headroom so the size line and CRLFs fit
//! with no second copy. The serializer never exposes malformed output;
//! failures surface from `start_*` or stop cleanly at a frame boundary.

use std::collections::VecDeque;
use std::sync::Arc;

use bytes::Bytes;
use tracing::trace;

use crate::codec::Codec;
use crate::context::Context;
use crate::ensure;
use crate::error::SendError;
use crate::head::{BodyLayout, Head};
use crate::source::Source;
use crate::workspace::{Span, Workspace};

// 16-digit size + CRLF + CRLF per chunk, "0" CRLF CRLF once at the end
const CHUNKED_OVERHEAD: usize = 16 + 2 + 2 + 1 + 2 + 2;
const CHUNK_PREFIX: usize = 16 + 2;
const CHUNK_SUFFIX: usize = 2;
const CRLF: &[u8] = b"\r\n";
const LAST_CHUNK: &[u8] = b"0\r\n\r\n";

const DEFAULT_BUFFER: usize = 16 * 1024;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Style {
    Empty,
    Buffers,
    Source,
    Stream,
}

#[derive(Debug, Clone, Copy)]
enum Slot {
    /// The rendered head bytes.
    Head,
    /// One caller-supplied body buffer.
    Buf(usize),
    /// Staged bytes in the workspace.
    Ws(Span),
    /// A fixed framing literal.
    Lit(&'static [u8]),
}

/// A serializer for HTTP/1 messages.
///
/// One instance serializes any number of messages in sequence; each
/// message begins with a `start_*` call and ends when
/// [`is_done`](Self::is_done) reports true.
pub struct Serializer {
    ctx: Option<Arc<Context>>,
    ws: Workspace,

    tmp0: Span,
    tmp1: Span,
    tmp0_read: usize,
    tmp0_write: usize,
    tmp1_write: usize,

    out: VecDeque<Slot>,
    out_pos: usize,

    head: Bytes,
    bufs: Vec<Bytes>,
    src: Option<Box<dyn Source>>,
    encoder: Option<Box<dyn Codec>>,

    style: Option<Style>,
    layout: BodyLayout,
    chunked: bool,
    expect_continue: bool,
    resumed: bool,

    more: bool,
    encoder_done: bool,
    body_done: bool,
    done: bool,
    sent_body: u64,

    stream_off: usize,
    stream_pending: usize,
    stream_closed: bool,
}

impl Serializer {
    /// Creates a serializer with the default staging size.
    pub fn new() -> Self {
        Self::with_buffer(DEFAULT_BUFFER)
    }

    /// Creates a serializer with `buffer_bytes` of staging storage.
    ///
    /// The storage is allocated once and carved per message; it bounds
    /// how much body data can be in flight between `prepare` and
    /// `consume`.
    pub fn with_buffer(buffer_bytes: usize) -> Self {
        Self::build(buffer_bytes, None)
    }

    /// Creates a serializer that resolves content codings against `ctx`.
    pub fn with_context(buffer_bytes: usize, ctx: Arc<Context>) -> Self {
        Self::build(buffer_bytes, Some(ctx))
    }

    fn build(buffer_bytes: usize, ctx: Option<Arc<Context>>) -> Self {
        Self {
            ctx,
            ws: Workspace::new(buffer_bytes),
            tmp0: Span::default(),
            tmp1: Span::default(),
            tmp0_read: 0,
            tmp0_write: 0,
            tmp1_write: 0,
            out: VecDeque::new(),
            out_pos: 0,
            head: Bytes::new(),
            bufs: Vec::new(),
            src: None,
            encoder: None,
            style: None,
            layout: BodyLayout::Empty,
            chunked: false,
            expect_continue: false,
            resumed: false,
            more: false,
            encoder_done: false,
            body_done: false,
            done: false,
            sent_body: 0,
            stream_off: 0,
            stream_pending: 0,
            stream_closed: false,
        }
    }

    /// Prepares the serializer for a new stream, abandoning any message
    /// in flight.
    pub fn reset(&mut self) {
        self.ws.clear();
        self.tmp0 = Span::default();
        self.tmp1 = Span::default();
        self.tmp0_read = 0;
        self.tmp0_write = 0;
        self.tmp1_write = 0;
        self.out.clear();
        self.out_pos = 0;
        self.head = Bytes::new();
        self.bufs.clear();
        self.src = None;
        self.encoder = None;
        self.style = None;
        self.layout = BodyLayout::Empty;
        self.chunked = false;
        self.expect_continue = false;
        self.resumed = false;
        self.more = false;
        self.encoder_done = false;
        self.body_done = false;
        self.done = false;
        self.sent_body = 0;
        self.stream_off = 0;
        self.stream_pending = 0;
        self.stream_closed = false;
    }

    /// Serializes a message without a body.
    ///
    /// With a chunked layout the body is a lone last-chunk; with a
    /// declared length the header is sent as-is and no body follows, as
    /// a HEAD response requires.
    pub fn start_empty(&mut self, head: &Head) -> Result<(), SendError> {
        self.start_init(head, Style::Empty)?;
        Ok(())
    }

    /// Serializes a message whose body is the concatenation of `bufs`.
    ///
    /// The buffers are referenced in place, never copied. With a
    /// declared length, the total must match it exactly; the mismatch is
    /// reported here, before any output exists.
    pub fn start_buffers<I>(&mut self, head: &Head, bufs: I) -> Result<(), SendError>
    where
        I: IntoIterator<Item = Bytes>,
    {
        let bufs: Vec<Bytes> = bufs.into_iter().collect();
        let total: u64 = bufs.iter().map(|b| b.len() as u64).sum();
        match head.layout() {
            BodyLayout::Length(n) if n != total => {
                return Err(SendError::body_length(format!(
                    "buffers hold {total} bytes, head declares {n}"
                )))
            }
            BodyLayout::Empty if total != 0 => {
                return Err(SendError::body_length("buffers present with no declared body"))
            }
            _ => {}
        }
        self.start_init(head, Style::Buffers)?;

        if self.chunked {
            // each buffer needs a staged size line
            let need: usize =
                bufs.iter().filter(|b| !b.is_empty()).map(|b| hex_len(b.len()) + 2).sum();
            if need > self.tmp0.len() {
                self.reset();
                return Err(SendError::WorkspaceExhausted);
            }
        }
        self.bufs = bufs;
        Ok(())
    }

    /// Serializes a message whose body is pulled from `src`.
    ///
    /// The head must declare a length or the chunked coding. When the
    /// head names a content coding registered on the context, body bytes
    /// are routed through a fresh encoder instance.
    pub fn start_source<S>(&mut self, head: &Head, src: S) -> Result<(), SendError>
    where
        S: Source + 'static,
    {
        if head.layout().is_empty() {
            return Err(SendError::body_length("a body source needs a declared body"));
        }
        let mut src = Box::new(src);
        let hint = src.maybe_reserve();
        self.start_init_with(head, Style::Source, hint)?;
        self.src = Some(src);
        self.more = true;
        Ok(())
    }

    /// Serializes a message whose body the caller writes directly.
    ///
    /// Obtain the write handle with [`stream`](Self::stream) after this
    /// call returns.
    pub fn start_stream(&mut self, head: &Head) -> Result<(), SendError> {
        if head.layout().is_empty() {
            return Err(SendError::body_length("a body stream needs a declared body"));
        }
        self.start_init(head, Style::Stream)?;
        self.more = true;
        Ok(())
    }

    fn start_init(&mut self, head: &Head, style: Style) -> Result<(), SendError> {
        self.start_init_with(head, style, None)
    }

    fn start_init_with(
        &mut self,
        head: &Head,
        style: Style,
        reserve_hint: Option<usize>,
    ) -> Result<(), SendError> {
        assert!(
            self.style.is_none() || self.done,
            "start while the previous message is incomplete"
        );
        self.reset();

        self.head = head.bytes().clone();
        self.layout = head.layout();
        self.chunked = self.layout.is_chunked();
        self.expect_continue = head.is_expect_continue();

        // encoder applies to produced bodies only; inline buffers are
        // taken as already encoded
        if matches!(style, Style::Source | Style::Stream) {
            if let (Some(ctx), Some(coding)) = (self.ctx.as_ref(), head.content_coding()) {
                self.encoder = ctx.encoder(coding);
                if self.encoder.is_some() {
                    trace!(coding, "encoding body");
                }
            }
        }

        // staging: all of it for the raw side, split when an encoder
        // needs a post-encoding area
        let avail = self.ws.remaining();
        let (n0, n1) = if self.encoder.is_some() {
            (avail / 2, avail - avail / 2)
        } else {
            let n0 = match reserve_hint {
                Some(hint) => (hint + CHUNKED_OVERHEAD).clamp(512.min(avail), avail),
                None => avail,
            };
            (n0, 0)
        };
        self.tmp0 = self.ws.alloc(n0).map_err(|_| SendError::WorkspaceExhausted)?;
        self.tmp1 = self.ws.alloc(n1).map_err(|_| SendError::WorkspaceExhausted)?;

        self.style = Some(style);
        self.out.push_back(Slot::Head);
        trace!(?style, layout = ?self.layout, "start message");
        Ok(())
    }

    /// Returns `true` when the whole message has been consumed.
    pub fn is_done(&self) -> bool {
        self.done
    }

    /// Returns `true` while body emission is paused for `Expect:
    /// 100-continue`.
    ///
    /// The pause begins once the header bytes are consumed and lasts
    /// until [`resume`](Self::resume); driving the interim response is
    /// the caller's contract with its peer.
    pub fn is_expect_continue(&self) -> bool {
        self.expect_continue && !self.resumed
    }

    /// Releases the expect-continue pause.
    pub fn resume(&mut self) {
        self.resumed = true;
    }

    /// The stream write handle of a message started with
    /// [`start_stream`](Self::start_stream).
    ///
    /// # Panics
    ///
    /// Panics for any other body style.
    pub fn stream(&mut self) -> Stream<'_> {
        assert_eq!(self.style, Some(Style::Stream), "stream() needs start_stream()");
        Stream { sr: self }
    }

    /// Serializes pending content and returns the output ranges.
    ///
    /// The ranges are valid until [`consume`](Self::consume) is called.
    /// An empty output means the serializer is waiting: for an
    /// expect-continue [`resume`](Self::resume), for stream writes, or
    /// for [`consume`](Self::consume) to free staging space.
    ///
    /// # Panics
    ///
    /// Panics before any `start_*` call.
    pub fn prepare(&mut self) -> Result<Output<'_>, SendError> {
        assert!(self.style.is_some(), "start must be called before prepare()");
        if !self.done && !self.is_expect_continue() {
            self.stage_body()?;
        }

        let mut slices = Vec::with_capacity(self.out.len());
        for (i, slot) in self.out.iter().enumerate() {
            let bytes = self.slot_bytes(slot);
            let bytes = if i == 0 { &bytes[self.out_pos..] } else { bytes };
            if !bytes.is_empty() {
                slices.push(bytes);
            }
        }
        Ok(Output { slices })
    }

    /// Records `n` transmitted bytes and releases them.
    ///
    /// # Panics
    ///
    /// Panics if `n` exceeds the currently prepared output.
    pub fn consume(&mut self, mut n: usize) {
        while n > 0 {
            let front = self.out.front().expect("consume exceeds prepared output");
            let len = self.slot_bytes(front).len();
            let take = n.min(len - self.out_pos);
            self.out_pos += take;
            n -= take;
            if self.out_pos == len {
                self.out.pop_front();
                self.out_pos = 0;
            }
        }

        // staging is recycled once nothing references it
        if self.out.is_empty() && self.raw_pending() == 0 {
            self.tmp0_read = 0;
            self.tmp0_write = 0;
            self.tmp1_write = 0;
        }

        if self.out.is_empty() && self.body_done {
            self.done = true;
            trace!("message complete");
        }
    }

    fn slot_bytes(&self, slot: &Slot) -> &[u8] {
        match slot {
            Slot::Head => self.head.as_ref(),
            Slot::Buf(i) => self.bufs[*i].as_ref(),
            Slot::Ws(span) => self.ws.slice(*span),
            Slot::Lit(bytes) => bytes,
        }
    }

    fn raw_pending(&self) -> usize {
        match self.style {
            Some(Style::Stream) => self.stream_pending,
            Some(Style::Source) => self.tmp0_write - self.tmp0_read,
            _ => 0,
        }
    }

    //--------------------------------------------------------------------
    // body staging

    fn stage_body(&mut self) -> Result<(), SendError> {
        if self.body_done {
            return Ok(());
        }
        match self.style.expect("staging before start") {
            Style::Empty => {
                if self.chunked {
                    self.out.push_back(Slot::Lit(LAST_CHUNK));
                }
                self.body_done = true;
            }
            Style::Buffers => self.stage_buffers(),
            Style::Source => {
                if self.encoder.is_some() {
                    self.pump_source_encoded()?;
                } else {
                    self.pump_source_plain()?;
                }
            }
            Style::Stream => {
                if self.encoder.is_some() {
                    self.pump_stream_encoded()?;
                } else {
                    self.pump_stream_plain()?;
                }
            }
        }
        Ok(())
    }

    fn stage_buffers(&mut self) {
        for i in 0..self.bufs.len() {
            let len = self.bufs[i].len();
            if len == 0 {
                continue;
            }
            if self.chunked {
                let line = self.stage_size_line(len);
                self.out.push_back(Slot::Ws(line));
                self.out.push_back(Slot::Buf(i));
                self.out.push_back(Slot::Lit(CRLF));
            } else {
                self.out.push_back(Slot::Buf(i));
            }
        }
        if self.chunked {
            self.out.push_back(Slot::Lit(LAST_CHUNK));
        }
        self.body_done = true;
    }

    fn stage_size_line(&mut self, len: usize) -> Span {
        let start = self.tmp0.start + self.tmp0_write;
        let buf = self.ws.slice_mut(self.tmp0);
        let mut at = self.tmp0_write;
        at += write_hex(&mut buf[at..], len);
        buf[at] = b'\r';
        buf[at + 1] = b'\n';
        at += 2;
        self.tmp0_write = at;
        self.tmp0_read = at;
        Span { start, end: self.tmp0.start + at }
    }

    fn pump_source_plain(&mut self) -> Result<(), SendError> {
        while self.more {
            let Some((off, cap)) = plan_frame(self.tmp0_write, self.tmp0.len(), self.chunked)
            else {
                return Ok(()); // staging full until the caller consumes
            };
            let dst = &mut self.ws.slice_mut(self.tmp0)[off..off + cap];
            let r = self.src.as_mut().expect("source style").read(dst)?;
            assert!(r.bytes <= cap, "source wrote past its buffer");
            trace!(bytes = r.bytes, more = r.more, "source read");
            if r.bytes > 0 {
                self.account_body(r.bytes)?;
                self.emit_tmp0_frame(off, r.bytes);
            }
            if !r.more {
                self.more = false;
                break;
            }
            if r.bytes == 0 {
                return Ok(()); // the source has nothing yet
            }
        }
        self.finish_body()
    }

    fn pump_source_encoded(&mut self) -> Result<(), SendError> {
        loop {
            // refill the raw area whenever it runs dry
            if self.more && self.tmp0_read == self.tmp0_write {
                self.tmp0_read = 0;
                self.tmp0_write = 0;
                let dst = self.ws.slice_mut(self.tmp0);
                let r = self.src.as_mut().expect("source style").read(dst)?;
                assert!(r.bytes <= self.tmp0.len(), "source wrote past its buffer");
                trace!(bytes = r.bytes, more = r.more, "source read");
                self.tmp0_write = r.bytes;
                if !r.more {
                    self.more = false;
                } else if r.bytes == 0 {
                    return Ok(());
                }
            }

            if !self.pump_encoder_step(!self.more)? {
                break;
            }
        }
        if self.encoder_done && self.tmp0_read != self.tmp0_write {
            return Err(SendError::bad_encoding("encoder finished before its input"));
        }
        if !self.more && self.tmp0_read == self.tmp0_write && self.encoder_done {
            return self.finish_body();
        }
        Ok(())
    }

    fn pump_stream_plain(&mut self) -> Result<(), SendError> {
        if self.stream_pending > 0 {
            let off = self.stream_off;
            let n = self.stream_pending;
            self.account_body(n)?;
            self.emit_tmp0_frame(off, n);
            self.stream_pending = 0;
        }
        if self.stream_closed {
            self.more = false;
            return self.finish_body();
        }
        Ok(())
    }

    fn pump_stream_encoded(&mut self) -> Result<(), SendError> {
        while self.pump_encoder_step(self.stream_closed)? {}
        if self.encoder_done && self.stream_pending != 0 {
            return Err(SendError::bad_encoding("encoder finished before its input"));
        }
        if self.stream_closed && self.stream_pending == 0 && self.encoder_done {
            self.more = false;
            return self.finish_body();
        }
        Ok(())
    }

    /// One encoder transform from the pending raw bytes into a staged
    /// frame. Returns whether another step may make progress.
    fn pump_encoder_step(&mut self, finishing: bool) -> Result<bool, SendError> {
        if self.encoder_done {
            return Ok(false);
        }
        let (src_start, src_len) = match self.style {
            Some(Style::Stream) => (self.stream_off, self.stream_pending),
            _ => (self.tmp0_read, self.tmp0_write - self.tmp0_read),
        };
        if src_len == 0 && !finishing {
            return Ok(false);
        }
        let Some((off, cap)) = plan_frame(self.tmp1_write, self.tmp1.len(), self.chunked) else {
            return Ok(false); // staging full until the caller consumes
        };

        let (t0, t1) = self.ws.pair_mut(self.tmp0, self.tmp1);
        let src = &t0[src_start..src_start + src_len];
        let dst = &mut t1[off..off + cap];
        let encoder = self.encoder.as_mut().expect("encoded pump without encoder");
        let step = encoder
            .transform(src, dst, finishing)
            .map_err(|e| SendError::bad_encoding(e.reason))?;

        match self.style {
            Some(Style::Stream) => {
                self.stream_off += step.consumed;
                self.stream_pending -= step.consumed;
            }
            _ => self.tmp0_read += step.consumed,
        }
        if step.produced > 0 {
            self.account_body(step.produced)?;
            self.emit_tmp1_frame(off, step.produced);
        }
        if step.done {
            self.encoder_done = true;
            return Ok(false);
        }
        Ok(step.consumed > 0 || step.produced > 0)
    }

    fn finish_body(&mut self) -> Result<(), SendError> {
        if self.body_done {
            return Ok(());
        }
        if let BodyLayout::Length(declared) = self.layout {
            if self.sent_body != declared {
                return Err(SendError::body_length(format!(
                    "body produced {} bytes, head declares {declared}",
                    self.sent_body
                )));
            }
        }
        if self.chunked {
            self.out.push_back(Slot::Lit(LAST_CHUNK));
        }
        self.body_done = true;
        trace!(body = self.sent_body, "body staged");
        Ok(())
    }

    fn account_body(&mut self, n: usize) -> Result<(), SendError> {
        self.sent_body += n as u64;
        if let BodyLayout::Length(declared) = self.layout {
            ensure!(
                self.sent_body <= declared,
                SendError::body_length(format!("body exceeds the declared {declared} bytes"))
            );
        }
        Ok(())
    }

    /// Wraps `n` staged bytes at `off` in tmp0 into an output frame.
    fn emit_tmp0_frame(&mut self, data_off: usize, n: usize) {
        let span = frame_in(self.ws.slice_mut(self.tmp0), data_off, n, self.chunked);
        let abs = Span { start: self.tmp0.start + span.start, end: self.tmp0.start + span.end };
        self.tmp0_write = span.end;
        self.tmp0_read = span.end;
        self.out.push_back(Slot::Ws(abs));
    }

    /// Wraps `n` staged bytes at `off` in tmp1 into an output frame.
    fn emit_tmp1_frame(&mut self, data_off: usize, n: usize) {
        let span = frame_in(self.ws.slice_mut(self.tmp1), data_off, n, self.chunked);
        let abs = Span { start: self.tmp1.start + span.start, end: self.tmp1.start + span.end };
        self.tmp1_write = span.end;
        self.out.push_back(Slot::Ws(abs));
    }
}

impl Default for Serializer {
    fn default() -> Self {
        Self::new()
    }
}

/// The ordered transmission ranges returned by [`Serializer::prepare`].
#[derive(Debug)]
pub struct Output<'a> {
    slices: Vec<&'a [u8]>,
}

impl<'a> Output<'a> {
    /// The ranges, in transmission order.
    pub fn slices(&self) -> &[&'a [u8]] {
        &self.slices
    }

    /// Iterates the ranges in transmission order.
    pub fn iter(&self) -> std::slice::Iter<'_, &'a [u8]> {
        self.slices.iter()
    }

    /// Total bytes across all ranges.
    pub fn total(&self) -> usize {
        self.slices.iter().map(|s| s.len()).sum()
    }

    /// Returns whether there is nothing to transmit right now.
    pub fn is_empty(&self) -> bool {
        self.slices.is_empty()
    }
}

impl<'a> IntoIterator for &'a Output<'a> {
    type Item = &'a &'a [u8];
    type IntoIter = std::slice::Iter<'a, &'a [u8]>;

    fn into_iter(self) -> Self::IntoIter {
        self.slices.iter()
    }
}

/// Direct-write handle for a [`Serializer::start_stream`] body.
///
/// Bytes written here are framed and exposed by the owning serializer's
/// [`prepare`](Serializer::prepare). Dropping the handle leaves the
/// stream open; call [`close`](Self::close) to end the body.
pub struct Stream<'a> {
    sr: &'a mut Serializer,
}

impl Stream<'_> {
    /// Total staging capacity available to stream writes.
    pub fn capacity(&self) -> usize {
        self.sr.tmp0.len()
    }

    /// Bytes committed but not yet framed.
    pub fn size(&self) -> usize {
        self.sr.stream_pending
    }

    /// Returns a writable slice of at most `n` bytes.
    ///
    /// The slice may be shorter, or empty when staging is full; draining
    /// the serializer frees space. Writing through a closed stream is
    /// [`SendError::Closed`].
    pub fn prepare(&mut self, n: usize) -> Result<&mut [u8], SendError> {
        let s = &mut *self.sr;
        ensure!(!s.stream_closed, SendError::Closed);
        let framing = s.chunked && s.encoder.is_none();
        let prefix = if framing { CHUNK_PREFIX } else { 0 };
        let suffix = if framing { CHUNK_SUFFIX } else { 0 };
        if s.stream_pending == 0 {
            s.stream_off = s.tmp0_write + prefix;
        }
        let data_end = s.stream_off + s.stream_pending;
        let usable = s.tmp0.len().saturating_sub(suffix);
        let give = n.min(usable.saturating_sub(data_end));
        Ok(&mut s.ws.slice_mut(s.tmp0)[data_end..data_end + give])
    }

    /// Commits `n` bytes written into the last
    /// [`prepare`](Self::prepare).
    ///
    /// # Panics
    ///
    /// Panics if `n` exceeds the prepared space.
    pub fn commit(&mut self, n: usize) -> Result<(), SendError> {
        let s = &mut *self.sr;
        ensure!(!s.stream_closed, SendError::Closed);
        let framing = s.chunked && s.encoder.is_none();
        let suffix = if framing { CHUNK_SUFFIX } else { 0 };
        assert!(
            s.stream_off + s.stream_pending + n + suffix <= s.tmp0.len(),
            "commit exceeds prepare"
        );
        s.stream_pending += n;
        Ok(())
    }

    /// Marks the body complete.
    pub fn close(self) {
        self.sr.stream_closed = true;
    }
}

/// Plans a staged frame: returns the data offset and capacity, or `None`
/// when the staging area cannot hold the frame overhead plus one byte.
fn plan_frame(write: usize, len: usize, chunked: bool) -> Option<(usize, usize)> {
    let prefix = if chunked { CHUNK_PREFIX } else { 0 };
    let suffix = if chunked { CHUNK_SUFFIX } else { 0 };
    let off = write + prefix;
    if off + suffix >= len {
        return None;
    }
    Some((off, len - off - suffix))
}

/// Completes a frame around `n` bytes at `data_off`, writing the size
/// line and CRLFs when chunked. Returns the frame's span within `buf`.
fn frame_in(buf: &mut [u8], data_off: usize, n: usize, chunked: bool) -> Span {
    if !chunked {
        return Span { start: data_off, end: data_off + n };
    }
    let digits = hex_len(n);
    let start = data_off - digits - 2;
    write_hex(&mut buf[start..], n);
    buf[data_off - 2] = b'\r';
    buf[data_off - 1] = b'\n';
    buf[data_off + n] = b'\r';
    buf[data_off + n + 1] = b'\n';
    Span { start, end: data_off + n + 2 }
}

fn hex_len(n: usize) -> usize {
    ((usize::BITS - n.max(1).leading_zeros() + 3) / 4) as usize
}

/// Writes `n` as minimal uppercase hex, returning the digit count.
fn write_hex(buf: &mut [u8], n: usize) -> usize {
    const DIGITS: &[u8; 16] = b"0123456789ABCDEF";
    let len = hex_len(n);
    for i in 0..len {
        let shift = 4 * (len - 1 - i);
        buf[i] = DIGITS[(n >> shift) & 0xF];
    }
    len
}
