//! Pull-model body producers for the serializer.
//!
//! A [`Source`] hands body bytes to the serializer on demand. The
//! serializer calls [`Source::read`] with a destination slice carved from
//! its staging area; the source fills some prefix of it and reports how
//! much, plus whether more data will follow. After a read with
//! `more == false` the source is never called again.

use std::io;

use bytes::Bytes;

/// The result of one [`Source::read`] call.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Read {
    /// Bytes written into the destination; at most `dst.len()`.
    pub bytes: usize,
    /// Whether the source may produce more bytes. `false` marks the
    /// terminal read.
    pub more: bool,
}

/// A producer of body bytes, pulled by the serializer.
pub trait Source: Send {
    /// Fills a prefix of `dst` with body bytes.
    ///
    /// Partial success is expected; returning `bytes == 0` with
    /// `more == true` asks the serializer to try again with more space.
    /// Errors abort serialization of the current message.
    fn read(&mut self, dst: &mut [u8]) -> io::Result<Read>;

    /// Optional staging-size hint, consulted once before the first read.
    ///
    /// Returning `Some(n)` asks the serializer to stage around `n` bytes
    /// per pull when the workspace allows it.
    fn maybe_reserve(&mut self) -> Option<usize> {
        None
    }
}

/// A source over a sequence of in-memory buffers.
///
/// Yields each buffer's bytes in order, reporting the terminal read
/// together with the last bytes it can fit.
#[derive(Debug, Default)]
pub struct BuffersSource {
    parts: Vec<Bytes>,
    index: usize,
    pos: usize,
}

impl BuffersSource {
    pub fn new<I>(parts: I) -> Self
    where
        I: IntoIterator<Item = Bytes>,
    {
        Self { parts: parts.into_iter().collect(), index: 0, pos: 0 }
    }

    fn remaining(&self) -> usize {
        self.parts[self.index..].iter().map(|b| b.len()).sum::<usize>() - self.pos
    }
}

impl Source for BuffersSource {
    fn read(&mut self, dst: &mut [u8]) -> io::Result<Read> {
        let mut written = 0;
        while written < dst.len() && self.index < self.parts.len() {
            let part = &self.parts[self.index];
            let chunk = &part[self.pos..];
            let n = chunk.len().min(dst.len() - written);
            dst[written..written + n].copy_from_slice(&chunk[..n]);
            written += n;
            self.pos += n;
            if self.pos == part.len() {
                self.index += 1;
                self.pos = 0;
            }
        }
        Ok(Read { bytes: written, more: self.index < self.parts.len() })
    }

    fn maybe_reserve(&mut self) -> Option<usize> {
        Some(self.remaining())
    }
}
