//! Shared registry of content-coding codec factories.
//!
//! A [`Context`] is built once, before any parser or serializer that uses
//! it, and is read-only afterwards. Parsers look up decoders by the coding
//! name carried in `Content-Encoding`; serializers look up encoders the
//! same way. Each lookup yields a fresh codec instance, so codecs never
//! carry state across messages.

use std::sync::Arc;

use crate::codec::Codec;

type Factory = Box<dyn Fn() -> Box<dyn Codec> + Send + Sync>;

/// Process-wide codec registry.
///
/// Shared between instances via [`Arc`]; registration must complete before
/// the context is handed to a parser or serializer.
#[derive(Default)]
pub struct Context {
    decoders: Vec<(String, Factory)>,
    encoders: Vec<(String, Factory)>,
}

impl Context {
    /// Creates an empty registry.
    pub fn new() -> Self {
        Self::default()
    }

    /// Registers a decoder factory for a content coding, e.g. `"gzip"`.
    ///
    /// Coding names compare case-insensitively. A later registration for
    /// the same coding shadows the earlier one.
    pub fn register_decoder<F, C>(&mut self, coding: &str, factory: F)
    where
        F: Fn() -> C + Send + Sync + 'static,
        C: Codec + 'static,
    {
        let factory = move || Box::new(factory()) as Box<dyn Codec>;
        self.decoders.push((coding.to_ascii_lowercase(), Box::new(factory)));
    }

    /// Registers an encoder factory for a content coding.
    pub fn register_encoder<F, C>(&mut self, coding: &str, factory: F)
    where
        F: Fn() -> C + Send + Sync + 'static,
        C: Codec + 'static,
    {
        let factory = move || Box::new(factory()) as Box<dyn Codec>;
        self.encoders.push((coding.to_ascii_lowercase(), Box::new(factory)));
    }

    /// Returns a fresh decoder for `coding`, if one is registered.
    pub fn decoder(&self, coding: &str) -> Option<Box<dyn Codec>> {
        lookup(&self.decoders, coding)
    }

    /// Returns a fresh encoder for `coding`, if one is registered.
    pub fn encoder(&self, coding: &str) -> Option<Box<dyn Codec>> {
        lookup(&self.encoders, coding)
    }

    /// Finishes registration, producing the shared handle parsers and
    /// serializers are constructed with.
    pub fn shared(self) -> Arc<Self> {
        Arc::new(self)
    }
}

fn lookup(table: &[(String, Factory)], coding: &str) -> Option<Box<dyn Codec>> {
    // last registration wins
    table
        .iter()
        .rev()
        .find(|(name, _)| name.eq_ignore_ascii_case(coding))
        .map(|(_, factory)| factory())
}

impl std::fmt::Debug for Context {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Context")
            .field("decoders", &self.decoders.iter().map(|(n, _)| n).collect::<Vec<_>>())
            .field("encoders", &self.encoders.iter().map(|(n, _)| n).collect::<Vec<_>>())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::codec::testing::IdentityCodec;

    #[test]
    fn lookup_is_case_insensitive() {
        let mut ctx = Context::new();
        ctx.register_decoder("gzip", || IdentityCodec);
        assert!(ctx.decoder("GZIP").is_some());
        assert!(ctx.decoder("gZip").is_some());
        assert!(ctx.decoder("br").is_none());
    }

    #[test]
    fn decoders_and_encoders_are_separate() {
        let mut ctx = Context::new();
        ctx.register_decoder("x-test", || IdentityCodec);
        assert!(ctx.decoder("x-test").is_some());
        assert!(ctx.encoder("x-test").is_none());
    }

    #[test]
    fn each_lookup_yields_a_fresh_instance() {
        let mut ctx = Context::new();
        ctx.register_encoder("x-test", || IdentityCodec);
        let a = ctx.encoder("x-test");
        let b = ctx.encoder("x-test");
        assert!(a.is_some() && b.is_some());
    }
}
