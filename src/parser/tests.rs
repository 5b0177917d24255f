use std::sync::Arc;

use http::{Method, StatusCode, Version};

use super::*;
use crate::codec::testing::FlipCaseCodec;
use crate::context::Context;
use crate::error::ParseError;

fn feed(p: &mut Parser, bytes: &[u8]) {
    let mut at = 0;
    while at < bytes.len() {
        let (a, b) = p.prepare();
        assert!(!a.is_empty() || !b.is_empty(), "parser buffers full");
        let mut n = a.len().min(bytes.len() - at);
        a[..n].copy_from_slice(&bytes[at..at + n]);
        if n == a.len() && at + n < bytes.len() {
            let m = b.len().min(bytes.len() - at - n);
            b[..m].copy_from_slice(&bytes[at + n..at + n + m]);
            n += m;
        }
        p.commit(n);
        at += n;
    }
}

fn request(msg: &[u8]) -> Parser {
    let mut p = Parser::new(Kind::Request, Config::default());
    p.start();
    feed(&mut p, msg);
    p
}

fn response(msg: &[u8]) -> Parser {
    let mut p = Parser::new(Kind::Response, Config::default());
    p.start();
    feed(&mut p, msg);
    p
}

fn body_of(p: &Parser) -> Vec<u8> {
    let (a, b) = p.body();
    let mut v = a.to_vec();
    v.extend_from_slice(b);
    v
}

#[test]
fn simple_get() {
    let mut p = request(b"GET / HTTP/1.1\r\nConnection: close\r\nContent-Length: 42\r\n\r\n");
    assert_eq!(p.parse().unwrap(), Some(Advance::Headers));

    let header = p.get().unwrap();
    assert_eq!(header.method(), &Method::GET);
    assert_eq!(header.target(), "/");
    assert_eq!(header.version(), Version::HTTP_11);
    assert!(header.fields().exists("Connection"));
    assert_eq!(header.fields().find("connection").unwrap().value, b"close");
    assert!(!p.is_done());

    // done only after exactly 42 more bytes
    feed(&mut p, &[b'x'; 41]);
    assert_eq!(p.parse().unwrap(), None);
    assert!(!p.is_done());
    feed(&mut p, b"x");
    assert_eq!(p.parse().unwrap(), Some(Advance::Complete));
    assert!(p.is_done());
    assert_eq!(body_of(&p), vec![b'x'; 42]);
}

#[test]
fn simple_status_line() {
    let mut p = response(b"HTTP/1.0 404 Not Found\r\ncontent-length: 0\r\n\r\n");
    assert_eq!(p.parse().unwrap(), Some(Advance::Complete));
    let header = p.get().unwrap();
    assert_eq!(header.status(), StatusCode::NOT_FOUND);
    assert_eq!(header.version(), Version::HTTP_10);
    assert_eq!(header.reason(), b"Not Found");
}

#[test]
fn duplicate_field_retrieval() {
    let mut p = request(b"GET / HTTP/1.1\r\na: 1\r\nb: 2\r\na: 3\r\nc: 4\r\n\r\n");
    p.parse().unwrap();
    let header = p.get().unwrap();
    let fields = header.fields();
    assert_eq!(fields.count("a"), 2);
    assert_eq!(fields.find("a").unwrap().value, b"1");
    assert_eq!(fields.combine_values("a").as_ref(), b"1,3");
    let all: Vec<_> = fields.find_all("a").map(|f| f.value).collect();
    assert_eq!(all, [b"1", b"3"]);
}

#[test]
fn obs_fold_flattens_in_place() {
    let mut p = request(b"GET / HTTP/1.1\r\nx: \r\n y\r\n\r\n");
    p.parse().unwrap();
    {
        let header = p.get().unwrap();
        let field = header.fields().find("x").unwrap();
        assert!(field.has_obs_fold);
        assert_eq!(field.value, b"\r\n y");
    }
    let header = p.get_flat().unwrap();
    let field = header.fields().find("x").unwrap();
    assert!(!field.has_obs_fold);
    assert_eq!(field.value, b"   y");
}

#[test]
fn split_parse_byte_by_byte() {
    let msg = b"POST /p?q=1 HTTP/1.1\r\nHost: h\r\nContent-Length: 5\r\n\r\nhello";
    for k in 1..msg.len() {
        let mut p = request(&msg[..k]);
        let step = p.parse().unwrap();
        assert_ne!(step, Some(Advance::Complete), "prefix {k} completed early");
        assert!(!p.is_done());

        feed(&mut p, &msg[k..]);
        assert_eq!(p.parse().unwrap(), Some(Advance::Complete), "prefix {k}");
        let header = p.get().unwrap();
        assert_eq!(header.method(), &Method::POST);
        assert_eq!(header.target(), "/p?q=1");
        assert_eq!(header.fields().find("host").unwrap().value, b"h");
        assert_eq!(body_of(&p), b"hello");
    }
}

#[test]
fn malformed_field_names() {
    for bad in [&b":"[..], b" :", b" x:", b"x :", b"x@", b"x@:"] {
        let mut msg = b"GET / HTTP/1.1\r\n".to_vec();
        msg.extend_from_slice(bad);
        msg.extend_from_slice(b"\r\n\r\n");
        let mut p = request(&msg);
        assert_eq!(
            p.parse().unwrap_err(),
            ParseError::BadFieldName,
            "{:?}",
            std::str::from_utf8(bad)
        );
    }
}

#[test]
fn errors_are_sticky_until_reset() {
    let mut p = request(b"GET / HTTP/1.1\r\nbad name: x\r\n\r\n");
    assert_eq!(p.parse().unwrap_err(), ParseError::BadFieldName);
    assert_eq!(p.parse().unwrap_err(), ParseError::BadFieldName);

    p.reset();
    p.start();
    feed(&mut p, b"GET / HTTP/1.1\r\n\r\n");
    assert_eq!(p.parse().unwrap(), Some(Advance::Complete));
}

#[test]
fn bare_lf_is_rejected() {
    let mut p = request(b"GET / HTTP/1.1\nHost: h\r\n\r\n");
    assert_eq!(p.parse().unwrap_err(), ParseError::BadLineEnding);

    let mut p = request(b"GET / HTTP/1.1\r\nHost: h\n\r\n");
    assert_eq!(p.parse().unwrap_err(), ParseError::BadLineEnding);
}

#[test]
fn bad_start_lines() {
    assert_eq!(request(b"GET/ HTTP/1.1\r\n\r\n").parse().unwrap_err(), ParseError::BadMethod);
    assert_eq!(request(b"GET  HTTP/1.1\r\n\r\n").parse().unwrap_err(), ParseError::BadTarget);
    assert_eq!(request(b"GET / HTTX/1.1\r\n\r\n").parse().unwrap_err(), ParseError::BadVersion);
    assert_eq!(request(b"GET / HTTP/2.0\r\n\r\n").parse().unwrap_err(), ParseError::BadVersion);
    assert_eq!(response(b"HTTP/1.1 20x \r\n\r\n").parse().unwrap_err(), ParseError::BadStatus);
    assert_eq!(response(b"HTTP/1.1 099 \r\n\r\n").parse().unwrap_err(), ParseError::BadStatus);
}

#[test]
fn content_length_zero() {
    let mut p = request(b"POST / HTTP/1.1\r\nContent-Length: 0\r\n\r\n");
    assert_eq!(p.parse().unwrap(), Some(Advance::Complete));
    assert_eq!(body_of(&p), b"");
}

#[test]
fn content_length_must_be_digits() {
    // 1*DIGIT only: a leading sign parses as a number in Rust but is
    // not valid Content-Length syntax
    for bad in ["+5", "-5", "5 5", "0x5", "5.", ""] {
        let mut msg = b"POST / HTTP/1.1\r\nContent-Length: ".to_vec();
        msg.extend_from_slice(bad.as_bytes());
        msg.extend_from_slice(b"\r\n\r\n");
        let mut p = request(&msg);
        assert!(
            matches!(p.parse().unwrap_err(), ParseError::BadContentLength { .. }),
            "{bad:?}"
        );
    }

    // an overflowing digit run is equally refused
    let mut p = request(b"POST / HTTP/1.1\r\nContent-Length: 99999999999999999999\r\n\r\n");
    assert!(matches!(p.parse().unwrap_err(), ParseError::BadContentLength { .. }));
}

#[test]
fn conflicting_content_lengths() {
    let mut p = request(b"POST / HTTP/1.1\r\nContent-Length: 5\r\nContent-Length: 6\r\n\r\n");
    assert!(matches!(p.parse().unwrap_err(), ParseError::BadContentLength { .. }));

    // equal repeated values collapse to one
    let mut p =
        request(b"POST / HTTP/1.1\r\nContent-Length: 5\r\nContent-Length: 5\r\n\r\nhello");
    assert_eq!(p.parse().unwrap(), Some(Advance::Complete));
    assert_eq!(body_of(&p), b"hello");
}

#[test]
fn transfer_encoding_with_content_length() {
    // requests carrying both are refused
    let mut p = request(
        b"POST / HTTP/1.1\r\nTransfer-Encoding: chunked\r\nContent-Length: 5\r\n\r\n",
    );
    assert!(matches!(p.parse().unwrap_err(), ParseError::BadTransferEncoding { .. }));

    // responses prefer chunked and ignore the length
    let mut p = response(
        b"HTTP/1.1 200 OK\r\nTransfer-Encoding: chunked\r\nContent-Length: 999\r\n\r\n\
          5\r\nhello\r\n0\r\n\r\n",
    );
    assert_eq!(p.parse().unwrap(), Some(Advance::Complete));
    assert_eq!(body_of(&p), b"hello");
}

#[test]
fn request_with_non_chunked_final_coding() {
    let mut p = request(b"POST / HTTP/1.1\r\nTransfer-Encoding: gzip\r\n\r\n");
    assert!(matches!(p.parse().unwrap_err(), ParseError::BadTransferEncoding { .. }));

    // chunked not last is equally refused
    let mut p = request(b"POST / HTTP/1.1\r\nTransfer-Encoding: chunked, gzip\r\n\r\n");
    assert!(matches!(p.parse().unwrap_err(), ParseError::BadTransferEncoding { .. }));
}

#[test]
fn chunked_body_with_extensions_and_trailers() {
    let mut p = request(
        b"POST / HTTP/1.1\r\nTransfer-Encoding: chunked\r\n\r\n\
          5;ext=\"v\"\r\nhello\r\n6\r\n world\r\n0\r\nx-sum: 11\r\n\r\n",
    );
    assert_eq!(p.parse().unwrap(), Some(Advance::Complete));
    assert_eq!(body_of(&p), b"hello world");

    let trailers = p.trailers().unwrap();
    assert_eq!(trailers.len(), 1);
    assert_eq!(trailers.find("x-sum").unwrap().value, b"11");

    // trailers stay out of the header table
    assert!(!p.get().unwrap().fields().exists("x-sum"));
}

#[test]
fn chunked_split_at_every_byte() {
    let msg = b"POST / HTTP/1.1\r\nTransfer-Encoding: chunked\r\n\r\n\
                4\r\nwiki\r\n5\r\npedia\r\n0\r\n\r\n";
    for k in 1..msg.len() {
        let mut p = request(&msg[..k]);
        let step = p.parse().unwrap();
        assert_ne!(step, Some(Advance::Complete), "prefix {k} completed early");
        feed(&mut p, &msg[k..]);
        assert_eq!(p.parse().unwrap(), Some(Advance::Complete), "prefix {k}");
        assert_eq!(body_of(&p), b"wikipedia");
    }
}

#[test]
fn invalid_chunk_sizes() {
    let head = b"POST / HTTP/1.1\r\nTransfer-Encoding: chunked\r\n\r\n";
    for (bad, what) in [
        (&b"xyz\r\n"[..], "non-hex size"),
        (b"5\nhello\r\n", "bare LF after size"),
        (b"5;ext\nhello\r\n", "bare LF in extension"),
        (b"ffffffffffffffffff\r\n", "overflowing size"),
    ] {
        let mut msg = head.to_vec();
        msg.extend_from_slice(bad);
        let mut p = request(&msg);
        assert!(matches!(p.parse().unwrap_err(), ParseError::BadChunk { .. }), "{what}");
    }
}

#[test]
fn missing_crlf_after_chunk_data() {
    let mut p = request(
        b"POST / HTTP/1.1\r\nTransfer-Encoding: chunked\r\n\r\n5\r\nhelloXX\r\n",
    );
    assert!(matches!(p.parse().unwrap_err(), ParseError::BadChunk { .. }));
}

#[test]
fn header_size_cap() {
    let cfg = Config { max_header_bytes: 64, ..Config::default() };

    // start line (16) + field + terminator (2) == exactly 64 bytes
    let mut msg = b"GET / HTTP/1.1\r\n".to_vec();
    msg.extend_from_slice(b"a: ");
    msg.extend_from_slice(&vec![b'x'; 41]);
    msg.extend_from_slice(b"\r\n\r\n");
    assert_eq!(msg.len(), 64);
    let mut p = Parser::new(Kind::Request, cfg.clone());
    p.start();
    feed(&mut p, &msg);
    assert_eq!(p.parse().unwrap(), Some(Advance::Complete));

    // one byte more trips the cap
    let mut msg = b"GET / HTTP/1.1\r\n".to_vec();
    msg.extend_from_slice(b"a: ");
    msg.extend_from_slice(&vec![b'x'; 42]);
    msg.extend_from_slice(b"\r\n\r\n");
    let mut p = Parser::new(Kind::Request, cfg);
    p.start();
    feed(&mut p, &msg);
    assert!(matches!(p.parse().unwrap_err(), ParseError::HeaderTooLarge { .. }));
}

#[test]
fn body_until_eof() {
    let mut p = response(b"HTTP/1.1 200 OK\r\n\r\nsome bytes");
    assert_eq!(p.parse().unwrap(), Some(Advance::Headers));
    assert!(!p.is_done());
    feed(&mut p, b" and more");
    assert_eq!(p.parse().unwrap(), None);
    p.commit_eof();
    assert_eq!(p.parse().unwrap(), Some(Advance::Complete));
    assert_eq!(body_of(&p), b"some bytes and more");
}

#[test]
fn status_forbidding_body() {
    for status in ["204 No Content", "304 Not Modified", "101 Switching Protocols"] {
        let mut msg = format!("HTTP/1.1 {status}\r\n").into_bytes();
        msg.extend_from_slice(b"x: y\r\n\r\n");
        let mut p = response(&msg);
        assert_eq!(p.parse().unwrap(), Some(Advance::Complete), "{status}");
        assert_eq!(body_of(&p), b"");
    }
}

#[test]
fn head_response_has_no_body() {
    let mut p = Parser::new(Kind::Response, Config::default());
    p.start_head_response();
    feed(&mut p, b"HTTP/1.1 200 OK\r\nContent-Length: 42\r\n\r\n");
    assert_eq!(p.parse().unwrap(), Some(Advance::Complete));
    assert_eq!(body_of(&p), b"");
    // the framing field is still visible to the caller
    assert!(p.get().unwrap().fields().exists(FieldId::ContentLength));
}

#[test]
fn pipelined_messages_survive_start() {
    let msg = b"GET /a HTTP/1.1\r\n\r\nGET /b HTTP/1.1\r\nHost: h\r\n\r\n";
    let mut p = request(msg);
    assert_eq!(p.parse().unwrap(), Some(Advance::Complete));
    assert_eq!(p.get().unwrap().target(), "/a");

    p.start();
    assert_eq!(p.parse().unwrap(), Some(Advance::Complete));
    assert_eq!(p.get().unwrap().target(), "/b");
    assert!(p.get().unwrap().fields().exists("host"));
}

#[test]
fn pipelined_after_body() {
    let msg = b"POST /a HTTP/1.1\r\nContent-Length: 5\r\n\r\nhelloGET /b HTTP/1.1\r\n\r\n";
    let mut p = request(msg);
    assert_eq!(p.parse().unwrap(), Some(Advance::Complete));
    assert_eq!(body_of(&p), b"hello");

    p.start();
    assert_eq!(p.parse().unwrap(), Some(Advance::Complete));
    assert_eq!(p.get().unwrap().target(), "/b");
}

#[test]
fn eof_mid_message_is_incomplete() {
    let mut p = request(b"GET / HTTP/1.1\r\nHost:");
    p.commit_eof();
    assert_eq!(p.parse().unwrap_err(), ParseError::Incomplete);

    let mut p = request(b"POST / HTTP/1.1\r\nContent-Length: 9\r\n\r\nhal");
    assert_eq!(p.parse().unwrap(), Some(Advance::Headers));
    p.commit_eof();
    assert_eq!(p.parse().unwrap_err(), ParseError::Incomplete);
}

#[test]
fn clean_eof_between_messages() {
    let mut p = request(b"GET / HTTP/1.1\r\n\r\n");
    assert_eq!(p.parse().unwrap(), Some(Advance::Complete));
    p.start();
    p.commit_eof();
    assert_eq!(p.parse().unwrap(), Some(Advance::EndOfStream));
    assert!(!p.has_header());
}

#[test]
fn body_view_drains_with_consume() {
    let mut p = request(b"POST / HTTP/1.1\r\nContent-Length: 10\r\n\r\n0123456789");
    assert_eq!(p.parse().unwrap(), Some(Advance::Complete));
    assert_eq!(body_of(&p), b"0123456789");
    p.consume_body(4);
    assert_eq!(body_of(&p), b"456789");
    p.consume_body(100);
    assert_eq!(body_of(&p), b"");
}

#[test]
fn body_too_large_on_eof_framing() {
    let cfg = Config { max_body_bytes: 8, ..Config::default() };
    let mut p = Parser::new(Kind::Response, cfg);
    p.start();
    feed(&mut p, b"HTTP/1.1 200 OK\r\n\r\nmore than eight");
    assert!(matches!(p.parse().unwrap_err(), ParseError::BodyTooLarge { .. }));
}

#[test]
fn declared_length_over_cap_is_rejected_early() {
    let cfg = Config { max_body_bytes: 8, ..Config::default() };
    let mut p = Parser::new(Kind::Request, cfg);
    p.start();
    feed(&mut p, b"POST / HTTP/1.1\r\nContent-Length: 9\r\n\r\n");
    assert!(matches!(p.parse().unwrap_err(), ParseError::BodyTooLarge { .. }));
}

#[test]
fn decoded_body_via_registered_codec() {
    let mut ctx = Context::new();
    ctx.register_decoder("x-flip", || FlipCaseCodec);
    let ctx = ctx.shared();

    let mut p = Parser::with_context(Kind::Request, Config::default(), Arc::clone(&ctx));
    p.start();
    feed(
        &mut p,
        b"POST / HTTP/1.1\r\nContent-Encoding: x-flip\r\nContent-Length: 5\r\n\r\nHELLO",
    );
    assert_eq!(p.parse().unwrap(), Some(Advance::Complete));
    assert_eq!(body_of(&p), b"hello");

    // chunked framing composes with the decoder
    let mut p = Parser::with_context(Kind::Request, Config::default(), ctx);
    p.start();
    feed(
        &mut p,
        b"POST / HTTP/1.1\r\nContent-Encoding: x-flip\r\n\
          Transfer-Encoding: chunked\r\n\r\n3\r\nHEL\r\n2\r\nLO\r\n0\r\n\r\n",
    );
    assert_eq!(p.parse().unwrap(), Some(Advance::Complete));
    assert_eq!(body_of(&p), b"hello");
}

#[test]
fn unregistered_coding_passes_through() {
    let ctx = Context::new().shared();
    let mut p = Parser::with_context(Kind::Request, Config::default(), ctx);
    p.start();
    feed(&mut p, b"POST / HTTP/1.1\r\nContent-Encoding: br\r\nContent-Length: 3\r\n\r\nraw");
    assert_eq!(p.parse().unwrap(), Some(Advance::Complete));
    assert_eq!(body_of(&p), b"raw");
}

#[test]
fn header_view_aliases_fed_bytes() {
    let msg = b"GET /where HTTP/1.1\r\nUser-Agent: probe/1.0\r\n\r\n";
    let mut p = request(msg);
    p.parse().unwrap();
    let header = p.get().unwrap();
    assert_eq!(header.target().as_bytes(), &msg[4..10]);
    let ua = header.fields().find("user-agent").unwrap();
    assert_eq!(ua.name, "User-Agent");
    assert_eq!(ua.value, b"probe/1.0");
}

#[test]
fn empty_field_value() {
    let mut p = request(b"GET / HTTP/1.1\r\nx-empty:\r\nx-ows:   \r\n\r\n");
    p.parse().unwrap();
    let header = p.get().unwrap();
    assert_eq!(header.fields().find("x-empty").unwrap().value, b"");
    assert_eq!(header.fields().find("x-ows").unwrap().value, b"");
}
