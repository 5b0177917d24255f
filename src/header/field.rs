//! Single-field tokenizer for the header and trailer sections.
//!
//! [`next_field`] advances over exactly one `field-name ":" OWS
//! field-value CRLF` production, or detects the section terminator, per
//! [RFC 7230 Section 3.2](https://tools.ietf.org/html/rfc7230#section-3.2).
//! The tokenizer never mutates its input: obsolete line folding inside a
//! value is accepted and flagged, and rewritten only by the separate
//! [`flatten_folds`] pass when a caller asks for the flat form.

use crate::chars;
use crate::error::ParseError;
use crate::workspace::Span;

/// One advancement of the tokenizer.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum FieldEvent {
    /// A complete field. Ranges index the buffer passed to [`next_field`].
    Field { name: Span, value: Span, has_obs_fold: bool, next: usize },
    /// The section terminator (a CRLF where a field would start).
    End { next: usize },
}

/// Advances one field starting at `at`, or detects end-of-section.
///
/// Returns `Ok(None)` when the bytes present do not yet contain a full
/// field; feeding more input and retrying from the same `at` makes
/// progress. Errors are final for the message.
pub(crate) fn next_field(buf: &[u8], at: usize) -> Result<Option<FieldEvent>, ParseError> {
    let len = buf.len();
    if at >= len {
        return Ok(None);
    }

    // section terminator
    if buf[at] == b'\r' {
        if at + 1 >= len {
            return Ok(None);
        }
        if buf[at + 1] != b'\n' {
            return Err(ParseError::BadLineEnding);
        }
        return Ok(Some(FieldEvent::End { next: at + 2 }));
    }
    if buf[at] == b'\n' {
        return Err(ParseError::BadLineEnding);
    }

    // field-name = 1*tchar, immediately followed by ":"
    let mut i = at;
    while i < len && chars::is_token(buf[i]) {
        i += 1;
    }
    if i == at {
        return Err(ParseError::BadFieldName);
    }
    if i >= len {
        return Ok(None);
    }
    if buf[i] != b':' {
        // covers whitespace before the colon and stray bytes in the name
        return Err(ParseError::BadFieldName);
    }
    let name = Span { start: at, end: i };
    i += 1;

    // OWS before the value
    while i < len && chars::is_ows(buf[i]) {
        i += 1;
    }
    let vstart = i;

    // *( field-content / obs-fold ), terminated by CRLF not followed
    // by SP or HTAB
    let mut has_obs_fold = false;
    let vend;
    loop {
        if i >= len {
            return Ok(None);
        }
        match buf[i] {
            b'\r' => {
                if i + 1 >= len {
                    return Ok(None);
                }
                if buf[i + 1] != b'\n' {
                    return Err(ParseError::BadLineEnding);
                }
                if i + 2 >= len {
                    return Ok(None);
                }
                if chars::is_ows(buf[i + 2]) {
                    has_obs_fold = true;
                    i += 3;
                } else {
                    vend = i;
                    i += 2;
                    break;
                }
            }
            b'\n' => return Err(ParseError::BadLineEnding),
            c if chars::is_field_value(c) => i += 1,
            _ => return Err(ParseError::BadFieldValue),
        }
    }

    let value = Span { start: vstart, end: trim_value_end(buf, vstart, vend) };
    Ok(Some(FieldEvent::Field { name, value, has_obs_fold, next: i }))
}

// The value range excludes trailing OWS; a fold left dangling at the very
// end of the value is whitespace too and drops with it.
fn trim_value_end(buf: &[u8], start: usize, mut end: usize) -> usize {
    loop {
        while end > start && chars::is_ows(buf[end - 1]) {
            end -= 1;
        }
        if end >= start + 2 && buf[end - 2] == b'\r' && buf[end - 1] == b'\n' {
            end -= 2;
        } else {
            return end;
        }
    }
}

/// Rewrites the CR LF of every fold in `value` to two spaces, in place.
///
/// The fold's own SP/HTAB is kept, so the value length never changes.
pub(crate) fn flatten_folds(value: &mut [u8]) {
    let mut i = 0;
    while i + 2 < value.len() {
        if value[i] == b'\r' && value[i + 1] == b'\n' && chars::is_ows(value[i + 2]) {
            value[i] = b' ';
            value[i + 1] = b' ';
            i += 3;
        } else {
            i += 1;
        }
    }
}
