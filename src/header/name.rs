//! Well-known header field names.
//!
//! Every parsed field is tagged with a [`FieldId`] resolved by a
//! case-insensitive match against the permanent-registry names this crate
//! cares about. Unknown names get the [`FieldId::Unknown`] sentinel and
//! remain fully retrievable by name; the id exists so hot-path checks
//! (Content-Length, Transfer-Encoding, ...) compare a byte instead of a
//! string.

/// Identifier of a well-known field name, or [`Unknown`](Self::Unknown).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[non_exhaustive]
pub enum FieldId {
    Accept,
    AcceptCharset,
    AcceptEncoding,
    AcceptLanguage,
    Age,
    Allow,
    Authorization,
    CacheControl,
    Connection,
    ContentDisposition,
    ContentEncoding,
    ContentLength,
    ContentLocation,
    ContentRange,
    ContentType,
    Cookie,
    Date,
    ETag,
    Expect,
    Expires,
    From,
    Host,
    IfMatch,
    IfModifiedSince,
    IfNoneMatch,
    IfRange,
    IfUnmodifiedSince,
    LastModified,
    Location,
    MaxForwards,
    Origin,
    Pragma,
    ProxyAuthenticate,
    ProxyAuthorization,
    Range,
    Referer,
    RetryAfter,
    Server,
    SetCookie,
    Te,
    Trailer,
    TransferEncoding,
    Upgrade,
    UserAgent,
    Vary,
    Via,
    Warning,
    WwwAuthenticate,
    /// Any name not in the table.
    Unknown,
}

macro_rules! known_names {
    ($(($id:ident, $text:literal)),+ $(,)?) => {
        const KNOWN: &[(FieldId, &str)] = &[
            $((FieldId::$id, $text)),+
        ];
    };
}

known_names! {
    (Accept, "accept"),
    (AcceptCharset, "accept-charset"),
    (AcceptEncoding, "accept-encoding"),
    (AcceptLanguage, "accept-language"),
    (Age, "age"),
    (Allow, "allow"),
    (Authorization, "authorization"),
    (CacheControl, "cache-control"),
    (Connection, "connection"),
    (ContentDisposition, "content-disposition"),
    (ContentEncoding, "content-encoding"),
    (ContentLength, "content-length"),
    (ContentLocation, "content-location"),
    (ContentRange, "content-range"),
    (ContentType, "content-type"),
    (Cookie, "cookie"),
    (Date, "date"),
    (ETag, "etag"),
    (Expect, "expect"),
    (Expires, "expires"),
    (From, "from"),
    (Host, "host"),
    (IfMatch, "if-match"),
    (IfModifiedSince, "if-modified-since"),
    (IfNoneMatch, "if-none-match"),
    (IfRange, "if-range"),
    (IfUnmodifiedSince, "if-unmodified-since"),
    (LastModified, "last-modified"),
    (Location, "location"),
    (MaxForwards, "max-forwards"),
    (Origin, "origin"),
    (Pragma, "pragma"),
    (ProxyAuthenticate, "proxy-authenticate"),
    (ProxyAuthorization, "proxy-authorization"),
    (Range, "range"),
    (Referer, "referer"),
    (RetryAfter, "retry-after"),
    (Server, "server"),
    (SetCookie, "set-cookie"),
    (Te, "te"),
    (Trailer, "trailer"),
    (TransferEncoding, "transfer-encoding"),
    (Upgrade, "upgrade"),
    (UserAgent, "user-agent"),
    (Vary, "vary"),
    (Via, "via"),
    (Warning, "warning"),
    (WwwAuthenticate, "www-authenticate"),
}

impl FieldId {
    /// Resolves a wire name to its id, ignoring ASCII case.
    pub fn lookup(name: &[u8]) -> FieldId {
        // dispatch on length first so each candidate set is tiny
        KNOWN
            .iter()
            .filter(|(_, text)| text.len() == name.len())
            .find(|(_, text)| name.eq_ignore_ascii_case(text.as_bytes()))
            .map(|(id, _)| *id)
            .unwrap_or(FieldId::Unknown)
    }

    /// The canonical lowercase name, or `None` for the sentinel.
    pub fn as_str(&self) -> Option<&'static str> {
        KNOWN.iter().find(|(id, _)| id == self).map(|(_, text)| *text)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn lookup_ignores_case() {
        assert_eq!(FieldId::lookup(b"content-length"), FieldId::ContentLength);
        assert_eq!(FieldId::lookup(b"Content-Length"), FieldId::ContentLength);
        assert_eq!(FieldId::lookup(b"CONTENT-LENGTH"), FieldId::ContentLength);
        assert_eq!(FieldId::lookup(b"tRANSFER-eNCODING"), FieldId::TransferEncoding);
    }

    #[test]
    fn unknown_names_hit_the_sentinel() {
        assert_eq!(FieldId::lookup(b"x-custom"), FieldId::Unknown);
        assert_eq!(FieldId::lookup(b""), FieldId::Unknown);
        // one byte longer than a known name
        assert_eq!(FieldId::lookup(b"hosts"), FieldId::Unknown);
    }

    #[test]
    fn every_table_entry_round_trips() {
        for (id, text) in KNOWN {
            assert_eq!(FieldId::lookup(text.as_bytes()), *id);
            assert_eq!(id.as_str(), Some(*text));
        }
        assert_eq!(FieldId::Unknown.as_str(), None);
    }
}
