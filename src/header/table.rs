//! Indexed, zero-copy view of parsed header fields.
//!
//! [`Fields`] wraps the field entries a parser collected for one message
//! and resolves their byte ranges against the parsed buffer on access.
//! Arrival order is preserved and duplicates are kept; lookups accept
//! either a well-known [`FieldId`] or a name compared without regard to
//! ASCII case.

use std::borrow::Cow;

use crate::header::name::FieldId;
use crate::workspace::Span;

/// One stored field: id, byte ranges, and the obs-fold flag.
#[derive(Debug, Clone, Copy)]
pub(crate) struct FieldEntry {
    pub id: FieldId,
    pub name: Span,
    pub value: Span,
    pub has_obs_fold: bool,
}

/// A lookup key: a well-known id or a case-insensitive name.
#[derive(Debug, Clone, Copy)]
pub enum Query<'q> {
    Id(FieldId),
    Name(&'q str),
}

impl<'q> From<FieldId> for Query<'q> {
    fn from(id: FieldId) -> Self {
        Query::Id(id)
    }
}

impl<'q> From<&'q str> for Query<'q> {
    fn from(name: &'q str) -> Self {
        // a known name queries by id so the comparison stays one byte
        match FieldId::lookup(name.as_bytes()) {
            FieldId::Unknown => Query::Name(name),
            id => Query::Id(id),
        }
    }
}

/// One field as seen by a caller.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct FieldRef<'a> {
    /// Resolved well-known id, or the sentinel.
    pub id: FieldId,
    /// Name with the case it had on the wire.
    pub name: &'a str,
    /// Raw value bytes; folds present if [`has_obs_fold`](Self::has_obs_fold).
    pub value: &'a [u8],
    /// Whether the value contains obsolete line folds.
    pub has_obs_fold: bool,
}

/// The field table of a parsed header or trailer section.
#[derive(Debug, Clone, Copy)]
pub struct Fields<'a> {
    buf: &'a [u8],
    entries: &'a [FieldEntry],
}

impl<'a> Fields<'a> {
    pub(crate) fn new(buf: &'a [u8], entries: &'a [FieldEntry]) -> Self {
        Self { buf, entries }
    }

    /// Number of fields, duplicates included.
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    /// Returns whether the section had no fields.
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// All fields in arrival order.
    pub fn iter(&self) -> impl Iterator<Item = FieldRef<'a>> + '_ {
        self.entries.iter().map(|e| self.resolve(e))
    }

    /// Returns whether at least one matching field exists.
    pub fn exists<'q>(&self, query: impl Into<Query<'q>>) -> bool {
        let q = query.into();
        self.entries.iter().any(|e| matches(self.buf, e, &q))
    }

    /// Number of matching fields.
    pub fn count<'q>(&self, query: impl Into<Query<'q>>) -> usize {
        let q = query.into();
        self.entries.iter().filter(|e| matches(self.buf, e, &q)).count()
    }

    /// First matching field in arrival order.
    pub fn find<'q>(&self, query: impl Into<Query<'q>>) -> Option<FieldRef<'a>> {
        let q = query.into();
        self.entries.iter().find(|e| matches(self.buf, e, &q)).map(|e| self.resolve(e))
    }

    /// All matching fields, lazily, in arrival order.
    pub fn find_all<'q: 'a>(
        &self,
        query: impl Into<Query<'q>>,
    ) -> impl Iterator<Item = FieldRef<'a>> + '_ {
        let q: Query<'a> = query.into();
        let this = *self;
        this.entries.iter().filter(move |e| matches(this.buf, e, &q)).map(move |e| this.resolve(e))
    }

    /// Concatenates all matching values, separated by a literal `","`.
    ///
    /// A single match borrows the value directly; only multiple matches
    /// allocate the joined form.
    pub fn combine_values<'q: 'a>(&self, query: impl Into<Query<'q>>) -> Cow<'a, [u8]> {
        let q = query.into();
        let mut it = self.entries.iter().filter(|e| matches(self.buf, e, &q));
        let first = match it.next() {
            Some(e) => &self.buf[e.value.start..e.value.end],
            None => return Cow::Borrowed(&[]),
        };
        match it.next() {
            None => Cow::Borrowed(first),
            Some(second) => {
                let mut joined = first.to_vec();
                joined.push(b',');
                joined.extend_from_slice(&self.buf[second.value.start..second.value.end]);
                for e in it {
                    joined.push(b',');
                    joined.extend_from_slice(&self.buf[e.value.start..e.value.end]);
                }
                Cow::Owned(joined)
            }
        }
    }

    fn resolve(&self, e: &FieldEntry) -> FieldRef<'a> {
        FieldRef {
            id: e.id,
            // names are token characters, always valid UTF-8
            name: std::str::from_utf8(&self.buf[e.name.start..e.name.end]).unwrap(),
            value: &self.buf[e.value.start..e.value.end],
            has_obs_fold: e.has_obs_fold,
        }
    }
}

fn matches(buf: &[u8], e: &FieldEntry, q: &Query<'_>) -> bool {
    match q {
        Query::Id(id) => e.id == *id,
        Query::Name(name) => {
            buf[e.name.start..e.name.end].eq_ignore_ascii_case(name.as_bytes())
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn table(raw: &[(&str, &str)]) -> (Vec<u8>, Vec<FieldEntry>) {
        let mut buf = Vec::new();
        let mut entries = Vec::new();
        for (name, value) in raw {
            let nstart = buf.len();
            buf.extend_from_slice(name.as_bytes());
            let nend = buf.len();
            buf.extend_from_slice(b": ");
            let vstart = buf.len();
            buf.extend_from_slice(value.as_bytes());
            let vend = buf.len();
            buf.extend_from_slice(b"\r\n");
            entries.push(FieldEntry {
                id: FieldId::lookup(name.as_bytes()),
                name: Span { start: nstart, end: nend },
                value: Span { start: vstart, end: vend },
                has_obs_fold: false,
            });
        }
        (buf, entries)
    }

    #[test]
    fn duplicates_are_ordered_and_countable() {
        let (buf, entries) = table(&[("a", "1"), ("b", "2"), ("a", "3"), ("c", "4")]);
        let fields = Fields::new(&buf, &entries);

        assert_eq!(fields.count("a"), 2);
        assert_eq!(fields.find("a").unwrap().value, b"1");
        let values: Vec<_> = fields.find_all("a").map(|f| f.value).collect();
        assert_eq!(values, [b"1", b"3"]);
        assert_eq!(fields.combine_values("a"), Cow::<[u8]>::Owned(b"1,3".to_vec()));
    }

    #[test]
    fn count_agrees_with_find_all() {
        let (buf, entries) = table(&[("x", "1"), ("y", "2"), ("x", "3"), ("x", "4")]);
        let fields = Fields::new(&buf, &entries);
        for name in ["x", "y", "z"] {
            assert_eq!(fields.count(name), fields.find_all(name).count(), "{name}");
            assert_eq!(
                fields.find(name).as_ref(),
                fields.find_all(name).collect::<Vec<_>>().first(),
            );
        }
    }

    #[test]
    fn name_lookup_ignores_case() {
        let (buf, entries) = table(&[("Connection", "close"), ("X-Custom", "v")]);
        let fields = Fields::new(&buf, &entries);

        assert!(fields.exists("connection"));
        assert!(fields.exists("CONNECTION"));
        assert!(fields.exists(FieldId::Connection));
        assert!(fields.exists("x-custom"));
        assert!(!fields.exists("x-other"));

        // stored case is preserved
        assert_eq!(fields.find("connection").unwrap().name, "Connection");
    }

    #[test]
    fn single_value_combination_borrows() {
        let (buf, entries) = table(&[("a", "only")]);
        let fields = Fields::new(&buf, &entries);
        assert!(matches!(fields.combine_values("a"), Cow::Borrowed(b"only")));
        assert!(matches!(fields.combine_values("missing"), Cow::Borrowed(b"")));
    }

    #[test]
    fn empty_values_combine() {
        let (buf, entries) = table(&[("a", ""), ("a", "x"), ("a", "")]);
        let fields = Fields::new(&buf, &entries);
        assert_eq!(fields.combine_values("a").as_ref(), b",x,");
    }
}
