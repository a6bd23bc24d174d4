use std::fmt;

use bytes::Bytes;
use http::HeaderName;

use super::encoding::{Ascii, Binary, ValueEncoding};
use super::key::{AsciiMetadataKey, BinaryMetadataKey, MetadataKey};
use super::value::{AsciiMetadataValue, BinaryMetadataValue, MetadataValue};

/// An ordered multimap of gRPC metadata entries (`spec.md` §3 "Metadata").
///
/// Entries preserve insertion order and a key may be associated with more
/// than one value, matching HTTP/2 header semantics. Lookup is
/// case-insensitive, since [`HeaderName`] normalizes to lower case.
#[derive(Clone, Default)]
pub struct MetadataMap {
    entries: Vec<RawEntry>,
}

#[derive(Clone)]
struct RawEntry {
    name: HeaderName,
    value: Bytes,
    binary: bool,
}

/// Reference to a key and value in a [`MetadataMap`]; tags whether the pair
/// is ascii or binary.
#[derive(Debug)]
pub enum KeyAndValueRef<'a> {
    /// An ascii metadata key and value.
    Ascii(&'a AsciiMetadataKey, &'a AsciiMetadataValue),
    /// A binary metadata key and value.
    Binary(&'a BinaryMetadataKey, &'a BinaryMetadataValue),
}

impl MetadataMap {
    /// Creates an empty `MetadataMap`.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Creates an empty `MetadataMap` with room for `capacity` entries.
    #[must_use]
    pub fn with_capacity(capacity: usize) -> Self {
        Self {
            entries: Vec::with_capacity(capacity),
        }
    }

    /// Number of entries (ascii and binary) stored in the map.
    #[must_use]
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    /// Whether the map holds no entries.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Removes every entry, keeping allocated capacity.
    pub fn clear(&mut self) {
        self.entries.clear();
    }

    /// Returns the first ascii value associated with `key`, if any.
    #[must_use]
    pub fn get(&self, key: &str) -> Option<&AsciiMetadataValue> {
        self.entries
            .iter()
            .find(|e| !e.binary && e.name.as_str().eq_ignore_ascii_case(key))
            .map(|e| ascii_value_ref(&e.value))
    }

    /// Returns the first binary value associated with `key`, if any.
    #[must_use]
    pub fn get_bin(&self, key: &str) -> Option<&BinaryMetadataValue> {
        self.entries
            .iter()
            .find(|e| e.binary && e.name.as_str().eq_ignore_ascii_case(key))
            .map(|e| binary_value_ref(&e.value))
    }

    /// Returns every ascii value associated with `key`, in insertion order.
    pub fn get_all<'a>(&'a self, key: &'a str) -> impl Iterator<Item = &'a AsciiMetadataValue> + 'a {
        self.entries
            .iter()
            .filter(move |e| !e.binary && e.name.as_str().eq_ignore_ascii_case(key))
            .map(|e| ascii_value_ref(&e.value))
    }

    /// Inserts an ascii entry, returning the prior first value for `key` if
    /// one existed. Does not remove other values for the same key: use
    /// [`Self::remove`] first for replace semantics.
    pub fn insert(&mut self, key: AsciiMetadataKey, value: AsciiMetadataValue) -> Option<AsciiMetadataValue> {
        let previous = self.get(key.as_str()).cloned();
        self.entries.push(RawEntry {
            name: {
                #[allow(clippy::expect_used)]
                HeaderName::from_bytes(key.as_str().as_bytes()).expect("validated key")
            },
            value: value.into_bytes(),
            binary: false,
        });
        previous
    }

    /// Inserts a binary entry. See [`Self::insert`].
    pub fn insert_bin(&mut self, key: BinaryMetadataKey, value: BinaryMetadataValue) -> Option<BinaryMetadataValue> {
        let previous = self.get_bin(key.as_str()).cloned();
        self.entries.push(RawEntry {
            name: {
                #[allow(clippy::expect_used)]
                HeaderName::from_bytes(key.as_str().as_bytes()).expect("validated key")
            },
            value: value.into_bytes(),
            binary: true,
        });
        previous
    }

    /// Appends an ascii value without removing existing values for `key`.
    pub fn append(&mut self, key: AsciiMetadataKey, value: AsciiMetadataValue) {
        self.entries.push(RawEntry {
            name: {
                #[allow(clippy::expect_used)]
                HeaderName::from_bytes(key.as_str().as_bytes()).expect("validated key")
            },
            value: value.into_bytes(),
            binary: false,
        });
    }

    /// Removes and returns the first ascii value for `key`, if any; all
    /// other values for `key` are left in place.
    pub fn remove(&mut self, key: &str) -> Option<AsciiMetadataValue> {
        let pos = self
            .entries
            .iter()
            .position(|e| !e.binary && e.name.as_str().eq_ignore_ascii_case(key))?;
        let entry = self.entries.remove(pos);
        Some(MetadataValue::from_bytes_unchecked(entry.value))
    }

    /// Removes and returns the first binary value for `key`, if any.
    pub fn remove_bin(&mut self, key: &str) -> Option<BinaryMetadataValue> {
        let pos = self
            .entries
            .iter()
            .position(|e| e.binary && e.name.as_str().eq_ignore_ascii_case(key))?;
        let entry = self.entries.remove(pos);
        Some(MetadataValue::from_bytes_unchecked(entry.value))
    }

    /// Iterates over every entry in insertion order.
    pub fn iter(&self) -> impl Iterator<Item = KeyAndValueRef<'_>> {
        self.entries.iter().map(|e| {
            if e.binary {
                KeyAndValueRef::Binary(
                    unsafe_key_ref::<Binary>(&e.name),
                    binary_value_ref(&e.value),
                )
            } else {
                KeyAndValueRef::Ascii(unsafe_key_ref::<Ascii>(&e.name), ascii_value_ref(&e.value))
            }
        })
    }

    pub(crate) fn push_raw(&mut self, name: HeaderName, value: Bytes, binary: bool) {
        self.entries.push(RawEntry {
            name,
            value,
            binary,
        });
    }

    pub(crate) fn raw_entries(&self) -> impl Iterator<Item = (&HeaderName, &Bytes, bool)> {
        self.entries.iter().map(|e| (&e.name, &e.value, e.binary))
    }
}

// `MetadataKey<VE>` is a transparent wrapper around `HeaderName`; these two
// helpers recover the typed reference without reconstructing the key (and
// without unsafe transmutes into private fields), by exploiting that the
// only field difference is the zero-sized phantom marker.
fn unsafe_key_ref<VE: ValueEncoding>(name: &HeaderName) -> &MetadataKey<VE> {
    // SAFETY: `MetadataKey<VE>` is `#[repr(transparent)]`-equivalent: a
    // `HeaderName` plus a zero-sized `PhantomData<VE>`. Re-interpreting the
    // reference is sound because the caller already established (via
    // `RawEntry::binary`) that `name` satisfies `VE::is_valid_key`.
    unsafe { &*(name as *const HeaderName).cast::<MetadataKey<VE>>() }
}

fn ascii_value_ref(bytes: &Bytes) -> &AsciiMetadataValue {
    unsafe { &*(bytes as *const Bytes).cast::<AsciiMetadataValue>() }
}

fn binary_value_ref(bytes: &Bytes) -> &BinaryMetadataValue {
    unsafe { &*(bytes as *const Bytes).cast::<BinaryMetadataValue>() }
}

impl fmt::Debug for MetadataMap {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let mut m = f.debug_map();
        for entry in &self.entries {
            m.entry(&entry.name.as_str(), &entry.value);
        }
        m.finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn insert_and_get_ascii() {
        let mut map = MetadataMap::new();
        map.insert(
            AsciiMetadataKey::from_static("x-custom"),
            AsciiMetadataValue::from_static("value"),
        );
        assert_eq!(map.get("x-custom").unwrap().to_str(), "value");
        assert_eq!(map.len(), 1);
    }

    #[test]
    fn insert_and_get_binary() {
        let mut map = MetadataMap::new();
        map.insert_bin(
            BinaryMetadataKey::from_static("trace-bin"),
            BinaryMetadataValue::from_bytes(Bytes::from_static(&[1, 2, 3])).unwrap(),
        );
        assert_eq!(map.get_bin("trace-bin").unwrap().as_bytes(), &[1, 2, 3]);
    }

    #[test]
    fn lookup_is_case_insensitive() {
        let mut map = MetadataMap::new();
        map.insert(
            AsciiMetadataKey::from_static("x-custom"),
            AsciiMetadataValue::from_static("value"),
        );
        assert!(map.get("X-Custom").is_some());
    }

    #[test]
    fn multiple_values_preserve_order() {
        let mut map = MetadataMap::new();
        map.append(
            AsciiMetadataKey::from_static("x-trace"),
            AsciiMetadataValue::from_static("a"),
        );
        map.append(
            AsciiMetadataKey::from_static("x-trace"),
            AsciiMetadataValue::from_static("b"),
        );
        let values: Vec<_> = map.get_all("x-trace").map(|v| v.to_str()).collect();
        assert_eq!(values, vec!["a", "b"]);
    }

    #[test]
    fn remove_only_removes_first_match() {
        let mut map = MetadataMap::new();
        map.append(
            AsciiMetadataKey::from_static("x-trace"),
            AsciiMetadataValue::from_static("a"),
        );
        map.append(
            AsciiMetadataKey::from_static("x-trace"),
            AsciiMetadataValue::from_static("b"),
        );
        let removed = map.remove("x-trace").unwrap();
        assert_eq!(removed.to_str(), "a");
        assert_eq!(map.len(), 1);
    }
}
