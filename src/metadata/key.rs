use std::borrow::Borrow;
use std::error::Error;
use std::fmt;
use std::marker::PhantomData;
use std::str::FromStr;

use http::HeaderName;

use super::encoding::{Ascii, Binary, ValueEncoding};

/// A gRPC metadata field name.
///
/// `MetadataKey` carries a `ValueEncoding` marker (`Ascii` or `Binary`) so
/// that ascii and binary (`-bin`-suffixed) entries cannot be confused at the
/// type level, mirroring the distinction `spec.md` §3 draws between the two.
#[derive(Clone, Eq, PartialEq, Hash)]
#[repr(transparent)]
pub struct MetadataKey<VE: ValueEncoding> {
    inner: HeaderName,
    phantom: PhantomData<VE>,
}

/// An ascii metadata key.
pub type AsciiMetadataKey = MetadataKey<Ascii>;
/// A binary metadata key.
pub type BinaryMetadataKey = MetadataKey<Binary>;

/// Error returned when a byte string is not a valid [`MetadataKey`].
#[derive(Debug, Default, Clone, Copy)]
pub struct InvalidMetadataKey {
    _priv: (),
}

impl<VE: ValueEncoding> MetadataKey<VE> {
    /// Converts a slice of bytes to a `MetadataKey`, normalizing case.
    pub fn from_bytes(src: &[u8]) -> Result<Self, InvalidMetadataKey> {
        let name = HeaderName::from_bytes(src).map_err(|_| InvalidMetadataKey::new())?;
        if !VE::is_valid_key(name.as_str()) {
            return Err(InvalidMetadataKey::new());
        }
        Ok(Self {
            inner: name,
            phantom: PhantomData,
        })
    }

    /// Converts a static string to a `MetadataKey`.
    ///
    /// # Panics
    ///
    /// Panics if `src` is not a valid key for this encoding.
    #[must_use]
    pub fn from_static(src: &'static str) -> Self {
        let name = HeaderName::from_static(src);
        if !VE::is_valid_key(name.as_str()) {
            panic!("invalid gRPC metadata key: {src}");
        }
        Self {
            inner: name,
            phantom: PhantomData,
        }
    }

    /// Returns the lower-case string representation of the key.
    #[must_use]
    pub fn as_str(&self) -> &str {
        self.inner.as_str()
    }

    /// Returns whether this key ends in the reserved binary suffix.
    #[must_use]
    pub fn is_binary(&self) -> bool {
        super::encoding::is_binary_key(self.as_str())
    }
}

impl<VE: ValueEncoding> FromStr for MetadataKey<VE> {
    type Err = InvalidMetadataKey;

    fn from_str(s: &str) -> Result<Self, InvalidMetadataKey> {
        Self::from_bytes(s.as_bytes())
    }
}

impl<VE: ValueEncoding> AsRef<str> for MetadataKey<VE> {
    fn as_ref(&self) -> &str {
        self.as_str()
    }
}

impl<VE: ValueEncoding> Borrow<str> for MetadataKey<VE> {
    fn borrow(&self) -> &str {
        self.as_str()
    }
}

impl<VE: ValueEncoding> fmt::Debug for MetadataKey<VE> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        fmt::Debug::fmt(self.as_str(), f)
    }
}

impl<VE: ValueEncoding> fmt::Display for MetadataKey<VE> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        fmt::Display::fmt(self.as_str(), f)
    }
}

impl<VE: ValueEncoding> PartialEq<str> for MetadataKey<VE> {
    fn eq(&self, other: &str) -> bool {
        self.inner == other
    }
}

impl<VE: ValueEncoding> PartialEq<&str> for MetadataKey<VE> {
    fn eq(&self, other: &&str) -> bool {
        self.inner == *other
    }
}

impl InvalidMetadataKey {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }
}

impl fmt::Display for InvalidMetadataKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("invalid gRPC metadata key name")
    }
}

impl Error for InvalidMetadataKey {}
