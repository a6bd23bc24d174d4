use std::error::Error;
use std::fmt;
use std::marker::PhantomData;
use std::str;

use bytes::Bytes;

use super::encoding::{Ascii, Binary, ValueEncoding};

/// A gRPC metadata value.
///
/// Storage is always the decoded, logical value: an [`Ascii`] value holds
/// printable-ASCII text, a [`Binary`] value holds arbitrary bytes. Wire
/// encoding (base64 for binary entries) happens only at [`super::to_wire`]/
/// [`super::from_wire`] time, matching the codec contract in `spec.md` §4.1.
#[derive(Clone, Eq, PartialEq, Hash)]
#[repr(transparent)]
pub struct MetadataValue<VE: ValueEncoding> {
    bytes: Bytes,
    phantom: PhantomData<VE>,
}

/// An ascii metadata value.
pub type AsciiMetadataValue = MetadataValue<Ascii>;
/// A binary metadata value.
pub type BinaryMetadataValue = MetadataValue<Binary>;

/// Error returned when bytes are not a valid [`MetadataValue`] for the given
/// encoding (e.g. a non-printable-ASCII byte in an [`Ascii`] value).
#[derive(Debug, Clone, Copy, Default)]
pub struct InvalidMetadataValue {
    _priv: (),
}

impl<VE: ValueEncoding> MetadataValue<VE> {
    /// Wraps raw bytes as a metadata value, validating against this
    /// encoding's rules.
    pub fn from_bytes(bytes: impl Into<Bytes>) -> Result<Self, InvalidMetadataValue> {
        let bytes = bytes.into();
        if !VE::is_valid_value(&bytes) {
            return Err(InvalidMetadataValue::new());
        }
        Ok(Self {
            bytes,
            phantom: PhantomData,
        })
    }

    /// Constructs a value without validating it. Only used internally where
    /// the invariant is already established (e.g. decoding from the wire).
    pub(crate) fn from_bytes_unchecked(bytes: Bytes) -> Self {
        Self {
            bytes,
            phantom: PhantomData,
        }
    }

    /// Returns the raw, decoded bytes of this value.
    #[must_use]
    pub fn as_bytes(&self) -> &[u8] {
        &self.bytes
    }

    #[must_use]
    pub(crate) fn into_bytes(self) -> Bytes {
        self.bytes
    }
}

impl MetadataValue<Ascii> {
    /// Constructs an ascii value from a static string.
    ///
    /// # Panics
    ///
    /// Panics if `src` is not printable ASCII.
    #[must_use]
    pub fn from_static(src: &'static str) -> Self {
        Self::from_bytes(Bytes::from_static(src.as_bytes()))
            .unwrap_or_else(|_| panic!("invalid gRPC metadata value: {src:?}"))
    }

    /// Returns the value as a `str`. Always succeeds: ascii values are
    /// validated to be printable ASCII (hence valid UTF-8) at construction.
    #[must_use]
    pub fn to_str(&self) -> &str {
        str::from_utf8(&self.bytes).unwrap_or_default()
    }
}

impl<VE: ValueEncoding> fmt::Debug for MetadataValue<VE> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_tuple("MetadataValue").field(&&self.bytes[..]).finish()
    }
}

impl fmt::Display for InvalidMetadataValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("invalid gRPC metadata value")
    }
}

impl Error for InvalidMetadataValue {}

impl InvalidMetadataValue {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn ascii_rejects_control_bytes() {
        assert!(AsciiMetadataValue::from_bytes(Bytes::from_static(b"abc\x01")).is_err());
        assert!(AsciiMetadataValue::from_bytes(Bytes::from_static(b"abc")).is_ok());
    }

    #[test]
    fn binary_accepts_any_bytes() {
        let v = BinaryMetadataValue::from_bytes(Bytes::from_static(&[0, 1, 255])).unwrap();
        assert_eq!(v.as_bytes(), &[0, 1, 255]);
    }
}
