//! gRPC metadata: the ordered multimap of header-like key/value pairs
//! attached to a call, and its wire codec.
//!
//! Storage (via [`MetadataMap`]) always holds the decoded, logical value.
//! The wire representation only differs for binary (`-bin`-suffixed) entries,
//! which are base64-encoded; [`to_wire`] and [`from_wire`] are the only
//! places that encoding happens.

mod encoding;
mod key;
mod map;
mod value;

pub use encoding::{is_binary_key, Ascii, Binary, ValueEncoding, BINARY_HEADER_SUFFIX};
pub use key::{AsciiMetadataKey, BinaryMetadataKey, InvalidMetadataKey, MetadataKey};
pub use map::{KeyAndValueRef, MetadataMap};
pub use value::{AsciiMetadataValue, BinaryMetadataValue, InvalidMetadataValue, MetadataValue};

use std::error::Error;
use std::fmt;

use base64::alphabet;
use base64::engine::general_purpose::{GeneralPurposeConfig, STANDARD_NO_PAD};
use base64::engine::{DecodePaddingMode, GeneralPurpose};
use base64::Engine;
use bytes::Bytes;
use http::HeaderName;

/// Decodes both padded and unpadded base64, per `spec.md` §6's "decode MUST
/// accept both padded and unpadded"; encoding still always produces the
/// unpadded form via [`STANDARD_NO_PAD`].
const LENIENT_DECODE: GeneralPurpose = GeneralPurpose::new(
    &alphabet::STANDARD,
    GeneralPurposeConfig::new().with_decode_padding_mode(DecodePaddingMode::Indifferent),
);

/// A single wire-ready metadata entry: a key name and its on-wire bytes
/// (already base64-encoded for binary entries).
pub struct WireEntry {
    /// The field name, unchanged from the logical key.
    pub name: HeaderName,
    /// The on-wire value: raw ascii bytes, or base64 text for binary entries.
    pub value: Bytes,
}

/// Error produced by [`from_wire`] when a wire entry cannot be decoded into
/// a logical [`MetadataMap`] entry.
#[derive(Debug)]
pub enum MetadataDecodeError {
    /// A binary (`-bin`) entry's value was not valid base64.
    InvalidBase64 {
        /// The offending field name.
        name: HeaderName,
    },
}

impl fmt::Display for MetadataDecodeError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::InvalidBase64 { name } => {
                write!(f, "metadata field {name:?} is not valid base64")
            }
        }
    }
}

impl Error for MetadataDecodeError {}

/// Encodes every entry of `map` into its wire representation.
///
/// Binary entries are base64-encoded (unpadded, standard alphabet), matching
/// the `-bin` convention used by gRPC-over-HTTP/2. Ascii entries that somehow
/// hold a non-printable-ASCII value (which should not be reachable through
/// the public API, since [`MetadataValue::from_bytes`] validates on
/// construction) are dropped with a warning rather than sent malformed.
#[must_use]
pub fn to_wire(map: &MetadataMap) -> Vec<WireEntry> {
    let mut out = Vec::with_capacity(map.len());
    for (name, value, binary) in map.raw_entries() {
        if binary {
            let encoded = STANDARD_NO_PAD.encode(value);
            out.push(WireEntry {
                name: name.clone(),
                value: Bytes::from(encoded),
            });
        } else if Ascii::is_valid_value(value) {
            out.push(WireEntry {
                name: name.clone(),
                value: value.clone(),
            });
        } else {
            tracing::warn!(field = %name, "dropping metadata entry with non-ascii value");
        }
    }
    out
}

/// Decodes a sequence of wire entries into a [`MetadataMap`].
///
/// Binary (`-bin`-suffixed) entries are base64-decoded; a malformed base64
/// payload is reported via [`MetadataDecodeError::InvalidBase64`] rather than
/// silently dropped, since it usually indicates a peer bug worth surfacing.
pub fn from_wire(
    entries: impl IntoIterator<Item = WireEntry>,
) -> Result<MetadataMap, MetadataDecodeError> {
    let mut map = MetadataMap::new();
    for entry in entries {
        if is_binary_key(entry.name.as_str()) {
            let decoded = LENIENT_DECODE
                .decode(&entry.value)
                .map_err(|_| MetadataDecodeError::InvalidBase64 {
                    name: entry.name.clone(),
                })?;
            map.push_raw(entry.name, Bytes::from(decoded), true);
        } else {
            map.push_raw(entry.name, entry.value, false);
        }
    }
    Ok(map)
}
