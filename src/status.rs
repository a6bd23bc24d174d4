use std::borrow::Cow;
use std::error::Error;
use std::fmt;
use std::sync::Arc;

use base64::alphabet;
use base64::engine::general_purpose::{GeneralPurposeConfig, STANDARD_NO_PAD};
use base64::engine::{DecodePaddingMode, GeneralPurpose};
use base64::Engine as _;
use bytes::Bytes;
use http::{HeaderName, HeaderValue};
use percent_encoding::{percent_decode, percent_encode, AsciiSet, CONTROLS};

use crate::metadata::MetadataMap;

/// Decodes both padded and unpadded base64, per `spec.md` §6's "decode MUST
/// accept both padded and unpadded"; encoding still always produces the
/// unpadded form via [`STANDARD_NO_PAD`].
const LENIENT_DECODE: GeneralPurpose = GeneralPurpose::new(
    &alphabet::STANDARD,
    GeneralPurposeConfig::new().with_decode_padding_mode(DecodePaddingMode::Indifferent),
);

const ENCODING_SET: &AsciiSet = &CONTROLS
    .add(b' ')
    .add(b'"')
    .add(b'#')
    .add(b'%')
    .add(b'<')
    .add(b'>')
    .add(b'`')
    .add(b'?')
    .add(b'{')
    .add(b'}');

/// A gRPC status describing the outcome of an RPC call.
///
/// ```
/// use grpc_transport_core::{Code, Status};
///
/// let status1 = Status::new(Code::InvalidArgument, "name is invalid");
/// let status2 = Status::invalid_argument("name is invalid");
///
/// assert_eq!(status1.code(), Code::InvalidArgument);
/// assert_eq!(status1.code(), status2.code());
/// ```
#[derive(Clone)]
pub struct Status(Box<StatusInner>);

#[derive(Clone)]
struct StatusInner {
    code: Code,
    message: Arc<str>,
    details: Bytes,
    metadata: MetadataMap,
    source: Option<Arc<dyn Error + Send + Sync + 'static>>,
}

impl StatusInner {
    fn into_status(self) -> Status {
        Status(Box::new(self))
    }
}

/// gRPC status codes used by [`Status`].
///
/// Matches the [gRPC status codes](https://github.com/grpc/grpc/blob/master/doc/statuscodes.md#status-codes-and-their-use-in-grpc).
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum Code {
    /// The operation completed successfully.
    Ok = 0,
    /// The operation was cancelled.
    Cancelled = 1,
    /// Unknown error.
    Unknown = 2,
    /// Client specified an invalid argument.
    InvalidArgument = 3,
    /// Deadline expired before operation could complete.
    DeadlineExceeded = 4,
    /// Some requested entity was not found.
    NotFound = 5,
    /// Some entity that we attempted to create already exists.
    AlreadyExists = 6,
    /// The caller does not have permission to execute the specified operation.
    PermissionDenied = 7,
    /// Some resource has been exhausted.
    ResourceExhausted = 8,
    /// The system is not in a state required for the operation's execution.
    FailedPrecondition = 9,
    /// The operation was aborted.
    Aborted = 10,
    /// Operation was attempted past the valid range.
    OutOfRange = 11,
    /// Operation is not implemented or not supported.
    Unimplemented = 12,
    /// Internal error.
    Internal = 13,
    /// The service is currently unavailable.
    Unavailable = 14,
    /// Unrecoverable data loss or corruption.
    DataLoss = 15,
    /// The request does not have valid authentication credentials.
    Unauthenticated = 16,
}

impl Code {
    /// Get a human-readable description of this code.
    #[must_use]
    pub fn description(&self) -> &'static str {
        match self {
            Self::Ok => "The operation completed successfully",
            Self::Cancelled => "The operation was cancelled",
            Self::Unknown => "Unknown error",
            Self::InvalidArgument => "Client specified an invalid argument",
            Self::DeadlineExceeded => "Deadline expired before operation could complete",
            Self::NotFound => "Some requested entity was not found",
            Self::AlreadyExists => "Some entity that we attempted to create already exists",
            Self::PermissionDenied => {
                "The caller does not have permission to execute the specified operation"
            }
            Self::ResourceExhausted => "Some resource has been exhausted",
            Self::FailedPrecondition => {
                "The system is not in a state required for the operation's execution"
            }
            Self::Aborted => "The operation was aborted",
            Self::OutOfRange => "Operation was attempted past the valid range",
            Self::Unimplemented => "Operation is not implemented or not supported",
            Self::Internal => "Internal error",
            Self::Unavailable => "The service is currently unavailable",
            Self::DataLoss => "Unrecoverable data loss or corruption",
            Self::Unauthenticated => "The request does not have valid authentication credentials",
        }
    }
}

impl fmt::Display for Code {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        fmt::Display::fmt(self.description(), f)
    }
}

// ===== impl Status =====

impl Status {
    /// gRPC status code header name.
    pub const GRPC_STATUS: HeaderName = HeaderName::from_static("grpc-status");
    /// gRPC status message header name.
    pub const GRPC_MESSAGE: HeaderName = HeaderName::from_static("grpc-message");
    /// gRPC binary status details header name.
    pub const GRPC_STATUS_DETAILS: HeaderName =
        HeaderName::from_static("grpc-status-details-bin");

    /// Create a new `Status` with the associated code and message.
    pub fn new(code: Code, message: impl Into<Arc<str>>) -> Self {
        StatusInner {
            code,
            message: message.into(),
            details: Bytes::new(),
            metadata: MetadataMap::new(),
            source: None,
        }
        .into_status()
    }

    /// The operation completed successfully.
    pub fn ok(message: impl Into<Arc<str>>) -> Self {
        Self::new(Code::Ok, message)
    }

    /// The operation was cancelled, typically by the caller.
    pub fn cancelled(message: impl Into<Arc<str>>) -> Self {
        Self::new(Code::Cancelled, message)
    }

    /// Unknown error.
    pub fn unknown(message: impl Into<Arc<str>>) -> Self {
        Self::new(Code::Unknown, message)
    }

    /// Client specified an invalid argument.
    pub fn invalid_argument(message: impl Into<Arc<str>>) -> Self {
        Self::new(Code::InvalidArgument, message)
    }

    /// Deadline expired before operation could complete.
    pub fn deadline_exceeded(message: impl Into<Arc<str>>) -> Self {
        Self::new(Code::DeadlineExceeded, message)
    }

    /// Some requested entity was not found.
    pub fn not_found(message: impl Into<Arc<str>>) -> Self {
        Self::new(Code::NotFound, message)
    }

    /// Some entity that we attempted to create already exists.
    pub fn already_exists(message: impl Into<Arc<str>>) -> Self {
        Self::new(Code::AlreadyExists, message)
    }

    /// The caller does not have permission to execute the specified operation.
    pub fn permission_denied(message: impl Into<Arc<str>>) -> Self {
        Self::new(Code::PermissionDenied, message)
    }

    /// Some resource has been exhausted.
    pub fn resource_exhausted(message: impl Into<Arc<str>>) -> Self {
        Self::new(Code::ResourceExhausted, message)
    }

    /// The system is not in a state required for the operation's execution.
    pub fn failed_precondition(message: impl Into<Arc<str>>) -> Self {
        Self::new(Code::FailedPrecondition, message)
    }

    /// The operation was aborted.
    pub fn aborted(message: impl Into<Arc<str>>) -> Self {
        Self::new(Code::Aborted, message)
    }

    /// Operation was attempted past the valid range.
    pub fn out_of_range(message: impl Into<Arc<str>>) -> Self {
        Self::new(Code::OutOfRange, message)
    }

    /// Operation is not implemented or not supported/enabled.
    pub fn unimplemented(message: impl Into<Arc<str>>) -> Self {
        Self::new(Code::Unimplemented, message)
    }

    /// Internal errors. Some invariant expected by the underlying system has
    /// been broken.
    pub fn internal(message: impl Into<Arc<str>>) -> Self {
        Self::new(Code::Internal, message)
    }

    /// The service is currently unavailable, most likely a transient
    /// condition correctable by retrying with a backoff.
    pub fn unavailable(message: impl Into<Arc<str>>) -> Self {
        Self::new(Code::Unavailable, message)
    }

    /// Unrecoverable data loss or corruption.
    pub fn data_loss(message: impl Into<Arc<str>>) -> Self {
        Self::new(Code::DataLoss, message)
    }

    /// The request does not have valid authentication credentials.
    pub fn unauthenticated(message: impl Into<Arc<str>>) -> Self {
        Self::new(Code::Unauthenticated, message)
    }

    /// Create a new `Status` with the associated code, message, and binary
    /// details field.
    pub fn with_details(code: Code, message: impl Into<Arc<str>>, details: Bytes) -> Self {
        Self::with_details_and_metadata(code, message, details, MetadataMap::new())
    }

    /// Create a new `Status` with the associated code, message, and custom
    /// metadata.
    pub fn with_metadata(code: Code, message: impl Into<Arc<str>>, metadata: MetadataMap) -> Self {
        Self::with_details_and_metadata(code, message, Bytes::new(), metadata)
    }

    /// Create a new `Status` with the associated code, message, binary
    /// details field, and custom metadata.
    pub fn with_details_and_metadata(
        code: Code,
        message: impl Into<Arc<str>>,
        details: Bytes,
        metadata: MetadataMap,
    ) -> Self {
        StatusInner {
            code,
            message: message.into(),
            details,
            metadata,
            source: None,
        }
        .into_status()
    }

    /// Create a `Status` from an arbitrary error, walking its source chain
    /// for a recognizable cause.
    ///
    /// Falls back to `Code::Unknown` carrying the error's `Display` as the
    /// message, with the original error attached as the source, when no
    /// cause in the chain maps to a more specific code.
    #[must_use]
    pub fn from_error(err: Box<dyn Error + Send + Sync + 'static>) -> Self {
        Self::try_from_error(err).unwrap_or_else(|err| {
            let mut status = Self::new(Code::Unknown, err.to_string());
            status.0.source = Some(err.into());
            status
        })
    }

    /// Create a `Status` from an arbitrary error, returning the error
    /// unchanged if no cause in its source chain could be mapped.
    ///
    /// # Downcast stability
    ///
    /// This function makes no stability guarantees about exactly which
    /// causes it recognizes.
    pub fn try_from_error(
        err: Box<dyn Error + Send + Sync + 'static>,
    ) -> Result<Self, Box<dyn Error + Send + Sync + 'static>> {
        let err = match err.downcast::<Self>() {
            Ok(status) => return Ok(*status),
            Err(err) => err,
        };

        if let Some(mut status) = find_status_in_source_chain(&*err) {
            status.0.source = Some(err.into());
            return Ok(status);
        }

        Err(err)
    }

    /// Builds a `Status` for an HTTP/2 `RST_STREAM` received from the peer.
    ///
    /// Per the mapping decided for this transport, `RST_STREAM` always
    /// surfaces as `Code::Unknown` regardless of the frame's error code: the
    /// HTTP/2 error code space (`CANCEL`, `REFUSED_STREAM`, ...) describes a
    /// transport-level reason, not a gRPC status, and the two are not in
    /// general reliably interchangeable across implementations. Callers that
    /// need the raw error code can still find it in the source chain via
    /// [`Self::source`].
    #[must_use]
    pub fn from_rst_stream(raw_error_code: u32, source: Option<Arc<dyn Error + Send + Sync>>) -> Self {
        let mut status = Self::new(
            Code::Unknown,
            format!("stream reset by peer, h2 error code {raw_error_code}"),
        );
        status.0.source = source;
        status
    }

    /// Extract a [`Status`] from response trailers, if a `grpc-status`
    /// header is present. Returns `None` otherwise.
    #[must_use]
    pub fn from_header_map(header_map: &http::HeaderMap) -> Option<Self> {
        let code = Code::from_bytes(header_map.get(Self::GRPC_STATUS)?.as_bytes());

        let message = match header_map.get(Self::GRPC_MESSAGE) {
            Some(header) => percent_decode(header.as_bytes())
                .decode_utf8()
                .map(|cow| Arc::from(cow.as_ref())),
            None => Ok(Arc::from("")),
        };

        let details = match header_map.get(Self::GRPC_STATUS_DETAILS) {
            Some(header) => match LENIENT_DECODE.decode(header.as_bytes()) {
                Ok(v) => Bytes::from(v),
                Err(err) => {
                    tracing::debug!("failed to base64-decode grpc-status-details-bin: {err}");
                    Bytes::new()
                }
            },
            None => Bytes::new(),
        };

        let (code, message) = match message {
            Ok(message) => (code, message),
            Err(err) => {
                let message: Arc<str> =
                    Arc::from(format!("error deserializing status message header: {err}"));
                tracing::warn!("{message}");
                (Code::Unknown, message)
            }
        };

        Some(
            StatusInner {
                code,
                message,
                details,
                metadata: MetadataMap::new(),
                source: None,
            }
            .into_status(),
        )
    }

    /// Get the gRPC [`Code`] of this `Status`.
    #[must_use]
    pub fn code(&self) -> Code {
        self.0.code
    }

    /// Get the text error message of this `Status`.
    #[must_use]
    pub fn message(&self) -> &str {
        &self.0.message
    }

    /// Get the opaque binary error details of this `Status`.
    #[must_use]
    pub fn details(&self) -> &[u8] {
        &self.0.details
    }

    /// Get a reference to the status's custom metadata.
    #[must_use]
    pub fn metadata(&self) -> &MetadataMap {
        &self.0.metadata
    }

    /// Get a mutable reference to the status's custom metadata.
    pub fn metadata_mut(&mut self) -> &mut MetadataMap {
        &mut self.0.metadata
    }

    /// Add this status's headers (`grpc-status`, `grpc-message`,
    /// `grpc-status-details-bin`) into `header_map`.
    pub fn add_header(&self, header_map: &mut http::HeaderMap) -> Result<(), Self> {
        header_map.insert(Self::GRPC_STATUS, self.0.code.to_header_value());

        if !self.0.message.is_empty() {
            let encoded = Cow::from(percent_encode(self.message().as_bytes(), ENCODING_SET));
            header_map.insert(
                Self::GRPC_MESSAGE,
                HeaderValue::from_str(&encoded).map_err(invalid_header_value)?,
            );
        }

        if !self.0.details.is_empty() {
            let encoded = STANDARD_NO_PAD.encode(&self.0.details[..]);
            header_map.insert(
                Self::GRPC_STATUS_DETAILS,
                HeaderValue::from_str(&encoded).map_err(invalid_header_value)?,
            );
        }

        Ok(())
    }

    /// Applies the `override()` rule from the status-precedence invariant:
    /// an `Ok` status always loses to any other status; between two
    /// non-`Ok` statuses, `other` wins.
    #[must_use]
    pub fn override_with(self, other: Self) -> Self {
        if other.code() == Code::Ok {
            self
        } else {
            other
        }
    }

    /// Attach a source error to this status, replacing any existing one.
    pub fn set_source(&mut self, source: Arc<dyn Error + Send + Sync + 'static>) -> &mut Self {
        self.0.source = Some(source);
        self
    }
}

fn find_status_in_source_chain(err: &(dyn Error + 'static)) -> Option<Status> {
    let mut source = Some(err);

    while let Some(err) = source {
        if let Some(status) = err.downcast_ref::<Status>() {
            return Some(
                StatusInner {
                    code: status.0.code,
                    message: status.0.message.clone(),
                    details: status.0.details.clone(),
                    metadata: status.0.metadata.clone(),
                    // `Status` doesn't implement Clone for `source`, so any
                    // source on the original remains only on the original.
                    source: None,
                }
                .into_status(),
            );
        }

        source = err.source();
    }

    None
}

impl fmt::Debug for Status {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let mut builder = f.debug_struct("Status");
        builder.field("code", &self.0.code);
        if !self.0.message.is_empty() {
            builder.field("message", &self.0.message);
        }
        if !self.0.details.is_empty() {
            builder.field("details", &self.0.details);
        }
        if !self.0.metadata.is_empty() {
            builder.field("metadata", &self.0.metadata);
        }
        builder.field("source", &self.0.source);
        builder.finish()
    }
}

fn invalid_header_value<E: fmt::Display>(err: E) -> Status {
    tracing::debug!("invalid header value: {err}");
    Status::new(Code::Internal, "couldn't serialize non-text grpc status header")
}

impl From<std::io::Error> for Status {
    fn from(err: std::io::Error) -> Self {
        use std::io::ErrorKind;
        let code = match err.kind() {
            ErrorKind::BrokenPipe
            | ErrorKind::WouldBlock
            | ErrorKind::WriteZero
            | ErrorKind::Interrupted => Code::Internal,
            ErrorKind::ConnectionRefused
            | ErrorKind::ConnectionReset
            | ErrorKind::NotConnected
            | ErrorKind::AddrInUse
            | ErrorKind::AddrNotAvailable => Code::Unavailable,
            ErrorKind::AlreadyExists => Code::AlreadyExists,
            ErrorKind::ConnectionAborted => Code::Aborted,
            ErrorKind::InvalidData => Code::DataLoss,
            ErrorKind::InvalidInput => Code::InvalidArgument,
            ErrorKind::NotFound => Code::NotFound,
            ErrorKind::PermissionDenied => Code::PermissionDenied,
            ErrorKind::TimedOut => Code::DeadlineExceeded,
            ErrorKind::UnexpectedEof => Code::OutOfRange,
            _ => Code::Unknown,
        };
        Self::new(code, err.to_string())
    }
}

impl fmt::Display for Status {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "code: '{}'", self.code())?;
        if !self.message().is_empty() {
            write!(f, ", message: {:?}", self.message())?;
        }
        if !self.metadata().is_empty() {
            write!(f, ", metadata: {:?}", self.metadata())?;
        }
        if let Some(source) = self.source() {
            write!(f, ", source: {source:?}")?;
        }
        Ok(())
    }
}

impl Error for Status {
    fn source(&self) -> Option<&(dyn Error + 'static)> {
        self.0.source.as_ref().map(|err| (&**err) as _)
    }
}

// ===== impl Code =====

impl Code {
    /// Get the `Code` that represents the given integer, falling back to
    /// `Code::Unknown` if the value is out of the known range.
    #[must_use]
    #[allow(clippy::match_same_arms)]
    pub const fn from_i32(i: i32) -> Self {
        match i {
            0 => Self::Ok,
            1 => Self::Cancelled,
            2 => Self::Unknown,
            3 => Self::InvalidArgument,
            4 => Self::DeadlineExceeded,
            5 => Self::NotFound,
            6 => Self::AlreadyExists,
            7 => Self::PermissionDenied,
            8 => Self::ResourceExhausted,
            9 => Self::FailedPrecondition,
            10 => Self::Aborted,
            11 => Self::OutOfRange,
            12 => Self::Unimplemented,
            13 => Self::Internal,
            14 => Self::Unavailable,
            15 => Self::DataLoss,
            16 => Self::Unauthenticated,
            _ => Self::Unknown,
        }
    }

    /// Parse the string representation of a `Code`, as found in the
    /// `grpc-status` header. Returns `Code::Unknown` if unrecognized.
    #[must_use]
    pub fn from_bytes(bytes: &[u8]) -> Self {
        match bytes.len() {
            1 => match bytes[0] {
                b'0' => Self::Ok,
                b'1' => Self::Cancelled,
                b'2' => Self::Unknown,
                b'3' => Self::InvalidArgument,
                b'4' => Self::DeadlineExceeded,
                b'5' => Self::NotFound,
                b'6' => Self::AlreadyExists,
                b'7' => Self::PermissionDenied,
                b'8' => Self::ResourceExhausted,
                b'9' => Self::FailedPrecondition,
                _ => Self::parse_err(),
            },
            2 => match (bytes[0], bytes[1]) {
                (b'1', b'0') => Self::Aborted,
                (b'1', b'1') => Self::OutOfRange,
                (b'1', b'2') => Self::Unimplemented,
                (b'1', b'3') => Self::Internal,
                (b'1', b'4') => Self::Unavailable,
                (b'1', b'5') => Self::DataLoss,
                (b'1', b'6') => Self::Unauthenticated,
                _ => Self::parse_err(),
            },
            _ => Self::parse_err(),
        }
    }

    fn to_header_value(self) -> HeaderValue {
        match self {
            Self::Ok => HeaderValue::from_static("0"),
            Self::Cancelled => HeaderValue::from_static("1"),
            Self::Unknown => HeaderValue::from_static("2"),
            Self::InvalidArgument => HeaderValue::from_static("3"),
            Self::DeadlineExceeded => HeaderValue::from_static("4"),
            Self::NotFound => HeaderValue::from_static("5"),
            Self::AlreadyExists => HeaderValue::from_static("6"),
            Self::PermissionDenied => HeaderValue::from_static("7"),
            Self::ResourceExhausted => HeaderValue::from_static("8"),
            Self::FailedPrecondition => HeaderValue::from_static("9"),
            Self::Aborted => HeaderValue::from_static("10"),
            Self::OutOfRange => HeaderValue::from_static("11"),
            Self::Unimplemented => HeaderValue::from_static("12"),
            Self::Internal => HeaderValue::from_static("13"),
            Self::Unavailable => HeaderValue::from_static("14"),
            Self::DataLoss => HeaderValue::from_static("15"),
            Self::Unauthenticated => HeaderValue::from_static("16"),
        }
    }

    fn parse_err() -> Self {
        tracing::trace!("error parsing grpc-status, defaulting to Unknown");
        Self::Unknown
    }
}

impl From<i32> for Code {
    fn from(i: i32) -> Self {
        Self::from_i32(i)
    }
}

impl From<Code> for i32 {
    #[inline]
    fn from(code: Code) -> Self {
        code as Self
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[derive(Debug)]
    struct Nested(Box<dyn Error + Send + Sync>);

    impl fmt::Display for Nested {
        fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
            write!(f, "nested: {}", self.0)
        }
    }

    impl Error for Nested {
        fn source(&self) -> Option<&(dyn Error + 'static)> {
            Some(&*self.0)
        }
    }

    #[test]
    fn code_round_trips_through_header_value() {
        for i in 0..=16 {
            let code = Code::from_i32(i);
            let bytes = code.to_header_value();
            assert_eq!(Code::from_bytes(bytes.as_bytes()), code);
        }
    }

    #[test]
    fn unrecognized_code_parses_as_unknown() {
        assert_eq!(Code::from_bytes(b"99"), Code::Unknown);
        assert_eq!(Code::from_bytes(b"not-a-number"), Code::Unknown);
        assert_eq!(Code::from_i32(9000), Code::Unknown);
    }

    #[test]
    fn from_error_walks_nested_status() {
        let status = Status::invalid_argument("bad request");
        let nested = Nested(Box::new(status));
        let found = Status::from_error(Box::new(nested));
        assert_eq!(found.code(), Code::InvalidArgument);
        assert_eq!(found.message(), "bad request");
        assert!(found.source().is_some());
    }

    #[test]
    fn from_error_falls_back_to_unknown() {
        let err = std::io::Error::other("boom");
        let found = Status::from_error(Box::new(err));
        assert_eq!(found.code(), Code::Unknown);
    }

    #[test]
    fn header_round_trip_with_message_and_details() {
        let status = Status::with_details(
            Code::NotFound,
            "thing? not found",
            Bytes::from_static(b"\x01\x02\x03"),
        );
        let mut header_map = http::HeaderMap::new();
        status.add_header(&mut header_map).unwrap();

        let decoded = Status::from_header_map(&header_map).unwrap();
        assert_eq!(decoded.code(), Code::NotFound);
        assert_eq!(decoded.message(), "thing? not found");
        assert_eq!(decoded.details(), b"\x01\x02\x03");
    }

    #[test]
    fn from_header_map_accepts_padded_details_base64() {
        let mut header_map = http::HeaderMap::new();
        header_map.insert(Status::GRPC_STATUS, Code::NotFound.to_header_value());
        // "AQI=" is the padded encoding of [1, 2]; `add_header` never
        // produces padding itself, but a peer's encoder might.
        header_map.insert(Status::GRPC_STATUS_DETAILS, HeaderValue::from_static("AQI="));

        let decoded = Status::from_header_map(&header_map).unwrap();
        assert_eq!(decoded.details(), &[1, 2]);
    }

    #[test]
    fn override_prefers_non_ok() {
        let ok = Status::ok("");
        let err = Status::internal("boom");
        assert_eq!(ok.clone().override_with(err.clone()).code(), Code::Internal);
        assert_eq!(err.override_with(ok).code(), Code::Internal);
    }

    #[test]
    fn rst_stream_always_maps_to_unknown() {
        // RST_STREAM's h2 error code is a transport detail, not a gRPC
        // status; this transport never tries to infer a more specific code
        // from it. See `Status::from_rst_stream`.
        assert_eq!(Status::from_rst_stream(8 /* CANCEL */, None).code(), Code::Unknown);
        assert_eq!(Status::from_rst_stream(2 /* INTERNAL_ERROR */, None).code(), Code::Unknown);
    }

    use quickcheck::{Arbitrary, Gen};
    use quickcheck_macros::quickcheck;

    #[derive(Clone, Debug)]
    struct AnyCode(Code);

    impl Arbitrary for AnyCode {
        fn arbitrary(g: &mut Gen) -> Self {
            Self(Code::from_i32(i32::arbitrary(g) % 17))
        }
    }

    #[quickcheck]
    fn code_header_round_trip_holds_for_every_known_code(code: AnyCode) -> bool {
        Code::from_bytes(code.0.to_header_value().as_bytes()) == code.0
    }

    #[quickcheck]
    fn override_with_never_produces_ok_unless_both_sides_are(a: AnyCode, b: AnyCode) -> bool {
        let result = Status::new(a.0, "").override_with(Status::new(b.0, ""));
        (result.code() == Code::Ok) == (a.0 == Code::Ok && b.0 == Code::Ok)
    }
}
