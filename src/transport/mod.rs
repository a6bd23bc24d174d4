//! The client HTTP/2 stream multiplexer: stream lifecycle, pending-stream
//! admission, and the command/event routing that ties them to a framer
//! collaborator.
//!
//! This module does not implement an HTTP/2 framer itself — [`Framer`] is
//! the event interface a concrete HTTP/2 implementation is expected to
//! satisfy, the same way the teacher's transport keeps the raw HTTP/2
//! machinery behind `rama-http-core` and exposes only a connection-service
//! abstraction to the rest of the crate.

mod command;
mod error;
mod multiplexer;
mod pending;
mod stream;

pub use command::Command;
pub use error::{LifecycleError, MultiplexerError};
pub use multiplexer::{Multiplexer, MultiplexerConfig, MultiplexerHandle};
pub use pending::{PendingStream, StreamIdPool};
pub use stream::{ClientStream, StreamState};

use std::error::Error as StdError;
use std::fmt;

use bytes::Bytes;
use rama_error::BoxError;

/// The event interface a concrete HTTP/2 implementation must satisfy to
/// sit underneath the multiplexer.
///
/// Kept deliberately out of scope per this crate's purpose: only the
/// boundary with a framer is specified, not a framer itself.
pub trait Framer: Send + Sync + 'static {
    /// Writes a HEADERS frame for `stream_id`, optionally ending the
    /// stream (a trailers-only response has no body).
    fn write_headers(
        &self,
        stream_id: u32,
        headers: http::HeaderMap,
        end_stream: bool,
    ) -> impl std::future::Future<Output = Result<(), FramerError>> + Send;

    /// Writes a DATA frame carrying `payload` for `stream_id`.
    fn write_data(
        &self,
        stream_id: u32,
        payload: Bytes,
        end_stream: bool,
    ) -> impl std::future::Future<Output = Result<(), FramerError>> + Send;

    /// Writes a RST_STREAM frame for `stream_id` with the given HTTP/2
    /// error code.
    fn write_rst_stream(
        &self,
        stream_id: u32,
        error_code: u32,
    ) -> impl std::future::Future<Output = Result<(), FramerError>> + Send;

    /// Forwards `n` processed bytes of flow-control credit for `stream_id`
    /// to the underlying HTTP/2 connection (a WINDOW_UPDATE, in HTTP/2
    /// terms), so the peer can keep sending data on that stream.
    fn return_processed_bytes(
        &self,
        stream_id: u32,
        n: usize,
    ) -> impl std::future::Future<Output = Result<(), FramerError>> + Send;
}

/// Inbound events the framer collaborator delivers to the multiplexer.
#[derive(Debug)]
pub enum FramerEvent {
    /// HEADERS received for `stream_id`.
    Headers {
        stream_id: u32,
        headers: http::HeaderMap,
        end_stream: bool,
    },
    /// DATA received for `stream_id`.
    Data {
        stream_id: u32,
        payload: Bytes,
        end_stream: bool,
    },
    /// RST_STREAM received for `stream_id`, carrying the peer's HTTP/2
    /// error code (see [`crate::Status::from_rst_stream`] for how it's
    /// mapped, or rather, deliberately not mapped, to a gRPC status).
    RstStream { stream_id: u32, error_code: u32 },
    /// GOAWAY sent or received, naming the peer's last-known-stream id.
    GoAway { last_stream_id: u32 },
    /// A connection-level fault, fatal to every stream.
    ConnectionError(BoxError),
    /// A fault scoped to one stream.
    StreamError { stream_id: u32, cause: BoxError },
    /// The channel/connection became inactive (e.g. TCP reset).
    Inactive,
}

/// Error returned by a [`Framer`] write method.
#[derive(Debug)]
pub struct FramerError(BoxError);

impl FramerError {
    #[must_use]
    pub fn new(cause: impl Into<BoxError>) -> Self {
        Self(cause.into())
    }
}

impl fmt::Display for FramerError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "framer error: {}", self.0)
    }
}

impl StdError for FramerError {
    fn source(&self) -> Option<&(dyn StdError + 'static)> {
        Some(&*self.0)
    }
}
