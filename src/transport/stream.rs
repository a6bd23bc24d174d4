//! Per-RPC stream lifecycle state machine.
//!
//! Mirrors the shape of h2-family `proto::streams::state` designs (a plain
//! state enum with `&mut self` transition methods) cut down to the
//! client-only, gRPC-flavored transitions this crate needs: no server-side
//! reservation states, no raw HTTP/2 flow-control bookkeeping (that lives
//! in the [`super::Framer`] collaborator).

use crate::transport::error::{LifecycleError, LifecycleKind};
use crate::Status;

/// State of a single client-initiated HTTP/2 stream.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StreamState {
    /// Enqueued, waiting for the admission loop to assign an id and write
    /// its HEADERS frame.
    Pending,
    /// HEADERS frame written; awaiting the peer's response headers.
    HeadersSent,
    /// Response headers received; data may flow in both directions.
    Open,
    /// The peer has half-closed its end (`DATA` with `endStream=true`);
    /// awaiting trailers or a reset.
    HalfClosedRemote,
    /// Terminal. No further transitions are possible.
    Closed,
}

impl StreamState {
    /// `PENDING --(admitted)--> HEADERS_SENT`.
    pub fn admit(&mut self) -> Result<(), LifecycleError> {
        match self {
            Self::Pending => {
                *self = Self::HeadersSent;
                Ok(())
            }
            Self::Closed => Err(LifecycleError::new(LifecycleKind::AlreadyClosed)),
            _ => Err(LifecycleError::new(LifecycleKind::UnexpectedEvent)),
        }
    }

    /// `HEADERS_SENT --(transport HEADERS in)--> OPEN`.
    pub fn recv_headers(&mut self) -> Result<(), LifecycleError> {
        match self {
            Self::HeadersSent => {
                *self = Self::Open;
                Ok(())
            }
            Self::Closed => Err(LifecycleError::new(LifecycleKind::AlreadyClosed)),
            _ => Err(LifecycleError::new(LifecycleKind::UnexpectedEvent)),
        }
    }

    /// `OPEN --(DATA in)--> OPEN | HALF_CLOSED_REMOTE`, depending on
    /// `end_stream`.
    pub fn recv_data(&mut self, end_stream: bool) -> Result<(), LifecycleError> {
        match self {
            Self::Open if end_stream => {
                *self = Self::HalfClosedRemote;
                Ok(())
            }
            Self::Open => Ok(()),
            Self::Closed => Err(LifecycleError::new(LifecycleKind::AlreadyClosed)),
            _ => Err(LifecycleError::new(LifecycleKind::UnexpectedEvent)),
        }
    }

    /// `OPEN | HALF_CLOSED_REMOTE --(trailers in, endStream=true)--> CLOSED`.
    pub fn recv_trailers(&mut self) -> Result<(), LifecycleError> {
        match self {
            Self::Open | Self::HalfClosedRemote => {
                *self = Self::Closed;
                Ok(())
            }
            Self::Closed => Err(LifecycleError::new(LifecycleKind::AlreadyClosed)),
            _ => Err(LifecycleError::new(LifecycleKind::UnexpectedEvent)),
        }
    }

    /// `OPEN | HEADERS_SENT --(RST_STREAM in)--> CLOSED`.
    pub fn recv_rst_stream(&mut self) -> Result<(), LifecycleError> {
        match self {
            Self::HeadersSent | Self::Open | Self::HalfClosedRemote => {
                *self = Self::Closed;
                Ok(())
            }
            Self::Closed => Err(LifecycleError::new(LifecycleKind::AlreadyClosed)),
            _ => Err(LifecycleError::new(LifecycleKind::UnexpectedEvent)),
        }
    }

    /// Any non-`Closed` state moves straight to `Closed`. Used for the
    /// three transitions that are unconditional from "any non-CLOSED"
    /// state: local cancel, stream-level error, and
    /// connection-inactive/GOAWAY-past-last-known-id.
    pub fn close(&mut self) -> Result<(), LifecycleError> {
        match self {
            Self::Closed => Err(LifecycleError::new(LifecycleKind::AlreadyClosed)),
            _ => {
                *self = Self::Closed;
                Ok(())
            }
        }
    }

    /// Whether this stream is in its terminal state.
    #[must_use]
    pub fn is_closed(self) -> bool {
        matches!(self, Self::Closed)
    }
}

/// The multiplexer's view of one client stream: its HTTP/2 id (assigned
/// only once admitted), its lifecycle state, and the one final [`Status`]
/// it is allowed to report.
///
/// Grounded on the "client stream references its HTTP/2 stream weakly via
/// id lookup" back-reference design: `ClientStream` is the strongly-owned
/// side, kept in the multiplexer's property table (see
/// `transport::multiplexer`) and removed on `Closed` to avoid leaks.
#[derive(Debug)]
pub struct ClientStream {
    id: Option<u32>,
    state: StreamState,
    final_status: Option<Status>,
}

impl ClientStream {
    /// Creates a new stream in `Pending`, with no id yet assigned.
    #[must_use]
    pub fn new() -> Self {
        Self {
            id: None,
            state: StreamState::Pending,
            final_status: None,
        }
    }

    /// The stream's HTTP/2 id, if one has been assigned by admission.
    #[must_use]
    pub fn id(&self) -> Option<u32> {
        self.id
    }

    /// The stream's current lifecycle state.
    #[must_use]
    pub fn state(&self) -> StreamState {
        self.state
    }

    /// Assigns `id` and moves the stream to `HeadersSent`, as the
    /// admission loop does after writing the HEADERS frame.
    pub fn admit(&mut self, id: u32) -> Result<(), LifecycleError> {
        self.state.admit()?;
        self.id = Some(id);
        Ok(())
    }

    /// `HEADERS_SENT --(transport HEADERS in)--> OPEN`.
    pub fn recv_headers(&mut self) -> Result<(), LifecycleError> {
        self.state.recv_headers()
    }

    /// `OPEN --(DATA in)--> OPEN | HALF_CLOSED_REMOTE`.
    pub fn recv_data(&mut self, end_stream: bool) -> Result<(), LifecycleError> {
        self.state.recv_data(end_stream)
    }

    /// `OPEN | HALF_CLOSED_REMOTE --(trailers in)--> CLOSED`.
    pub fn recv_trailers(&mut self) -> Result<(), LifecycleError> {
        self.state.recv_trailers()
    }

    /// `OPEN | HEADERS_SENT --(RST_STREAM in)--> CLOSED`.
    pub fn recv_rst_stream(&mut self) -> Result<(), LifecycleError> {
        self.state.recv_rst_stream()
    }

    /// Unconditional close from any non-`Closed` state: local cancel,
    /// stream-level error, or connection-inactive/GOAWAY.
    pub fn force_close(&mut self) -> Result<(), LifecycleError> {
        self.state.close()
    }

    /// Cancels the stream locally if it isn't already `Closed`.
    ///
    /// Returns `true` if this call actually performed the cancellation
    /// (and the caller should follow up with a RST_STREAM / pending-queue
    /// removal); `false` if the stream was already closed, making this a
    /// no-op per the §8 idempotence requirement.
    pub fn cancel_local(&mut self) -> bool {
        if self.state.is_closed() {
            return false;
        }
        let _ = self.state.close();
        self.report_final(Status::cancelled("cancelled by caller"));
        true
    }

    /// Records the one and only final status this stream may report.
    ///
    /// Returns `false` (and leaves the existing status untouched) if a
    /// final status was already recorded, enforcing the "at most one
    /// final Status reported per stream" invariant.
    pub fn report_final(&mut self, status: Status) -> bool {
        if self.final_status.is_some() {
            return false;
        }
        self.final_status = Some(status);
        true
    }

    /// The final status this stream reported, if any.
    #[must_use]
    pub fn final_status(&self) -> Option<&Status> {
        self.final_status.as_ref()
    }
}

impl Default for ClientStream {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn happy_path_transitions() {
        let mut s = StreamState::Pending;
        s.admit().unwrap();
        assert_eq!(s, StreamState::HeadersSent);
        s.recv_headers().unwrap();
        assert_eq!(s, StreamState::Open);
        s.recv_data(false).unwrap();
        assert_eq!(s, StreamState::Open);
        s.recv_data(true).unwrap();
        assert_eq!(s, StreamState::HalfClosedRemote);
        s.recv_trailers().unwrap();
        assert_eq!(s, StreamState::Closed);
    }

    #[test]
    fn no_transition_escapes_closed() {
        let mut s = StreamState::Closed;
        assert!(s.admit().is_err());
        assert!(s.recv_headers().is_err());
        assert!(s.recv_data(false).is_err());
        assert!(s.recv_trailers().is_err());
        assert!(s.recv_rst_stream().is_err());
        assert!(s.close().is_err());
        assert_eq!(s, StreamState::Closed);
    }

    #[test]
    fn rst_stream_closes_from_open_or_headers_sent() {
        let mut s = StreamState::HeadersSent;
        s.recv_rst_stream().unwrap();
        assert_eq!(s, StreamState::Closed);

        let mut s = StreamState::Open;
        s.recv_rst_stream().unwrap();
        assert_eq!(s, StreamState::Closed);
    }

    #[test]
    fn close_is_unconditional_from_any_non_closed_state() {
        for mut s in [
            StreamState::Pending,
            StreamState::HeadersSent,
            StreamState::Open,
            StreamState::HalfClosedRemote,
        ] {
            s.close().unwrap();
            assert_eq!(s, StreamState::Closed);
        }
    }

    #[test]
    fn only_first_final_status_is_recorded() {
        let mut stream = ClientStream::new();
        assert!(stream.report_final(Status::ok("")));
        assert!(!stream.report_final(Status::internal("too late")));
        assert_eq!(stream.final_status().unwrap().code(), crate::Code::Ok);
    }

    #[test]
    fn cancel_on_already_closed_stream_is_a_no_op() {
        // Mirrors the §8 idempotence requirement: cancelling an
        // already-CLOSED stream succeeds as a no-op rather than erroring
        // at the `ClientStream`/multiplexer boundary.
        let mut stream = ClientStream::new();
        stream.admit(1).unwrap();
        stream.state.close().unwrap();
        assert!(stream.state.is_closed());
        // A second close attempt is rejected by `StreamState` itself; the
        // multiplexer's cancel handler treats that rejection as the no-op.
        assert!(stream.state.close().is_err());
    }

    use quickcheck::{Arbitrary, Gen};
    use quickcheck_macros::quickcheck;

    #[derive(Clone, Copy, Debug)]
    enum Event {
        Admit,
        RecvHeaders,
        RecvData(bool),
        RecvTrailers,
        RecvRstStream,
        Close,
    }

    impl Arbitrary for Event {
        fn arbitrary(g: &mut Gen) -> Self {
            match u8::arbitrary(g) % 6 {
                0 => Self::Admit,
                1 => Self::RecvHeaders,
                2 => Self::RecvData(bool::arbitrary(g)),
                3 => Self::RecvTrailers,
                4 => Self::RecvRstStream,
                _ => Self::Close,
            }
        }
    }

    #[quickcheck]
    fn no_sequence_of_events_escapes_closed(events: Vec<Event>) -> bool {
        let mut state = StreamState::Pending;
        for event in events {
            let _ = match event {
                Event::Admit => state.admit(),
                Event::RecvHeaders => state.recv_headers(),
                Event::RecvData(end) => state.recv_data(end),
                Event::RecvTrailers => state.recv_trailers(),
                Event::RecvRstStream => state.recv_rst_stream(),
                Event::Close => state.close(),
            };
            if state == StreamState::Closed {
                // Once Closed, every subsequent transition in this run must
                // keep failing and the state must never move again.
                let before = state;
                let _ = state.admit();
                if state != before {
                    return false;
                }
            }
        }
        true
    }
}
