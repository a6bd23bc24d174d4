//! The client multiplexer (§4.4): the heart of this crate. Serializes all
//! events on one I/O context task, dispatches write commands, and routes
//! inbound framer events to their streams.

use std::collections::{HashMap, VecDeque};
use std::sync::Arc;

use bytes::Bytes;
use tokio::sync::{mpsc, oneshot};

use crate::transport::command::Command;
use crate::transport::error::{MultiplexerError, MultiplexerKind};
use crate::transport::pending::{run_admission, PendingStream, StreamHandle, StreamIdPool};
use crate::transport::stream::StreamState;
use crate::transport::{Framer, FramerEvent};
use crate::Status;

/// HTTP/2 error code for a locally-initiated cancel.
const H2_CANCEL: u32 = 0x8;
/// HTTP/2 error code used when this crate resets a stream after a
/// stream-level error.
const H2_INTERNAL_ERROR: u32 = 0x2;

/// Configuration the multiplexer is constructed with, mirroring how the
/// teacher threads connection configuration through a builder.
#[derive(Debug, Clone)]
pub struct MultiplexerConfig {
    /// Whether the connection starts out accepting new streams. A real
    /// deployment flips this in response to the peer's
    /// `SETTINGS_MAX_CONCURRENT_STREAMS`; defaulting to `true` matches an
    /// HTTP/2 connection's behavior before its first SETTINGS frame.
    pub initial_accepting_new_streams: bool,
}

impl Default for MultiplexerConfig {
    fn default() -> Self {
        Self {
            initial_accepting_new_streams: true,
        }
    }
}

/// Cloneable, `Send + Sync` front door used by RPC-issuing tasks to post
/// commands to the multiplexer's single I/O-context task.
///
/// Holds only a sender clone: posting a command from any thread cannot
/// race with the consuming task's state, since all mutation happens only
/// when that task dequeues and processes the command.
#[derive(Clone)]
pub struct MultiplexerHandle {
    commands: mpsc::UnboundedSender<Command>,
}

impl MultiplexerHandle {
    /// Enqueues a `CreateStream` command, returning a receiver that
    /// resolves to the assigned stream id, or a [`Status`] if the stream
    /// could never be admitted.
    pub fn create_stream(
        &self,
        headers: http::HeaderMap,
        stream: StreamHandle,
    ) -> oneshot::Receiver<Result<u32, Status>> {
        let (completion, rx) = oneshot::channel();
        let _ = self.commands.send(Command::CreateStream {
            headers,
            stream,
            completion,
        });
        rx
    }

    /// Enqueues a `SendFrame` command for an already-admitted stream.
    pub fn send_frame(
        &self,
        stream_id: u32,
        payload: Bytes,
        end_of_stream: bool,
    ) -> oneshot::Receiver<Result<(), Status>> {
        let (completion, rx) = oneshot::channel();
        let _ = self.commands.send(Command::SendFrame {
            stream_id,
            payload,
            end_of_stream,
            completion,
        });
        rx
    }

    /// Enqueues a `CancelStream` command for a pending or admitted stream.
    pub fn cancel_stream(&self, stream: StreamHandle) -> oneshot::Receiver<Result<(), Status>> {
        let (completion, rx) = oneshot::channel();
        let _ = self.commands.send(Command::CancelStream { stream, completion });
        rx
    }

    /// Enqueues a `ReturnProcessedBytes` command for an already-admitted
    /// stream.
    pub fn return_processed_bytes(&self, stream_id: u32, n: usize) -> oneshot::Receiver<Result<(), Status>> {
        let (completion, rx) = oneshot::channel();
        let _ = self.commands.send(Command::ReturnProcessedBytes {
            stream_id,
            n,
            completion,
        });
        rx
    }
}

/// The multiplexer itself. Every field here is mutated only from within
/// [`Multiplexer::run`]'s single task, per the §5 "all fields mutated only
/// on the I/O context" invariant.
pub struct Multiplexer<F: Framer> {
    framer: F,
    commands: mpsc::UnboundedReceiver<Command>,
    events: mpsc::UnboundedReceiver<FramerEvent>,
    streams: HashMap<u32, StreamHandle>,
    pending: VecDeque<PendingStream>,
    id_pool: StreamIdPool,
    connection_error: Option<Status>,
    going_away: bool,
    last_known_stream_id: Option<u32>,
    accepting_new_streams: bool,
}

impl<F: Framer> Multiplexer<F> {
    /// Builds a new multiplexer and its paired handle. `events` is fed by
    /// the concrete HTTP/2 implementation sitting behind `framer`.
    pub fn new(
        framer: F,
        events: mpsc::UnboundedReceiver<FramerEvent>,
        config: MultiplexerConfig,
    ) -> (Self, MultiplexerHandle) {
        let (tx, commands) = mpsc::unbounded_channel();
        let multiplexer = Self {
            framer,
            commands,
            events,
            streams: HashMap::new(),
            pending: VecDeque::new(),
            id_pool: StreamIdPool::new(),
            connection_error: None,
            going_away: false,
            last_known_stream_id: None,
            accepting_new_streams: config.initial_accepting_new_streams,
        };
        (multiplexer, MultiplexerHandle { commands: tx })
    }

    /// Marks whether the connection currently accepts new streams (driven
    /// by the peer's `SETTINGS_MAX_CONCURRENT_STREAMS`); re-runs admission
    /// since gaining capacity may unblock the pending queue.
    pub async fn set_accepting_new_streams(&mut self, accepting: bool) {
        self.accepting_new_streams = accepting;
        if accepting {
            self.run_admission().await;
        }
    }

    /// Runs the multiplexer's event loop until both the command and event
    /// channels close.
    pub async fn run(mut self) {
        loop {
            tokio::select! {
                cmd = self.commands.recv() => {
                    match cmd {
                        Some(cmd) => self.handle_command(cmd).await,
                        None => if self.events.is_closed() { return },
                    }
                }
                ev = self.events.recv() => {
                    match ev {
                        Some(ev) => self.handle_event(ev).await,
                        None => if self.commands.is_closed() { return },
                    }
                }
            }
        }
    }

    fn goaway_status(&self) -> Status {
        self.connection_error
            .clone()
            .unwrap_or_else(|| Status::unavailable("connection is going away"))
    }

    async fn run_admission(&mut self) {
        let going_away = self.going_away;
        let accepting = self.accepting_new_streams;
        let goaway_status = self.goaway_status();
        let admitted = run_admission(
            &mut self.pending,
            &mut self.id_pool,
            going_away,
            || goaway_status.clone(),
            || accepting,
            &self.framer,
        )
        .await;

        for (id, handle) in admitted {
            self.streams.insert(id, handle);
        }
    }

    async fn handle_command(&mut self, command: Command) {
        match command {
            Command::CreateStream {
                headers,
                stream,
                completion,
            } => {
                self.pending.push_back(PendingStream {
                    headers,
                    stream,
                    completion,
                });
                self.run_admission().await;
            }
            Command::SendFrame {
                stream_id,
                payload,
                end_of_stream,
                completion,
            } => {
                if !self.streams.contains_key(&stream_id) {
                    let _ = completion.send(Err(Status::internal("unknown stream id")));
                    return;
                }
                let result = self.framer.write_data(stream_id, payload, end_of_stream).await;
                let _ = completion.send(result.map_err(|err| Status::unavailable(err.to_string())));
            }
            Command::CancelStream { stream, completion } => {
                self.handle_cancel(stream, completion).await;
            }
            Command::ReturnProcessedBytes {
                stream_id,
                n,
                completion,
            } => {
                let result = self.return_processed_bytes(stream_id, n).await;
                let _ = completion.send(result.map_err(|err| Status::internal(err.to_string())));
            }
        }
    }

    async fn handle_cancel(
        &mut self,
        stream: StreamHandle,
        completion: oneshot::Sender<Result<(), Status>>,
    ) {
        let (performed, id) = {
            #[allow(clippy::unwrap_used)]
            let mut guard = stream.lock().unwrap();
            let id = guard.id();
            (guard.cancel_local(), id)
        };

        if !performed {
            // Already CLOSED: cancelling is a no-op that still succeeds.
            let _ = completion.send(Ok(()));
            return;
        }

        match id {
            None => {
                if let Some(pos) = self
                    .pending
                    .iter()
                    .position(|entry| Arc::ptr_eq(&entry.stream, &stream))
                {
                    #[allow(clippy::expect_used)]
                    let entry = self.pending.remove(pos).expect("position just found");
                    let _ = entry
                        .completion
                        .send(Err(Status::cancelled("cancelled before admission")));
                }
            }
            Some(id) => {
                self.streams.remove(&id);
                if let Err(err) = self.framer.write_rst_stream(id, H2_CANCEL).await {
                    tracing::debug!(stream_id = id, %err, "failed to write RST_STREAM(CANCEL)");
                }
                self.run_admission().await;
            }
        }

        let _ = completion.send(Ok(()));
    }

    async fn handle_event(&mut self, event: FramerEvent) {
        match event {
            FramerEvent::Headers {
                stream_id,
                headers,
                end_stream,
            } => self.on_headers(stream_id, &headers, end_stream).await,
            FramerEvent::Data {
                stream_id,
                end_stream,
                ..
            } => self.on_data(stream_id, end_stream),
            FramerEvent::RstStream {
                stream_id,
                error_code,
            } => self.on_rst_stream(stream_id, error_code).await,
            FramerEvent::ConnectionError(cause) => self.on_connection_error(cause).await,
            FramerEvent::StreamError { stream_id, cause } => {
                self.on_stream_error(stream_id, cause).await;
            }
            FramerEvent::GoAway { last_stream_id } => self.on_goaway(last_stream_id),
            FramerEvent::Inactive => self.on_inactive(),
        }
    }

    async fn on_headers(&mut self, stream_id: u32, headers: &http::HeaderMap, end_stream: bool) {
        let Some(handle) = self.streams.get(&stream_id).cloned() else {
            tracing::debug!(stream_id, "HEADERS for unknown stream id, ignoring");
            return;
        };
        #[allow(clippy::unwrap_used)]
        let mut stream = handle.lock().unwrap();
        if stream.state().is_closed() {
            return;
        }
        if stream.state() == StreamState::HeadersSent {
            let _ = stream.recv_headers();
        }
        if end_stream {
            let _ = stream.recv_trailers();
            let status =
                Status::from_header_map(headers).unwrap_or_else(|| Status::unknown("missing grpc-status in trailers"));
            stream.report_final(status);
            drop(stream);
            self.streams.remove(&stream_id);
            self.run_admission().await;
        }
    }

    fn on_data(&mut self, stream_id: u32, end_stream: bool) {
        let Some(handle) = self.streams.get(&stream_id).cloned() else {
            return;
        };
        #[allow(clippy::unwrap_used)]
        let mut stream = handle.lock().unwrap();
        if stream.state().is_closed() {
            return;
        }
        let _ = stream.recv_data(end_stream);
    }

    async fn on_rst_stream(&mut self, stream_id: u32, error_code: u32) {
        let Some(handle) = self.streams.remove(&stream_id) else {
            return;
        };
        #[allow(clippy::unwrap_used)]
        let mut stream = handle.lock().unwrap();
        if stream.state().is_closed() {
            return;
        }
        let _ = stream.recv_rst_stream();
        // RST_STREAM always maps to UNKNOWN with empty trailers, regardless
        // of `error_code`. See `Status::from_rst_stream`'s doc comment for
        // why this crate doesn't attempt a richer mapping.
        stream.report_final(Status::from_rst_stream(error_code, None));
        drop(stream);
        self.run_admission().await;
    }

    async fn on_connection_error(&mut self, cause: rama_error::BoxError) {
        tracing::warn!(%cause, "connection error");
        self.connection_error = Some(Status::from_error(cause));
        self.fail_everything();
        self.run_admission().await;
    }

    async fn on_stream_error(&mut self, stream_id: u32, cause: rama_error::BoxError) {
        let Some(handle) = self.streams.remove(&stream_id) else {
            return;
        };
        let status = Status::from_error(cause);
        {
            #[allow(clippy::unwrap_used)]
            let mut stream = handle.lock().unwrap();
            let _ = stream.force_close();
            stream.report_final(status);
        }
        if let Err(err) = self.framer.write_rst_stream(stream_id, H2_INTERNAL_ERROR).await {
            tracing::debug!(stream_id, %err, "failed to write RST_STREAM after stream error");
        }
        self.run_admission().await;
    }

    fn on_goaway(&mut self, last_stream_id: u32) {
        self.going_away = true;
        self.last_known_stream_id = Some(last_stream_id);
        let status = self.goaway_status();
        self.fail_pending(status.clone());
        let stale: Vec<u32> = self
            .streams
            .keys()
            .copied()
            .filter(|&id| id > last_stream_id)
            .collect();
        for id in stale {
            if let Some(handle) = self.streams.remove(&id) {
                #[allow(clippy::unwrap_used)]
                let mut stream = handle.lock().unwrap();
                let _ = stream.force_close();
                stream.report_final(status.clone());
            }
        }
    }

    fn on_inactive(&mut self) {
        self.going_away = true;
        let status = self.goaway_status();
        self.fail_pending(status.clone());
        for (_, handle) in self.streams.drain() {
            #[allow(clippy::unwrap_used)]
            let mut stream = handle.lock().unwrap();
            let _ = stream.force_close();
            stream.report_final(status.clone());
        }
    }

    fn fail_pending(&mut self, status: Status) {
        for entry in self.pending.drain(..) {
            let _ = entry.completion.send(Err(status.clone()));
        }
    }

    fn fail_everything(&mut self) {
        let status = self.goaway_status();
        self.fail_pending(status.clone());
        for (_, handle) in self.streams.drain() {
            #[allow(clippy::unwrap_used)]
            let mut stream = handle.lock().unwrap();
            let _ = stream.force_close();
            stream.report_final(status.clone());
        }
    }

    /// Forwards `n` processed bytes to the framer's flow-control
    /// bookkeeping for `stream_id`.
    async fn return_processed_bytes(&mut self, stream_id: u32, n: usize) -> Result<(), MultiplexerError> {
        if !self.streams.contains_key(&stream_id) {
            return Err(MultiplexerError::new(MultiplexerKind::StreamNotFound));
        }
        self.framer
            .return_processed_bytes(stream_id, n)
            .await
            .map_err(|err| MultiplexerError::new(MultiplexerKind::FramerSetup).with(err))
    }
}
