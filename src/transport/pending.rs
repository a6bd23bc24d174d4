//! The pending-stream admission queue (§4.3): a FIFO of not-yet-admitted
//! create-stream requests, drained whenever the connection gains capacity.

use std::collections::VecDeque;
use std::sync::{Arc, Mutex};

use tokio::sync::oneshot;

use crate::transport::stream::ClientStream;
use crate::transport::Framer;
use crate::Status;

/// Shared handle to a [`ClientStream`], owned strongly by the
/// multiplexer's property table and referenced (by id, once admitted) by
/// anything that needs to look it up later.
pub type StreamHandle = Arc<Mutex<ClientStream>>;

/// A not-yet-admitted stream creation request: headers to send, the
/// stream object they belong to, and the signal used to report admission
/// (an assigned id) or failure.
pub struct PendingStream {
    pub headers: http::HeaderMap,
    pub stream: StreamHandle,
    pub completion: oneshot::Sender<Result<u32, Status>>,
}

/// Allocates strictly increasing odd positive HTTP/2 stream ids, the way a
/// client-initiated stream id sequence must.
#[derive(Debug, Clone, Copy)]
pub struct StreamIdPool {
    next: Option<u32>,
}

impl StreamIdPool {
    /// The highest id a client may use; HTTP/2 stream ids are 31-bit.
    const MAX_ID: u32 = i32::MAX as u32;

    #[must_use]
    pub fn new() -> Self {
        Self { next: Some(1) }
    }

    /// Hands out the next id, or `None` if the pool is exhausted.
    pub fn allocate(&mut self) -> Option<u32> {
        let id = self.next?;
        self.next = id.checked_add(2).filter(|&n| n <= Self::MAX_ID);
        Some(id)
    }
}

impl Default for StreamIdPool {
    fn default() -> Self {
        Self::new()
    }
}

/// Drains `pending` against current connection capacity, per the §4.3
/// four-step algorithm. Called whenever a new create command arrives or an
/// HTTP/2 stream becomes inactive; returns once the queue empties or
/// capacity runs out, never blocking.
///
/// Returns the `(id, handle)` pairs for every stream admitted during this
/// call, so the caller can register them in its id -> handle table; the
/// admission loop itself only owns the pending queue, not that table.
pub async fn run_admission<F: Framer>(
    pending: &mut VecDeque<PendingStream>,
    id_pool: &mut StreamIdPool,
    going_away: bool,
    goaway_status: impl Fn() -> Status,
    accepting_new_streams: impl Fn() -> bool,
    framer: &F,
) -> Vec<(u32, StreamHandle)> {
    let mut admitted = Vec::new();
    loop {
        if pending.is_empty() {
            return admitted;
        }

        // a. Stream-id pool exhaustion fails *all* pending, permanently:
        // once this fires, this connection never admits another stream.
        let Some(id) = id_pool.allocate() else {
            tracing::warn!("stream id pool exhausted, failing all pending streams");
            fail_all(pending, goaway_status());
            return admitted;
        };

        // b. Connection going away fails all pending and stops.
        if going_away {
            fail_all(pending, goaway_status());
            return admitted;
        }

        // c. Peer at MAX_CONCURRENT_STREAMS: stop, leave pending in place.
        // Note this follows the algorithm's literal step order: the id
        // allocated in (a) above is simply not consumed in this case. A
        // later admission pass allocates a fresh one; the skipped id is
        // harmless since only strict monotonicity, not density, matters.
        if !accepting_new_streams() {
            return admitted;
        }

        // d. Admit the head of the queue.
        #[allow(clippy::expect_used)]
        let entry = pending
            .pop_front()
            .expect("queue is non-empty, checked above");
        match framer
            .write_headers(id, entry.headers.clone(), false)
            .await
        {
            Ok(()) => {
                let result = {
                    #[allow(clippy::unwrap_used)]
                    let mut stream = entry.stream.lock().unwrap();
                    stream.admit(id)
                };
                match result {
                    Ok(()) => {
                        admitted.push((id, Arc::clone(&entry.stream)));
                        let _ = entry.completion.send(Ok(id));
                    }
                    Err(err) => {
                        tracing::debug!(stream_id = id, %err, "stream was cancelled before admission completed");
                        let _ = entry
                            .completion
                            .send(Err(Status::cancelled("stream cancelled before admission")));
                    }
                }
            }
            Err(err) => {
                tracing::debug!(stream_id = id, %err, "failed to write HEADERS for pending stream");
                let _ = entry.completion.send(Err(Status::unavailable(err.to_string())));
            }
        }
    }
}

fn fail_all(pending: &mut VecDeque<PendingStream>, status: Status) {
    for entry in pending.drain(..) {
        let _ = entry.completion.send(Err(status.clone()));
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn ids_are_strictly_increasing_and_odd() {
        let mut pool = StreamIdPool::new();
        let mut last = 0;
        for _ in 0..5 {
            let id = pool.allocate().unwrap();
            assert!(id % 2 == 1);
            assert!(id > last);
            last = id;
        }
    }

    #[test]
    fn pool_exhausts_at_the_31_bit_boundary() {
        let mut pool = StreamIdPool {
            next: Some(StreamIdPool::MAX_ID),
        };
        assert_eq!(pool.allocate(), Some(StreamIdPool::MAX_ID));
        assert_eq!(pool.allocate(), None);
    }
}
