use bytes::Bytes;
use tokio::sync::oneshot;

use crate::transport::pending::StreamHandle;
use crate::Status;

/// The multiplexer's single write entry point: one of three commands.
///
/// Any other variant is a programming error — there is deliberately no
/// catch-all arm in the router that handles these (see
/// `Multiplexer::handle_command`), so adding a fourth variant here is a
/// compile-time-visible change to every match site.
pub enum Command {
    /// Enqueue a new stream for admission.
    CreateStream {
        headers: http::HeaderMap,
        stream: StreamHandle,
        completion: oneshot::Sender<Result<u32, Status>>,
    },
    /// Write a DATA frame for an already-admitted stream.
    SendFrame {
        stream_id: u32,
        payload: Bytes,
        end_of_stream: bool,
        completion: oneshot::Sender<Result<(), Status>>,
    },
    /// Cancel a stream, admitted or still pending.
    CancelStream {
        stream: StreamHandle,
        completion: oneshot::Sender<Result<(), Status>>,
    },
    /// Return `n` processed bytes of flow-control credit for an
    /// already-admitted stream.
    ReturnProcessedBytes {
        stream_id: u32,
        n: usize,
        completion: oneshot::Sender<Result<(), Status>>,
    },
}
