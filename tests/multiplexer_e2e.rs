//! End-to-end scenarios driving [`Multiplexer`] against a fake [`Framer`].

use std::collections::VecDeque;
use std::sync::{Arc, Mutex};

use bytes::Bytes;
use grpc_transport_core::balancer::{
    Attributes, ConnectivityState, PickArgs, PickQueue, PickResult, Picker, Subchannel,
};
use grpc_transport_core::transport::{
    ClientStream, Framer, FramerError, FramerEvent, Multiplexer, MultiplexerConfig,
};
use grpc_transport_core::Code;
use tokio::sync::mpsc;

/// Records every frame the multiplexer asked to write, and lets a test
/// script fail specific writes.
#[derive(Default)]
struct FakeFramer {
    written_headers: Mutex<Vec<u32>>,
    written_rst: Mutex<Vec<(u32, u32)>>,
    fail_headers_for: Mutex<VecDeque<u32>>,
    returned_bytes: Mutex<Vec<(u32, usize)>>,
}

impl Framer for FakeFramer {
    async fn write_headers(&self, stream_id: u32, _headers: http::HeaderMap, _end_stream: bool) -> Result<(), FramerError> {
        let mut fail_for = self.fail_headers_for.lock().unwrap();
        if fail_for.front() == Some(&stream_id) {
            fail_for.pop_front();
            return Err(FramerError::new(std::io::Error::other("simulated write failure")));
        }
        self.written_headers.lock().unwrap().push(stream_id);
        Ok(())
    }

    async fn write_data(&self, _stream_id: u32, _payload: Bytes, _end_stream: bool) -> Result<(), FramerError> {
        Ok(())
    }

    async fn write_rst_stream(&self, stream_id: u32, error_code: u32) -> Result<(), FramerError> {
        self.written_rst.lock().unwrap().push((stream_id, error_code));
        Ok(())
    }

    async fn return_processed_bytes(&self, stream_id: u32, n: usize) -> Result<(), FramerError> {
        self.returned_bytes.lock().unwrap().push((stream_id, n));
        Ok(())
    }
}

fn spawn_multiplexer(framer: FakeFramer) -> (grpc_transport_core::transport::MultiplexerHandle, mpsc::UnboundedSender<FramerEvent>, tokio::task::JoinHandle<()>) {
    let (events_tx, events_rx) = mpsc::unbounded_channel();
    let (mux, handle) = Multiplexer::new(framer, events_rx, MultiplexerConfig::default());
    let join = tokio::spawn(mux.run());
    (handle, events_tx, join)
}

#[tokio::test]
async fn happy_path_unary_call() {
    let (handle, events, _join) = spawn_multiplexer(FakeFramer::default());

    let stream = Arc::new(Mutex::new(ClientStream::new()));
    let rx = handle.create_stream(http::HeaderMap::new(), Arc::clone(&stream));
    let id = rx.await.unwrap().unwrap();
    assert_eq!(id, 1);

    events
        .send(FramerEvent::Headers {
            stream_id: id,
            headers: http::HeaderMap::new(),
            end_stream: false,
        })
        .unwrap();
    events
        .send(FramerEvent::Data {
            stream_id: id,
            payload: Bytes::from_static(b"reply"),
            end_stream: true,
        })
        .unwrap();

    let mut trailers = http::HeaderMap::new();
    trailers.insert("grpc-status", "0".parse().unwrap());
    events
        .send(FramerEvent::Headers {
            stream_id: id,
            headers: trailers,
            end_stream: true,
        })
        .unwrap();

    tokio::task::yield_now().await;
    tokio::task::yield_now().await;

    let guard = stream.lock().unwrap();
    assert_eq!(guard.final_status().unwrap().code(), Code::Ok);
}

#[tokio::test]
async fn return_processed_bytes_forwards_to_the_framer_and_rejects_unknown_streams() {
    let framer = FakeFramer::default();
    let (handle, _events, _join) = spawn_multiplexer(framer);

    let stream = Arc::new(Mutex::new(ClientStream::new()));
    let id = handle
        .create_stream(http::HeaderMap::new(), Arc::clone(&stream))
        .await
        .unwrap()
        .unwrap();

    handle.return_processed_bytes(id, 4096).await.unwrap().unwrap();

    let unknown = handle.return_processed_bytes(id + 2, 4096).await.unwrap();
    assert_eq!(unknown.unwrap_err().code(), Code::Internal);
}

#[tokio::test]
async fn cancel_before_admission_dequeues_without_a_reset() {
    let framer = FakeFramer::default();
    // Starve admission by starting the connection as not accepting new
    // streams, so the created stream stays queued in `Pending` long enough
    // to cancel before it's ever admitted.
    let (events_tx, events_rx) = mpsc::unbounded_channel();
    let (mux, handle) = Multiplexer::new(
        framer,
        events_rx,
        MultiplexerConfig {
            initial_accepting_new_streams: false,
        },
    );
    let _join = tokio::spawn(mux.run());

    let stream = Arc::new(Mutex::new(ClientStream::new()));
    let create_rx = handle.create_stream(http::HeaderMap::new(), Arc::clone(&stream));

    let cancel_rx = handle.cancel_stream(Arc::clone(&stream));
    cancel_rx.await.unwrap().unwrap();

    let result = create_rx.await.unwrap();
    assert_eq!(result.unwrap_err().code(), Code::Cancelled);
    drop(events_tx);
}

#[tokio::test]
async fn goaway_fails_pending_streams_past_the_last_known_id() {
    let (handle, events, _join) = spawn_multiplexer(FakeFramer::default());

    let stream = Arc::new(Mutex::new(ClientStream::new()));
    let rx = handle.create_stream(http::HeaderMap::new(), Arc::clone(&stream));
    let id = rx.await.unwrap().unwrap();

    events.send(FramerEvent::GoAway { last_stream_id: 0 }).unwrap();
    tokio::task::yield_now().await;

    let guard = stream.lock().unwrap();
    assert_eq!(guard.final_status().unwrap().code(), Code::Unavailable);
    assert!(id > 0);
}

#[tokio::test]
async fn peer_rst_stream_mid_rpc_reports_unknown() {
    let (handle, events, _join) = spawn_multiplexer(FakeFramer::default());

    let stream = Arc::new(Mutex::new(ClientStream::new()));
    let rx = handle.create_stream(http::HeaderMap::new(), Arc::clone(&stream));
    let id = rx.await.unwrap().unwrap();

    events
        .send(FramerEvent::Headers {
            stream_id: id,
            headers: http::HeaderMap::new(),
            end_stream: false,
        })
        .unwrap();
    events
        .send(FramerEvent::RstStream {
            stream_id: id,
            error_code: 8,
        })
        .unwrap();
    tokio::task::yield_now().await;
    tokio::task::yield_now().await;

    let guard = stream.lock().unwrap();
    assert_eq!(guard.final_status().unwrap().code(), Code::Unknown);
}

#[tokio::test]
async fn binary_header_round_trips_through_the_wire_codec() {
    use grpc_transport_core::metadata::{
        from_wire, to_wire, AsciiMetadataKey, AsciiMetadataValue, BinaryMetadataKey, BinaryMetadataValue, MetadataMap,
    };

    let mut map = MetadataMap::new();
    map.insert_bin(
        BinaryMetadataKey::from_static("trace-bin"),
        BinaryMetadataValue::from_bytes(Bytes::from_static(&[0x00, 0x01, 0xff])).unwrap(),
    );
    map.insert(
        AsciiMetadataKey::from_static("x-request-id"),
        AsciiMetadataValue::from_static("abc"),
    );

    let wire = to_wire(&map);
    let bin_entry = wire.iter().find(|e| e.name.as_str() == "trace-bin").unwrap();
    assert_eq!(bin_entry.value, Bytes::from_static(b"AAH/"));

    let decoded = from_wire(wire).unwrap();
    assert_eq!(decoded.get_bin("trace-bin").unwrap().as_bytes(), &[0x00, 0x01, 0xff]);
    assert_eq!(decoded.get("x-request-id").unwrap().to_str(), "abc");
}

#[tokio::test]
async fn a_second_stream_is_admitted_once_the_first_goes_inactive() {
    // Stream-id pool exhaustion itself is covered at the unit level by
    // `transport::pending::tests::pool_exhausts_at_the_31_bit_boundary`;
    // this test instead exercises the admission loop re-running, which is
    // how a picker's buffered RPC gets picked up once capacity frees: a
    // stream closing drives `run_admission` again, the same call a picker
    // update would trigger via a freshly-readied subchannel.
    let (handle, events, _join) = spawn_multiplexer(FakeFramer::default());

    let first = Arc::new(Mutex::new(ClientStream::new()));
    let first_id = handle
        .create_stream(http::HeaderMap::new(), Arc::clone(&first))
        .await
        .unwrap()
        .unwrap();

    let mut trailers = http::HeaderMap::new();
    trailers.insert("grpc-status", "0".parse().unwrap());
    events
        .send(FramerEvent::Headers {
            stream_id: first_id,
            headers: trailers,
            end_stream: true,
        })
        .unwrap();
    tokio::task::yield_now().await;

    let second = Arc::new(Mutex::new(ClientStream::new()));
    let second_id = handle
        .create_stream(http::HeaderMap::new(), Arc::clone(&second))
        .await
        .unwrap()
        .unwrap();
    assert!(second_id > first_id);
}

/// A picker with no ready subchannels yet; every pick buffers, the way a
/// connecting balancer's `BufferPicker` does.
#[derive(Default)]
struct BufferPicker;

impl Picker for BufferPicker {
    fn pick(&self, _args: PickArgs<'_>) -> PickResult {
        PickResult::NoResult
    }
}

/// Always routes to the one subchannel it was built with, the way a
/// single-backend `RoundRobinPicker` does.
struct RoundRobinPicker {
    subchannel: Arc<Subchannel>,
}

impl Picker for RoundRobinPicker {
    fn pick(&self, _args: PickArgs<'_>) -> PickResult {
        PickResult::Proceed {
            subchannel: Arc::clone(&self.subchannel),
            on_complete: None,
        }
    }
}

#[tokio::test]
async fn picker_update_re_picks_a_buffered_rpc() {
    let queue = Arc::new(PickQueue::new(Arc::new(BufferPicker)));
    queue.update(ConnectivityState::Connecting, Arc::new(BufferPicker));

    let headers = http::HeaderMap::new();
    let picking = Arc::clone(&queue);
    // RPC A is issued against the buffering picker; it must not resolve
    // until a new picker is installed below.
    let rpc_a = tokio::spawn(async move { picking.pick("svc/M", &headers, false).await });

    tokio::task::yield_now().await;
    tokio::task::yield_now().await;
    assert!(!rpc_a.is_finished());

    let sub1 = Arc::new(Subchannel::new(1, Attributes::new()));
    queue.update(
        ConnectivityState::Ready,
        Arc::new(RoundRobinPicker {
            subchannel: Arc::clone(&sub1),
        }),
    );

    match rpc_a.await.unwrap() {
        PickResult::Proceed { subchannel, .. } => assert_eq!(subchannel.id(), sub1.id()),
        other => panic!("unexpected {other:?}"),
    }
}
