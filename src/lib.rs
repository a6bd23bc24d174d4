//! # grpc-transport-core
//!
//! The client-side HTTP/2 stream multiplexer core of a gRPC implementation.
//!
//! This crate owns the pieces that sit between a generated client stub and
//! an HTTP/2 connection: the [`Status`]/[`Code`] vocabulary, the
//! [`metadata`] codec, the per-stream lifecycle state machine, the
//! pending-stream admission queue, and the [`balancer`] contract a
//! `LoadBalancer` implementation plugs into.
//!
//! ## Structure
//!
//! ### Transport
//!
//! [`transport`] implements the client multiplexer: a single
//! I/O-context-serialized router that turns `CreateStream`/`SendFrame`/
//! `CancelStream` commands into frames, and HTTP/2 frame events
//! (`HEADERS`/`DATA`/`RST_STREAM`/`GOAWAY`) into stream-state transitions.
//! It does not implement an HTTP/2 framer itself; it is driven through the
//! [`transport::Framer`] trait, so it can sit on top of any concrete
//! connection implementation.
//!
//! ### Load balancing
//!
//! [`balancer`] defines the `Picker`/`Subchannel`/`ConnectivityState`
//! contract a load balancer implementation is built from, and the
//! [`sync_context`] single-writer task queue that serializes balancer state
//! mutation.
//!
//! ## Rama
//!
//! Crate used by the end-user `rama` crate and `rama` crate authors alike.
//!
//! Learn more about `rama`:
//!
//! - Github: <https://github.com/plabayo/rama>
//! - Book: <https://ramaproxy.org/book/>

#![doc(
    html_favicon_url = "https://raw.githubusercontent.com/plabayo/rama/main/docs/img/old_logo.png"
)]
#![doc(html_logo_url = "https://raw.githubusercontent.com/plabayo/rama/main/docs/img/old_logo.png")]
#![cfg_attr(docsrs, feature(doc_cfg))]
#![cfg_attr(test, allow(clippy::float_cmp))]
#![cfg_attr(
    not(test),
    warn(clippy::print_stdout, clippy::dbg_macro),
    deny(clippy::unwrap_used, clippy::expect_used)
)]
#![recursion_limit = "256"]

pub mod balancer;
pub mod framing;
pub mod metadata;
pub mod path;
pub mod sync_context;
pub mod transport;

mod status;

pub use status::{Code, Status};

/// `Result` is a type that represents either success ([`Ok`]) or failure ([`Err`]).
/// By default, the `Err` value is of type [`Status`] but this can be overridden if desired.
pub type Result<T, E = Status> = std::result::Result<T, E>;
