//! The load-balancing hot path: picking a [`Subchannel`] for each new RPC.

use std::fmt;
use std::sync::Arc;

use crate::balancer::subchannel::Subchannel;
use crate::Status;

/// The inputs a [`Picker`] has available when choosing a subchannel for one
/// RPC. Constructed fresh per call; cheap to build and to clone.
#[derive(Debug, Clone)]
pub struct PickArgs<'a> {
    /// `"<service>/<method>"`, as produced by [`crate::path::split_service_method`].
    pub method: &'a str,
    /// The call's outbound metadata, readable (and, in principle,
    /// mutable by a picker that wants to stamp routing metadata) before
    /// HEADERS are written.
    pub headers: &'a http::HeaderMap,
    /// The call's wait-for-ready option. A [`PickResult::Error`] is the
    /// caller's cue to fail the RPC immediately unless this is set, in
    /// which case the RPC buffers and retries the pick on the next picker
    /// update instead — the same distinction `grpc-java`'s `CallOptions
    /// .isWaitForReady()` drives from `PickSubchannelArgs`.
    pub wait_for_ready: bool,
}

/// The outcome of one [`Picker::pick`] call.
pub enum PickResult {
    /// Proceed on `subchannel`. `on_complete`, if present, is invoked once
    /// the RPC finishes (success or failure) so the picker can update
    /// per-call state such as load reporting.
    Proceed {
        subchannel: Arc<Subchannel>,
        on_complete: Option<Box<dyn FnOnce(&Status) + Send + Sync>>,
    },
    /// Fail the RPC immediately with a non-OK status, without consuming a
    /// retry attempt.
    Error(Status),
    /// Fail the RPC immediately with a non-OK status, counting as a drop
    /// (e.g. a circuit breaker or rate limiter), distinct from `Error` for
    /// retry-accounting purposes.
    Drop(Status),
    /// No subchannel is available yet; the caller should buffer the RPC
    /// and retry the pick once the balancer reports a new picker.
    NoResult,
}

impl fmt::Debug for PickResult {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Proceed { subchannel, .. } => f.debug_struct("Proceed").field("subchannel", subchannel).finish(),
            Self::Error(status) => f.debug_tuple("Error").field(status).finish(),
            Self::Drop(status) => f.debug_tuple("Drop").field(status).finish(),
            Self::NoResult => write!(f, "NoResult"),
        }
    }
}

/// A snapshot-immutable routing decision, installed by a balancer whenever
/// its aggregate connectivity state changes.
///
/// Must tolerate concurrent invocation from every in-flight RPC: a picker
/// is handed out as a shared `Arc` and never mutated in place, matching
/// the "rebuild and swap, don't mutate" discipline `grpc-java`'s
/// `LoadBalancer.Helper.updateBalancingState` imposes on its callers.
pub trait Picker: Send + Sync + 'static {
    /// Chooses a subchannel (or declines to) for one RPC.
    fn pick(&self, args: PickArgs<'_>) -> PickResult;
}

/// A picker with no ready subchannels; every pick buffers.
#[derive(Debug, Clone, Copy, Default)]
pub struct EmptyPicker;

impl Picker for EmptyPicker {
    fn pick(&self, _args: PickArgs<'_>) -> PickResult {
        PickResult::NoResult
    }
}

/// A picker that always fails the RPC with the same status, used once a
/// balancer has given up (e.g. empty resolved-address list with no
/// `can_handle_empty_address_list` support).
#[derive(Debug, Clone)]
pub struct FailingPicker {
    status: Status,
}

impl FailingPicker {
    #[must_use]
    pub fn new(status: Status) -> Self {
        Self { status }
    }
}

impl Picker for FailingPicker {
    fn pick(&self, _args: PickArgs<'_>) -> PickResult {
        PickResult::Error(self.status.clone())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn args<'a>(method: &'a str, headers: &'a http::HeaderMap) -> PickArgs<'a> {
        PickArgs {
            method,
            headers,
            wait_for_ready: false,
        }
    }

    #[test]
    fn empty_picker_always_buffers() {
        let headers = http::HeaderMap::new();
        assert!(matches!(EmptyPicker.pick(args("svc/Method", &headers)), PickResult::NoResult));
    }

    #[test]
    fn failing_picker_reports_its_status() {
        let headers = http::HeaderMap::new();
        let picker = FailingPicker::new(Status::unavailable("no addresses"));
        match picker.pick(args("svc/Method", &headers)) {
            PickResult::Error(status) => assert_eq!(status.code(), crate::Code::Unavailable),
            other => panic!("unexpected {other:?}"),
        }
    }

    #[test]
    fn wait_for_ready_is_visible_to_the_picker() {
        struct RecordingPicker {
            seen: std::sync::Mutex<Vec<bool>>,
        }

        impl Picker for RecordingPicker {
            fn pick(&self, args: PickArgs<'_>) -> PickResult {
                self.seen.lock().unwrap().push(args.wait_for_ready);
                PickResult::NoResult
            }
        }

        let picker = RecordingPicker {
            seen: std::sync::Mutex::new(Vec::new()),
        };
        let headers = http::HeaderMap::new();
        picker.pick(PickArgs {
            method: "svc/Method",
            headers: &headers,
            wait_for_ready: true,
        });
        picker.pick(args("svc/Method", &headers));

        assert_eq!(*picker.seen.lock().unwrap(), vec![true, false]);
    }
}
