//! Buffers an RPC's subchannel pick across picker updates, realizing
//! `spec.md` §8 scenario 6: "picker update re-picks buffered."
//!
//! Grounded on `grpc-java`'s pairing of `SubchannelPicker` with
//! `DelayedClientTransport`: a buffered pick isn't polled, it's woken the
//! moment the channel installs a new picker via `updateBalancingState`.

use std::sync::{Arc, Mutex};

use tokio::sync::Notify;

use super::picker::{PickArgs, PickResult, Picker};
use super::subchannel::{Attributes, ConnectivityState};

/// Holds the channel's current `(state, picker)` pair and lets a pick that
/// buffers wake up and retry once a new pair is published.
pub struct PickQueue {
    current: Mutex<(ConnectivityState, Arc<dyn Picker>)>,
    updated: Notify,
}

impl PickQueue {
    /// Starts out with `initial` installed at [`ConnectivityState::Idle`].
    #[must_use]
    pub fn new(initial: Arc<dyn Picker>) -> Self {
        Self {
            current: Mutex::new((ConnectivityState::Idle, initial)),
            updated: Notify::new(),
        }
    }

    /// Installs a new `(state, picker)` pair and wakes every in-progress
    /// [`Self::pick`] so it retries against it.
    pub fn update(&self, state: ConnectivityState, picker: Arc<dyn Picker>) {
        #[allow(clippy::unwrap_used)]
        {
            *self.current.lock().unwrap() = (state, picker);
        }
        self.updated.notify_waiters();
    }

    /// Picks a subchannel for `method`/`headers`, re-picking against each
    /// newly installed picker while the current one buffers: a `NoResult`
    /// always buffers, and an `Error` buffers too when `wait_for_ready` is
    /// set (matching `PickArgs::wait_for_ready`'s documented contract).
    pub async fn pick(&self, method: &str, headers: &http::HeaderMap, wait_for_ready: bool) -> PickResult {
        loop {
            // Subscribed before picking: `Notify::notify_waiters` only
            // reaches futures that already exist, so creating this one
            // after the pick could miss an update that lands in between.
            let notified = self.updated.notified();

            let picker = {
                #[allow(clippy::unwrap_used)]
                let guard = self.current.lock().unwrap();
                Arc::clone(&guard.1)
            };
            let args = PickArgs {
                method,
                headers,
                wait_for_ready,
            };
            match picker.pick(args) {
                PickResult::NoResult => notified.await,
                PickResult::Error(_) if wait_for_ready => notified.await,
                other => return other,
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::balancer::picker::{EmptyPicker, FailingPicker};
    use crate::balancer::subchannel::Subchannel;
    use crate::Status;

    struct OneShotPicker {
        subchannel: Arc<Subchannel>,
    }

    impl Picker for OneShotPicker {
        fn pick(&self, _args: PickArgs<'_>) -> PickResult {
            PickResult::Proceed {
                subchannel: Arc::clone(&self.subchannel),
                on_complete: None,
            }
        }
    }

    #[tokio::test]
    async fn a_buffered_pick_re_picks_once_a_new_picker_is_installed() {
        let queue = Arc::new(PickQueue::new(Arc::new(EmptyPicker)));
        let headers = http::HeaderMap::new();

        let picking = Arc::clone(&queue);
        let pick_task = tokio::spawn(async move { picking.pick("svc/Method", &headers, false).await });

        // Give the spawned pick a chance to buffer on the initial picker
        // before a new one is installed.
        tokio::task::yield_now().await;
        tokio::task::yield_now().await;

        let ready = Arc::new(Subchannel::new(7, Attributes::new()));
        queue.update(
            ConnectivityState::Ready,
            Arc::new(OneShotPicker {
                subchannel: Arc::clone(&ready),
            }),
        );

        match pick_task.await.unwrap() {
            PickResult::Proceed { subchannel, .. } => assert_eq!(subchannel.id(), ready.id()),
            other => panic!("unexpected {other:?}"),
        }
    }

    #[tokio::test]
    async fn a_non_wait_for_ready_error_is_not_buffered() {
        let queue = PickQueue::new(Arc::new(FailingPicker::new(Status::unavailable("no addresses"))));
        let headers = http::HeaderMap::new();

        match queue.pick("svc/Method", &headers, false).await {
            PickResult::Error(status) => assert_eq!(status.code(), crate::Code::Unavailable),
            other => panic!("unexpected {other:?}"),
        }
    }
}
