//! Load balancing: turning resolved addresses into subchannels and a
//! [`picker::Picker`] that routes RPCs across them.

pub mod pick_queue;
pub mod picker;
pub mod subchannel;

use std::net::SocketAddr;

pub use pick_queue::PickQueue;
pub use picker::{PickArgs, PickResult, Picker};
pub use subchannel::{AttributeKey, Attributes, ConnectivityState, Subchannel};

use crate::sync_context::SyncContextHandle;
use crate::Status;

/// A channel created purely for out-of-band communication with a single
/// address group — e.g. a balancer's own health-checking RPCs — kept
/// outside the picker's normal routing.
///
/// Grounded on `grpc-java`'s `Helper.createOobChannel`: the balancer gets
/// something it can issue RPCs over without those RPCs ever being handed
/// to the picker.
#[derive(Debug, Clone)]
pub struct OobChannel {
    pub group: AddressGroup,
    pub authority: String,
}

/// Structured, per-channel logging sink passed to a balancer via
/// [`Helper::get_channel_logger`].
///
/// Grounded on `grpc-java`'s `ChannelLogger`, narrowed to what this crate
/// needs: a thin wrapper around a [`tracing::Span`] so every balancer's log
/// lines are automatically scoped to their owning channel.
#[derive(Debug, Clone)]
pub struct ChannelLogger {
    span: tracing::Span,
}

impl ChannelLogger {
    #[must_use]
    pub fn new(span: tracing::Span) -> Self {
        Self { span }
    }

    /// Logs `message` at the channel's tracing level, inside this logger's
    /// span.
    pub fn log(&self, message: &str) {
        let _entered = self.span.enter();
        tracing::debug!("{message}");
    }
}

/// One equivalence class of addresses: any of them may be dialed
/// interchangeably to reach the same logical backend.
#[derive(Debug, Clone)]
pub struct AddressGroup {
    pub addresses: Vec<SocketAddr>,
    pub attributes: Attributes,
}

impl AddressGroup {
    #[must_use]
    pub fn new(addresses: Vec<SocketAddr>) -> Self {
        Self {
            addresses,
            attributes: Attributes::new(),
        }
    }
}

/// A name resolution result: the address groups to balance across, plus
/// resolver-attached attributes and raw service-config-derived policy
/// configuration (opaque to this crate; a concrete balancer downcasts it).
#[derive(Debug, Clone)]
pub struct ResolvedAddresses {
    pub servers: Vec<AddressGroup>,
    pub attributes: Attributes,
}

impl ResolvedAddresses {
    #[must_use]
    pub fn new(servers: Vec<AddressGroup>) -> Self {
        Self {
            servers,
            attributes: Attributes::new(),
        }
    }

    /// Whether every address group is empty.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.servers.iter().all(|g| g.addresses.is_empty())
    }
}

/// The collaborator a [`Balancer`] uses to affect the outside world:
/// creating subchannels, publishing a new picker, and asking the name
/// resolver to try again.
///
/// Grounded on `grpc-java`'s `LoadBalancer.Helper`: a balancer never talks
/// to the channel directly, only through this seam, so it can be driven
/// and verified in isolation.
pub trait Helper: Send + Sync {
    /// Creates a new, initially `Idle` subchannel for `group`.
    fn create_subchannel(&self, group: AddressGroup) -> Subchannel;

    /// Replaces the address group backing an existing subchannel, without
    /// tearing it down (e.g. a DNS re-resolution that finds the same
    /// backend at new addresses).
    fn update_subchannel_addresses(&self, subchannel: &Subchannel, group: AddressGroup);

    /// Creates a channel to `group` outside the picker's normal routing,
    /// for the balancer's own use (e.g. health checking).
    fn create_oob_channel(&self, group: AddressGroup, authority: &str) -> OobChannel;

    /// Publishes `picker` as the channel's new routing decision, paired
    /// with the balancer's own aggregate `state` (used for metrics/logging
    /// and to decide whether buffered RPCs should be retried now).
    fn update_balancing_state(&self, state: ConnectivityState, picker: Box<dyn Picker>);

    /// Asks the name resolver to refresh and deliver a new
    /// [`ResolvedAddresses`] (or error) via the same callbacks.
    fn refresh_name_resolution(&self);

    /// The single synchronization context every balancer callback and
    /// `Helper` mutation runs on (§4.6/§5).
    fn get_synchronization_context(&self) -> &SyncContextHandle;

    /// The executor a balancer should use for delayed work (e.g. a
    /// reconnect backoff timer). Backed by the same synchronization
    /// context: delayed tasks still run serialized with everything else.
    fn get_scheduled_executor(&self) -> &SyncContextHandle;

    /// The channel's authority (the `:authority` pseudo-header value used
    /// for RPCs it issues).
    fn get_authority(&self) -> &str;

    /// The structured logger scoped to this channel.
    fn get_channel_logger(&self) -> &ChannelLogger;
}

/// A pluggable address-to-picker policy.
///
/// Exactly one method fires per meaningful event; a balancer is free to do
/// nothing in response to a given event (the default `handle_subchannel_state_change`
/// no-op base is not provided here since every event needs a decision, but
/// implementations commonly share logic across methods).
pub trait Balancer: Send {
    /// A new name resolution result arrived.
    fn handle_resolved_addresses(&mut self, addresses: ResolvedAddresses, helper: &dyn Helper);

    /// Name resolution failed. `status` is always non-OK.
    fn handle_resolution_error(&mut self, status: Status, helper: &dyn Helper);

    /// One of this balancer's subchannels changed connectivity state.
    fn handle_subchannel_state_change(&mut self, subchannel: &Subchannel, state: ConnectivityState, helper: &dyn Helper);

    /// The channel is shutting down; release every subchannel this
    /// balancer created.
    fn shutdown(&mut self);

    /// Whether this balancer can usefully handle an empty resolved-address
    /// list (e.g. by treating it as "no backends, fail fast" rather than
    /// an error). Defaults to `false`, matching `grpc-java`'s
    /// `LoadBalancer.canHandleEmptyAddressListFromNameResolution()`.
    fn can_handle_empty_address_list(&self) -> bool {
        false
    }
}
