//! Subchannels and the type-keyed attribute bag attached to them.

use std::any::Any;
use std::collections::HashMap;
use std::fmt;
use std::marker::PhantomData;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;

/// Connectivity state of a [`Subchannel`].
///
/// `SHUTDOWN` is terminal; every other state can transition to any other,
/// including back to itself, as the underlying transport comes and goes.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ConnectivityState {
    /// No transport attempt is in progress.
    Idle,
    /// A transport is being established.
    Connecting,
    /// A transport is established and usable.
    Ready,
    /// The most recent transport attempt failed.
    TransientFailure,
    /// Terminal: the subchannel has released its resources and will never
    /// transition again.
    Shutdown,
}

impl ConnectivityState {
    /// Whether this state is [`ConnectivityState::Shutdown`], the only
    /// terminal state.
    #[must_use]
    pub fn is_terminal(self) -> bool {
        matches!(self, Self::Shutdown)
    }
}

static NEXT_KEY_ID: AtomicUsize = AtomicUsize::new(0);

/// A type-safe, opaque identity for an entry in an [`Attributes`] bag.
///
/// Two keys are distinct even if they share the same `T`, matching the
/// "opaque key → value pairs scoped by type-safe key identity" contract:
/// identity is per-key-instance, not per-type, the same distinction
/// `grpc-java`'s `Attributes.Key` draws and `rama-core`'s type-keyed
/// `Extensions` sidesteps by assuming one value per type. Construct once
/// (typically as a `static`) and share by reference.
pub struct AttributeKey<T> {
    id: usize,
    name: &'static str,
    _marker: PhantomData<fn() -> T>,
}

impl<T> AttributeKey<T> {
    /// Creates a fresh, globally unique key named `name` (for debugging).
    #[must_use]
    pub fn new(name: &'static str) -> Self {
        Self {
            id: NEXT_KEY_ID.fetch_add(1, Ordering::Relaxed),
            name,
            _marker: PhantomData,
        }
    }

    /// The debug name this key was created with.
    #[must_use]
    pub fn name(&self) -> &'static str {
        self.name
    }
}

impl<T> fmt::Debug for AttributeKey<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("AttributeKey").field("name", &self.name).finish()
    }
}

/// A bag of opaque, type-identified values attached to a [`Subchannel`] or
/// a resolved address group.
#[derive(Default, Clone)]
pub struct Attributes {
    entries: HashMap<usize, Arc<dyn Any + Send + Sync>>,
}

impl Attributes {
    /// Creates an empty attribute bag.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Inserts `value` under `key`, returning the prior value if `key` was
    /// already present.
    pub fn insert<T: Send + Sync + 'static>(&mut self, key: &AttributeKey<T>, value: T) -> Option<Arc<T>> {
        self.entries
            .insert(key.id, Arc::new(value))
            .and_then(|prev| prev.downcast::<T>().ok())
    }

    /// Looks up the value stored under `key`, if any.
    #[must_use]
    pub fn get<T: Send + Sync + 'static>(&self, key: &AttributeKey<T>) -> Option<Arc<T>> {
        self.entries.get(&key.id).and_then(|v| v.clone().downcast::<T>().ok())
    }

    /// Whether the bag has no entries.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

impl fmt::Debug for Attributes {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Attributes").field("len", &self.entries.len()).finish()
    }
}

/// A logical connection bound to one or more equivalent address groups.
///
/// Owns at most one active transport; the multiplexer on the other side of
/// that transport is the [`crate::transport::Multiplexer`] this crate
/// implements. Ownership of `Subchannel`s belongs to the channel; a
/// balancer only ever holds handles and must release them via
/// [`Subchannel::shutdown`], either per-subchannel or from the balancer's
/// own shutdown.
pub struct Subchannel {
    id: u64,
    state: ConnectivityState,
    attributes: Attributes,
}

impl Subchannel {
    /// Creates a new subchannel in `Idle`, identified by `id` (assigned by
    /// the channel/helper that created it).
    #[must_use]
    pub fn new(id: u64, attributes: Attributes) -> Self {
        Self {
            id,
            state: ConnectivityState::Idle,
            attributes,
        }
    }

    /// The subchannel's identity, stable for its lifetime.
    #[must_use]
    pub fn id(&self) -> u64 {
        self.id
    }

    /// The subchannel's current connectivity state.
    #[must_use]
    pub fn state(&self) -> ConnectivityState {
        self.state
    }

    /// The subchannel's attribute bag.
    #[must_use]
    pub fn attributes(&self) -> &Attributes {
        &self.attributes
    }

    /// Transitions to `new_state`. No-op (but logged) once already
    /// `Shutdown`, since that state is terminal.
    pub fn set_state(&mut self, new_state: ConnectivityState) {
        if self.state.is_terminal() {
            tracing::debug!(subchannel = self.id, ?new_state, "ignoring state change on shut down subchannel");
            return;
        }
        self.state = new_state;
    }

    /// Releases the subchannel, moving it to the terminal `Shutdown` state.
    pub fn shutdown(&mut self) {
        self.state = ConnectivityState::Shutdown;
    }
}

impl fmt::Debug for Subchannel {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Subchannel")
            .field("id", &self.id)
            .field("state", &self.state)
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn distinct_keys_of_the_same_type_dont_collide() {
        let key_a: AttributeKey<i32> = AttributeKey::new("a");
        let key_b: AttributeKey<i32> = AttributeKey::new("b");

        let mut attrs = Attributes::new();
        attrs.insert(&key_a, 1);
        attrs.insert(&key_b, 2);

        assert_eq!(*attrs.get(&key_a).unwrap(), 1);
        assert_eq!(*attrs.get(&key_b).unwrap(), 2);
    }

    #[test]
    fn shutdown_is_terminal() {
        let mut sub = Subchannel::new(1, Attributes::new());
        sub.shutdown();
        sub.set_state(ConnectivityState::Ready);
        assert_eq!(sub.state(), ConnectivityState::Shutdown);
    }
}
