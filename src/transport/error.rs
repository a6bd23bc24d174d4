use std::error::Error as StdError;
use std::fmt;

type Source = Box<dyn StdError + Send + Sync + 'static>;

/// Error returned by a [`super::stream::StreamState`] transition attempted
/// against the wrong state (e.g. any transition on an already-`Closed`
/// stream, or an inbound frame that doesn't fit the stream's current
/// state).
pub struct LifecycleError {
    inner: LifecycleErrorImpl,
}

struct LifecycleErrorImpl {
    kind: LifecycleKind,
    source: Option<Source>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum LifecycleKind {
    /// A transition was attempted on a stream already in `Closed`.
    AlreadyClosed,
    /// An inbound event doesn't fit the stream's current state (e.g. DATA
    /// before HEADERS).
    UnexpectedEvent,
}

impl LifecycleError {
    pub(crate) fn new(kind: LifecycleKind) -> Self {
        Self {
            inner: LifecycleErrorImpl { kind, source: None },
        }
    }

    pub(crate) fn kind(&self) -> LifecycleKind {
        self.inner.kind
    }

    fn description(&self) -> &'static str {
        match self.inner.kind {
            LifecycleKind::AlreadyClosed => "stream is already closed",
            LifecycleKind::UnexpectedEvent => "event does not fit the stream's current state",
        }
    }
}

impl fmt::Debug for LifecycleError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let mut f = f.debug_tuple("LifecycleError");
        f.field(&self.inner.kind);
        if let Some(source) = &self.inner.source {
            f.field(source);
        }
        f.finish()
    }
}

impl fmt::Display for LifecycleError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.description())
    }
}

impl StdError for LifecycleError {
    fn source(&self) -> Option<&(dyn StdError + 'static)> {
        self.inner.source.as_ref().map(|s| &**s as _)
    }
}

/// Connection-scoped error raised by the [`super::multiplexer::Multiplexer`].
///
/// Stream-id exhaustion and going-away admission failures are handled
/// inline by the admission algorithm (they resolve to a goaway-status on
/// the affected streams, not to this type); this only covers faults in the
/// multiplexer itself.
pub struct MultiplexerError {
    inner: MultiplexerErrorImpl,
}

struct MultiplexerErrorImpl {
    kind: MultiplexerKind,
    source: Option<Source>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum MultiplexerKind {
    /// The framer collaborator failed outside of any single command/event
    /// (e.g. a fatal write failure that cannot be attributed to one
    /// stream).
    FramerSetup,
    /// A frame event or flow-control return referenced a stream id with no
    /// live entry in the stream table.
    StreamNotFound,
}

impl MultiplexerError {
    pub(crate) fn new(kind: MultiplexerKind) -> Self {
        Self {
            inner: MultiplexerErrorImpl { kind, source: None },
        }
    }

    pub(crate) fn with(mut self, source: impl Into<Source>) -> Self {
        self.inner.source = Some(source.into());
        self
    }

    pub(crate) fn kind(&self) -> MultiplexerKind {
        self.inner.kind
    }

    fn description(&self) -> &'static str {
        match self.inner.kind {
            MultiplexerKind::FramerSetup => "framer collaborator failed",
            MultiplexerKind::StreamNotFound => "no stream registered for this id",
        }
    }
}

impl fmt::Debug for MultiplexerError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let mut f = f.debug_tuple("MultiplexerError");
        f.field(&self.inner.kind);
        if let Some(source) = &self.inner.source {
            f.field(source);
        }
        f.finish()
    }
}

impl fmt::Display for MultiplexerError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.description())
    }
}

impl StdError for MultiplexerError {
    fn source(&self) -> Option<&(dyn StdError + 'static)> {
        self.inner.source.as_ref().map(|s| &**s as _)
    }
}
