//! Native engine port for output-stream construction and event dispatch.

use crate::domain::SinkEvent;

/// Opaque reference to a native output-stream object.
///
/// Minted by a [`NativeEngine`]; it carries no meaning outside the engine
/// that created it.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct StreamRef(u64);

impl StreamRef {
    /// Wraps a raw engine-assigned identifier.
    #[must_use]
    pub const fn new(raw: u64) -> Self {
        Self(raw)
    }

    /// Returns the raw identifier.
    #[must_use]
    pub const fn raw(self) -> u64 {
        self.0
    }
}

/// Trampoline the engine invokes for each write event.
///
/// Receives the native buffer and its length in bytes. The buffer is valid
/// only for the duration of the call. Returns the number of bytes consumed
/// (`0..=len`), or `-1` on the engine's error channel.
pub type WriteTrampoline = Box<dyn FnMut(*const u8, usize) -> i64 + Send>;

/// Trampoline the engine invokes once at end of stream.
pub type FinishTrampoline = Box<dyn FnMut() + Send>;

/// A typed event handler, resolved at registration time.
pub enum EventHandler {
    /// Handler for write events.
    Write(WriteTrampoline),
    /// Handler for the finish event.
    Finish(FinishTrampoline),
}

impl EventHandler {
    /// Returns the event kind this handler services.
    #[must_use]
    pub fn kind(&self) -> SinkEvent {
        match self {
            Self::Write(_) => SinkEvent::Write,
            Self::Finish(_) => SinkEvent::Finish,
        }
    }
}

/// Port for the native image engine's output-stream surface.
///
/// Contract assumed by the adapter: for a single stream the engine raises
/// "write" zero or more times and "finish" at most once, after the last
/// write; events for one stream never overlap, though they may arrive on
/// any thread.
pub trait NativeEngine: Send + Sync {
    /// Constructs a native output stream.
    ///
    /// Returns `None` when the engine fails to allocate one.
    fn create_output_stream(&self) -> Option<StreamRef>;

    /// Registers an event handler on a live stream.
    fn connect(&self, stream: StreamRef, handler: EventHandler);

    /// Destroys a native stream. Called exactly once per live reference.
    fn release(&self, stream: StreamRef);
}
