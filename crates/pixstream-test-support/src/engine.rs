//! Mock implementation of the native engine port.

use std::collections::HashMap;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Mutex, MutexGuard, PoisonError};

use pixstream_core::{
    EventHandler, FinishTrampoline, NativeEngine, SinkEvent, StreamRef, WriteTrampoline,
};

struct StreamSlot {
    write: Option<WriteTrampoline>,
    finish: Option<FinishTrampoline>,
    released: bool,
}

/// Mock implementation of [`NativeEngine`] for testing.
///
/// Tracks created and released streams, stores connected trampolines, and
/// lets tests raise write/finish events by hand through the same raw
/// `(pointer, length)` boundary the real engine uses.
pub struct MockEngine {
    fail_allocation: bool,
    next_id: AtomicU64,
    streams: Mutex<HashMap<StreamRef, StreamSlot>>,
}

impl MockEngine {
    /// Creates an engine whose allocations succeed.
    #[must_use]
    pub fn new() -> Self {
        Self {
            fail_allocation: false,
            next_id: AtomicU64::new(1),
            streams: Mutex::new(HashMap::new()),
        }
    }

    /// Creates an engine whose stream allocations always fail.
    #[must_use]
    pub fn failing() -> Self {
        Self {
            fail_allocation: true,
            ..Self::new()
        }
    }

    /// Returns the number of streams this engine has constructed.
    #[must_use]
    pub fn created_count(&self) -> usize {
        self.lock().len()
    }

    /// Returns whether the given stream has been released.
    #[must_use]
    pub fn released(&self, stream: StreamRef) -> bool {
        self.lock().get(&stream).is_some_and(|slot| slot.released)
    }

    /// Returns whether a handler is connected for the given event kind.
    #[must_use]
    pub fn connected(&self, stream: StreamRef, event: SinkEvent) -> bool {
        self.lock().get(&stream).is_some_and(|slot| match event {
            SinkEvent::Write => slot.write.is_some(),
            SinkEvent::Finish => slot.finish.is_some(),
        })
    }

    /// Raises a write event carrying `bytes`, returning the trampoline's
    /// reported consumed count.
    ///
    /// # Panics
    ///
    /// Panics if the stream is unknown, released, or has no write handler —
    /// those are test bugs, not engine behavior.
    pub fn fire_write(&self, stream: StreamRef, bytes: &[u8]) -> i64 {
        let mut trampoline = {
            let mut streams = self.lock();
            let slot = streams.get_mut(&stream).expect("unknown stream reference");
            assert!(!slot.released, "write event on a released stream");
            slot.write.take().expect("no write handler connected")
        };

        // Dispatch through the raw boundary; the buffer only stays valid
        // for the duration of the call, as the engine contract states.
        let consumed = trampoline(bytes.as_ptr(), bytes.len());

        if let Some(slot) = self.lock().get_mut(&stream) {
            slot.write = Some(trampoline);
        }
        consumed
    }

    /// Raises the finish event.
    ///
    /// # Panics
    ///
    /// Panics if the stream is unknown, released, or has no finish handler.
    pub fn fire_finish(&self, stream: StreamRef) {
        let mut trampoline = {
            let mut streams = self.lock();
            let slot = streams.get_mut(&stream).expect("unknown stream reference");
            assert!(!slot.released, "finish event on a released stream");
            slot.finish.take().expect("no finish handler connected")
        };

        trampoline();

        if let Some(slot) = self.lock().get_mut(&stream) {
            slot.finish = Some(trampoline);
        }
    }

    fn lock(&self) -> MutexGuard<'_, HashMap<StreamRef, StreamSlot>> {
        self.streams.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

impl Default for MockEngine {
    fn default() -> Self {
        Self::new()
    }
}

impl NativeEngine for MockEngine {
    fn create_output_stream(&self) -> Option<StreamRef> {
        if self.fail_allocation {
            return None;
        }
        let stream = StreamRef::new(self.next_id.fetch_add(1, Ordering::Relaxed));
        self.lock().insert(
            stream,
            StreamSlot {
                write: None,
                finish: None,
                released: false,
            },
        );
        Some(stream)
    }

    fn connect(&self, stream: StreamRef, handler: EventHandler) {
        let mut streams = self.lock();
        let Some(slot) = streams.get_mut(&stream) else {
            return;
        };
        match handler {
            EventHandler::Write(trampoline) => slot.write = Some(trampoline),
            EventHandler::Finish(trampoline) => slot.finish = Some(trampoline),
        }
    }

    fn release(&self, stream: StreamRef) {
        let mut streams = self.lock();
        if let Some(slot) = streams.get_mut(&stream) {
            assert!(!slot.released, "stream released twice");
            slot.released = true;
            // Handlers die with the native object.
            slot.write = None;
            slot.finish = None;
        }
    }
}
