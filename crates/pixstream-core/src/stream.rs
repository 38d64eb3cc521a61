//! The user-defined output-stream adapter.
//!
//! An [`OutputStream`] wraps one native stream handle and bridges the
//! engine's write/finish events to host-supplied callbacks. Each write
//! event carries a `(pointer, length)` buffer that is only valid for the
//! duration of the handler call, so the trampoline copies the chunk into a
//! host-owned byte sequence before the user callback runs.

use std::any::Any;
use std::panic::{catch_unwind, AssertUnwindSafe};
use std::sync::atomic::{AtomicU8, Ordering};
use std::sync::{Arc, Mutex, PoisonError};

use tracing::{debug, trace, warn};

use crate::domain::{SinkEvent, StreamState};
use crate::error::SinkError;
use crate::ports::{EventHandler, NativeEngine, StreamRef};

/// User write callback: given a chunk of encoded output, write it to the
/// custom sink and return the number of bytes actually consumed.
pub type WriteCallback = dyn FnMut(&[u8]) -> anyhow::Result<usize> + Send;

/// User finish callback: flush and finalize the custom sink.
pub type FinishCallback = dyn FnMut() + Send;

const STATE_CONSTRUCTED: u8 = 0;
const STATE_WRITING: u8 = 1;
const STATE_FINISHED: u8 = 2;

/// Owns one native stream reference; releases it exactly once on drop.
struct StreamHandle {
    engine: Arc<dyn NativeEngine>,
    raw: StreamRef,
}

impl StreamHandle {
    fn construct(engine: Arc<dyn NativeEngine>) -> Result<Self, SinkError> {
        let raw = engine.create_output_stream().ok_or(SinkError::Allocation)?;
        debug!(stream = raw.raw(), "native output stream constructed");
        Ok(Self { engine, raw })
    }
}

impl Drop for StreamHandle {
    fn drop(&mut self) {
        debug!(stream = self.raw.raw(), "releasing native output stream");
        self.engine.release(self.raw);
    }
}

/// Retains the registered user callables for the handle's lifetime.
///
/// Each slot is shared with the trampoline closure handed to the engine,
/// so a callable stays alive as long as either side can still reach it.
#[derive(Default)]
struct CallbackRegistry {
    write: Option<Arc<Mutex<Box<WriteCallback>>>>,
    finish: Option<Arc<Mutex<Box<FinishCallback>>>>,
}

impl CallbackRegistry {
    fn occupied(&self, event: SinkEvent) -> bool {
        match event {
            SinkEvent::Write => self.write.is_some(),
            SinkEvent::Finish => self.finish.is_some(),
        }
    }
}

/// State shared between the adapter and its trampolines.
struct Dispatch {
    state: AtomicU8,
    last_error: Mutex<Option<SinkError>>,
}

impl Dispatch {
    fn new() -> Self {
        Self {
            state: AtomicU8::new(STATE_CONSTRUCTED),
            last_error: Mutex::new(None),
        }
    }

    fn state(&self) -> StreamState {
        match self.state.load(Ordering::Acquire) {
            STATE_WRITING => StreamState::Writing,
            STATE_FINISHED => StreamState::Finished,
            _ => StreamState::Constructed,
        }
    }

    /// Whether the engine has started delivering events.
    fn active(&self) -> bool {
        self.state.load(Ordering::Acquire) != STATE_CONSTRUCTED
    }

    fn enter_writing(&self) {
        // First write moves Constructed -> Writing; later writes are no-ops.
        let _ = self.state.compare_exchange(
            STATE_CONSTRUCTED,
            STATE_WRITING,
            Ordering::AcqRel,
            Ordering::Acquire,
        );
    }

    fn enter_finished(&self) {
        self.state.store(STATE_FINISHED, Ordering::Release);
    }

    fn record(&self, error: SinkError) {
        *self
            .last_error
            .lock()
            .unwrap_or_else(PoisonError::into_inner) = Some(error);
    }

    fn take(&self) -> Option<SinkError> {
        self.last_error
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .take()
    }
}

/// A user output stream.
///
/// Construct one, register a write and a finish callback, then hand it to
/// the native engine as an output destination. The engine invokes the
/// callbacks synchronously, in event order, while it performs the write
/// operation; the adapter imposes no reordering, batching, or concurrency
/// of its own.
///
/// # Example
///
/// ```
/// use std::sync::Arc;
/// use pixstream_core::OutputStream;
/// use pixstream_test_support::MockEngine;
///
/// let engine = Arc::new(MockEngine::new());
/// let mut stream = OutputStream::new(engine.clone())?;
/// stream.on_write(|chunk| {
///     // write up to chunk.len() bytes, return the number actually written
///     Ok(chunk.len())
/// })?;
/// stream.on_finish(|| {})?;
/// # engine.fire_write(stream.handle(), b"ok");
/// # Ok::<(), pixstream_core::SinkError>(())
/// ```
pub struct OutputStream {
    handle: StreamHandle,
    registry: CallbackRegistry,
    dispatch: Arc<Dispatch>,
}

impl OutputStream {
    /// Constructs an adapter backed by a freshly allocated native stream.
    ///
    /// # Errors
    ///
    /// Returns [`SinkError::Allocation`] when the engine fails to allocate
    /// a stream. No partial adapter state remains in that case.
    pub fn new(engine: Arc<dyn NativeEngine>) -> Result<Self, SinkError> {
        let handle = StreamHandle::construct(engine)?;
        Ok(Self {
            handle,
            registry: CallbackRegistry::default(),
            dispatch: Arc::new(Dispatch::new()),
        })
    }

    /// Registers the write callback.
    ///
    /// Per write event the trampoline copies the native buffer into a
    /// host-owned chunk, invokes `callback` with it, and reports the
    /// returned count back to the engine unchanged — a short write
    /// (`n < len`) passes through, never corrected. A callback error,
    /// panic, or overclaimed count (`n > len`) is recorded on the adapter
    /// and reported to the engine as `-1`.
    ///
    /// # Errors
    ///
    /// Returns [`SinkError::ProtocolMisuse`] if a write handler is already
    /// registered or the stream has begun active use.
    pub fn on_write<F>(&mut self, callback: F) -> Result<(), SinkError>
    where
        F: FnMut(&[u8]) -> anyhow::Result<usize> + Send + 'static,
    {
        self.guard_registration(SinkEvent::Write)?;

        let slot: Arc<Mutex<Box<WriteCallback>>> = Arc::new(Mutex::new(Box::new(callback)));
        let dispatch = Arc::clone(&self.dispatch);
        let callback = Arc::clone(&slot);
        self.handle.engine.connect(
            self.handle.raw,
            EventHandler::Write(Box::new(move |buf, len| {
                dispatch_write(&dispatch, &callback, buf, len)
            })),
        );

        self.registry.write = Some(slot);
        Ok(())
    }

    /// Registers the finish callback, invoked with no arguments when the
    /// engine signals end of stream.
    ///
    /// The engine raises finish at most once per stream, after the last
    /// write; the adapter registers a single handler and relies on that
    /// contract for cardinality. A panicking callback is recorded on the
    /// adapter instead of unwinding into the engine.
    ///
    /// # Errors
    ///
    /// Returns [`SinkError::ProtocolMisuse`] if a finish handler is already
    /// registered or the stream has begun active use.
    pub fn on_finish<F>(&mut self, callback: F) -> Result<(), SinkError>
    where
        F: FnMut() + Send + 'static,
    {
        self.guard_registration(SinkEvent::Finish)?;

        let slot: Arc<Mutex<Box<FinishCallback>>> = Arc::new(Mutex::new(Box::new(callback)));
        let dispatch = Arc::clone(&self.dispatch);
        let callback = Arc::clone(&slot);
        self.handle.engine.connect(
            self.handle.raw,
            EventHandler::Finish(Box::new(move || dispatch_finish(&dispatch, &callback))),
        );

        self.registry.finish = Some(slot);
        Ok(())
    }

    /// Returns the native stream reference backing this adapter.
    #[must_use]
    pub fn handle(&self) -> StreamRef {
        self.handle.raw
    }

    /// Returns the stream's observable lifecycle state.
    #[must_use]
    pub fn state(&self) -> StreamState {
        self.dispatch.state()
    }

    /// Takes the most recent callback failure captured at the trampoline
    /// boundary, if any.
    pub fn take_last_error(&self) -> Option<SinkError> {
        self.dispatch.take()
    }

    fn guard_registration(&self, event: SinkEvent) -> Result<(), SinkError> {
        if self.registry.occupied(event) {
            return Err(SinkError::ProtocolMisuse {
                event,
                reason: "a handler is already registered",
            });
        }
        if self.dispatch.active() {
            return Err(SinkError::ProtocolMisuse {
                event,
                reason: "stream is already in active use",
            });
        }
        Ok(())
    }
}

/// Write trampoline body: marshal the native buffer, run the user callback,
/// map its outcome onto the engine's return channel.
fn dispatch_write(
    dispatch: &Dispatch,
    callback: &Mutex<Box<WriteCallback>>,
    buf: *const u8,
    len: usize,
) -> i64 {
    dispatch.enter_writing();
    trace!(len, "write event");

    let chunk = if len == 0 {
        Vec::new()
    } else {
        // SAFETY: the engine guarantees `buf` points to `len` readable bytes
        // for the duration of this handler invocation.
        unsafe { std::slice::from_raw_parts(buf, len) }.to_vec()
    };

    let outcome = catch_unwind(AssertUnwindSafe(|| {
        let mut callback = callback.lock().unwrap_or_else(PoisonError::into_inner);
        callback(&chunk)
    }));

    match outcome {
        Ok(Ok(consumed)) => match i64::try_from(consumed) {
            Ok(reported) if consumed <= len => {
                trace!(consumed, "write callback consumed");
                reported
            }
            _ => {
                warn!(claimed = consumed, len, "write callback overclaimed consumed bytes");
                dispatch.record(SinkError::Callback {
                    event: SinkEvent::Write,
                    source: anyhow::anyhow!(
                        "callback claimed {consumed} consumed bytes for a {len}-byte chunk"
                    ),
                });
                -1
            }
        },
        Ok(Err(source)) => {
            warn!(error = %source, "write callback failed");
            dispatch.record(SinkError::Callback {
                event: SinkEvent::Write,
                source,
            });
            -1
        }
        Err(panic) => {
            warn!("write callback panicked");
            dispatch.record(SinkError::Callback {
                event: SinkEvent::Write,
                source: anyhow::anyhow!("callback panicked: {}", panic_message(&*panic)),
            });
            -1
        }
    }
}

/// Finish trampoline body: run the user callback, then mark the stream
/// finished whether or not the callback succeeded.
fn dispatch_finish(dispatch: &Dispatch, callback: &Mutex<Box<FinishCallback>>) {
    trace!("finish event");

    let outcome = catch_unwind(AssertUnwindSafe(|| {
        let mut callback = callback.lock().unwrap_or_else(PoisonError::into_inner);
        callback();
    }));

    dispatch.enter_finished();

    if let Err(panic) = outcome {
        warn!("finish callback panicked");
        dispatch.record(SinkError::Callback {
            event: SinkEvent::Finish,
            source: anyhow::anyhow!("callback panicked: {}", panic_message(&*panic)),
        });
    }
}

fn panic_message(panic: &(dyn Any + Send)) -> &str {
    if let Some(message) = panic.downcast_ref::<&str>() {
        message
    } else if let Some(message) = panic.downcast_ref::<String>() {
        message
    } else {
        "opaque panic payload"
    }
}
