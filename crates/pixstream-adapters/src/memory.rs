//! In-memory accumulating sink.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex, PoisonError};

use pixstream_core::{OutputStream, SinkError};

/// Sink that accumulates every chunk into a shared in-memory buffer.
///
/// Useful when the encoded output should end up in process memory rather
/// than a file or socket, and for asserting on stream behavior in tests.
pub struct MemorySink {
    buffer: Arc<Mutex<Vec<u8>>>,
    finished: Arc<AtomicBool>,
}

impl MemorySink {
    /// Registers accumulating callbacks on the stream and returns a handle
    /// for inspecting what arrived.
    ///
    /// # Errors
    ///
    /// Returns [`SinkError::ProtocolMisuse`] if the stream already has a
    /// write or finish handler registered.
    pub fn attach(stream: &mut OutputStream) -> Result<Self, SinkError> {
        let buffer = Arc::new(Mutex::new(Vec::new()));
        let finished = Arc::new(AtomicBool::new(false));

        let sink = Arc::clone(&buffer);
        stream.on_write(move |chunk: &[u8]| {
            sink.lock()
                .unwrap_or_else(PoisonError::into_inner)
                .extend_from_slice(chunk);
            Ok(chunk.len())
        })?;

        let flag = Arc::clone(&finished);
        stream.on_finish(move || flag.store(true, Ordering::Release))?;

        Ok(Self { buffer, finished })
    }

    /// Returns a copy of everything written so far.
    #[must_use]
    pub fn contents(&self) -> Vec<u8> {
        self.buffer
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
    }

    /// Returns whether the finish event has fired.
    #[must_use]
    pub fn finished(&self) -> bool {
        self.finished.load(Ordering::Acquire)
    }
}
