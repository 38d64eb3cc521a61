//! Adapter bridging output streams to `std::io::Write` sinks.

use std::io::Write;
use std::sync::{Arc, Mutex, PoisonError};

use tracing::warn;

use pixstream_core::{OutputStream, SinkError};

/// Attaches an [`std::io::Write`] implementation as the stream's sink.
///
/// Write events are forwarded to [`Write::write`], so short writes pass
/// through to the engine unchanged; the finish event flushes the writer.
///
/// # Errors
///
/// Returns [`SinkError::ProtocolMisuse`] if the stream already has a write
/// or finish handler registered.
pub fn attach_writer<W>(stream: &mut OutputStream, writer: W) -> Result<(), SinkError>
where
    W: Write + Send + 'static,
{
    let writer = Arc::new(Mutex::new(writer));

    let sink = Arc::clone(&writer);
    stream.on_write(move |chunk: &[u8]| {
        let mut sink = sink.lock().unwrap_or_else(PoisonError::into_inner);
        let written = sink.write(chunk)?;
        Ok(written)
    })?;

    stream.on_finish(move || {
        let mut sink = writer.lock().unwrap_or_else(PoisonError::into_inner);
        if let Err(error) = sink.flush() {
            warn!(%error, "flush failed while finishing stream");
        }
    })?;

    Ok(())
}
