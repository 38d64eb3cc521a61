//! Error taxonomy for the output-stream adapter.

use crate::domain::SinkEvent;

/// Errors surfaced by the output-stream adapter.
#[derive(Debug, thiserror::Error)]
pub enum SinkError {
    /// The native engine failed to allocate an output stream.
    #[error("native engine failed to allocate an output stream")]
    Allocation,

    /// A user callback failed during event dispatch.
    ///
    /// Captured at the trampoline boundary and reported to the engine as
    /// `-1`; retrievable via [`OutputStream::take_last_error`].
    ///
    /// [`OutputStream::take_last_error`]: crate::OutputStream::take_last_error
    #[error("{event} callback failed: {source}")]
    Callback {
        /// Event kind during which the failure occurred.
        event: SinkEvent,
        /// Underlying failure reported by the callback.
        #[source]
        source: anyhow::Error,
    },

    /// The registration protocol was violated.
    #[error("cannot register {event} handler: {reason}")]
    ProtocolMisuse {
        /// Event kind whose registration was rejected.
        event: SinkEvent,
        /// Why the registration was rejected.
        reason: &'static str,
    },
}
