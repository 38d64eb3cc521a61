//! Event kinds and observable stream lifecycle.

use std::fmt;

/// The two event kinds a native output stream raises.
///
/// A closed enum rather than string-keyed signal names: handler signatures
/// are typed per kind and resolved at registration time.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum SinkEvent {
    /// A chunk of encoded output is ready to be written to the sink.
    Write,
    /// The engine has produced its last byte and wants the sink finalized.
    Finish,
}

impl fmt::Display for SinkEvent {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Self::Write => "write",
            Self::Finish => "finish",
        })
    }
}

/// Observable lifecycle of one output stream.
///
/// Write events move a stream from `Constructed` to `Writing`; the finish
/// event moves it to `Finished`. Release can happen from any state — the
/// engine does not guarantee a finish event on aborted operations.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StreamState {
    /// Constructed; no event has been delivered yet.
    Constructed,
    /// At least one write event has been delivered.
    Writing,
    /// The finish event has been delivered.
    Finished,
}
