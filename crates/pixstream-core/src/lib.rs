//! Pixstream Core - Custom output sinks for a native image engine
//!
//! This crate contains the domain types, the port trait describing the
//! native engine's output-stream surface, and the [`OutputStream`] adapter
//! that bridges engine-raised write/finish events to host-supplied
//! callbacks.

pub mod domain;
pub mod error;
pub mod ports;
pub mod stream;

pub use domain::{SinkEvent, StreamState};
pub use error::SinkError;
pub use ports::{EventHandler, FinishTrampoline, NativeEngine, StreamRef, WriteTrampoline};
pub use stream::OutputStream;
