//! Core domain types for output-stream event dispatch.

mod event;

pub use event::{SinkEvent, StreamState};
