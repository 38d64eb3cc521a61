//! Port definitions for the native engine boundary.
//!
//! These traits define the seam between the host-side adapter and the
//! native image engine that drives event dispatch.

mod native;

pub use native::{EventHandler, FinishTrampoline, NativeEngine, StreamRef, WriteTrampoline};
