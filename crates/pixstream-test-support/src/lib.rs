//! Test support utilities for pixstream.
//!
//! Provides a scripted mock of the native engine so adapter behavior can be
//! exercised without a real image engine.
//!
//! # Example
//!
//! ```
//! use std::sync::Arc;
//! use pixstream_core::OutputStream;
//! use pixstream_test_support::MockEngine;
//!
//! let engine = Arc::new(MockEngine::new());
//! let mut stream = OutputStream::new(engine.clone()).unwrap();
//! stream.on_write(|chunk| Ok(chunk.len())).unwrap();
//!
//! // Drive the engine side of the boundary by hand.
//! assert_eq!(engine.fire_write(stream.handle(), b"data"), 4);
//! ```

mod engine;

pub use engine::MockEngine;
