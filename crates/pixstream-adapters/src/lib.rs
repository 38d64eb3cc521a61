//! Pixstream Adapters - Concrete sinks for custom output streams
//!
//! Ready-made callback pairs for common destinations: any [`std::io::Write`]
//! implementation, or an in-memory buffer for inspection.

mod io;
mod memory;

pub use io::attach_writer;
pub use memory::MemorySink;
