//! Sink implementations
//!
//! LogSink traces traffic, FileSink persists it as JSON lines and
//! MemorySink keeps it for embedding and tests.

mod file;
mod log;
mod memory;

pub use self::file::{FileSink, FileSinkConfig, SplitBy};
pub use self::log::LogSink;
pub use self::memory::{MemorySink, RecordLog};
