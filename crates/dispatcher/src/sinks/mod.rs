//! Sink implementations
//!
//! Contains LogSink and JsonlSink.

mod jsonl;
mod log;

pub use self::jsonl::{JsonlSink, JsonlSinkConfig};
pub use self::log::LogSink;
