/// Persistence for normalized records
///
/// This module provides:
/// - The `Sink` contract consumers write through
/// - A MongoDB-backed sink with configurable write concern
/// - An in-memory sink for tests and dry runs

pub mod connection;
pub mod memory;
pub mod sink;

pub use connection::{establish_connection, MongoConfig, SinkError, WriteAck};
pub use memory::MemorySink;
pub use sink::{MongoSink, Sink};
