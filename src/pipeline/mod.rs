//! Event pipeline: per-symbol publishers and per-queue consumers
//!
//! ```text
//! EventGenerator -> StockPublisher -> queue -> StockConsumer -> Sink
//! ```
//!
//! Publishers and consumers share nothing but the queues between them. Each
//! runs as its own task and stops when its cancellation token fires.

pub mod consumer;
pub mod errors;
pub mod generator;
pub mod publisher;
pub mod stats;

pub use consumer::{ProcessOutcome, StockConsumer};
pub use errors::{ConsumerError, PipelineError, PublisherError};
pub use generator::{EventGenerator, MAX_PRICE, MIN_PRICE};
pub use publisher::StockPublisher;
pub use stats::{ConsumeCounters, ConsumeSnapshot, PublishCounters, PublishSnapshot};
