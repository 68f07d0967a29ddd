// Library Crate Root
// lib.rs

// Both binaries (stock_publisher, stock_consumer) import through lib.rs like an external crate
pub mod channel;
pub mod config;
pub mod database;
pub mod lifecycle;
pub mod models;
pub mod pipeline;
pub mod protocol;
pub mod rabbitmq;
pub mod utils;

// pub use = re-export at crate root
pub use channel::{ChannelError, MessageReceiver, MessageSender};
pub use config::{ConfigError, PipelineConfig};
pub use database::{Sink, SinkError};
pub use lifecycle::{Lifecycle, RunSummary};
pub use models::{EventType, NormalizedRecord, StockEvent};
pub use pipeline::{PipelineError, StockConsumer, StockPublisher};
pub use protocol::{DecodeError, EventCodec};
