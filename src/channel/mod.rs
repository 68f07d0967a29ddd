//! Transport seam between the pipeline and the message broker
//!
//! Publishers talk to a [`MessageSender`], consumers to a [`MessageReceiver`].
//! The RabbitMQ implementations live in [`crate::rabbitmq`]; [`MemoryBroker`]
//! provides in-process queues with the same semantics for tests and local runs.

pub mod memory;

pub use memory::{MemoryBroker, MemoryReceiver, MemorySender};

use async_trait::async_trait;
use thiserror::Error;

/// Error types for channel operations
#[derive(Debug, Error)]
pub enum ChannelError {
    #[error("Broker error: {0}")]
    Broker(String),

    #[error("Connection timed out after {0:?}")]
    ConnectTimeout(std::time::Duration),

    #[error("Publisher not connected")]
    NotConnected,

    #[error("Queue declaration failed for '{queue}': {reason}")]
    QueueDeclare { queue: String, reason: String },

    #[error("Publish failed: {0}")]
    PublishFailed(String),

    #[error("Queue '{0}' already has a subscriber")]
    AlreadySubscribed(String),

    #[error("Unknown delivery tag: {0}")]
    UnknownDelivery(u64),

    #[error("Channel closed")]
    Closed,
}

/// A payload handed to a consumer by the broker
#[derive(Debug, Clone)]
pub struct InboundMessage {
    /// Broker-assigned tag, used to ack or reject this delivery
    pub delivery_tag: u64,
    pub payload: Vec<u8>,
    /// True when the broker delivered this message before and it was requeued
    pub redelivered: bool,
}

/// Producer side of a named queue
#[async_trait]
pub trait MessageSender: Send + Sync {
    /// Create the queue if it does not exist yet. Safe to call repeatedly.
    async fn declare_queue(&self, queue: &str) -> Result<(), ChannelError>;

    /// Send one payload to `queue` through the default exchange
    async fn send(&self, queue: &str, payload: &[u8]) -> Result<(), ChannelError>;
}

/// Consumer side of a single queue subscription
#[async_trait]
pub trait MessageReceiver: Send {
    /// Wait for the next delivery. `None` means the subscription ended.
    async fn recv(&mut self) -> Option<Result<InboundMessage, ChannelError>>;

    /// Confirm a delivery. Only meaningful when the subscription is not auto-ack.
    async fn ack(&mut self, delivery_tag: u64) -> Result<(), ChannelError>;

    /// Negatively confirm a delivery, optionally asking the broker to redeliver it
    async fn reject(&mut self, delivery_tag: u64, requeue: bool) -> Result<(), ChannelError>;

    /// Stop the broker from handing out new deliveries
    ///
    /// Deliveries that already reached this subscriber are still returned by
    /// `recv`, after which it returns `None`. Messages still in the queue stay
    /// there for the next subscriber.
    async fn cancel(&mut self) -> Result<(), ChannelError>;
}

#[async_trait]
impl<T: MessageSender + ?Sized> MessageSender for std::sync::Arc<T> {
    async fn declare_queue(&self, queue: &str) -> Result<(), ChannelError> {
        (**self).declare_queue(queue).await
    }

    async fn send(&self, queue: &str, payload: &[u8]) -> Result<(), ChannelError> {
        (**self).send(queue, payload).await
    }
}
