pub mod config;
pub mod publisher;
pub mod subscriber;

pub use config::{AckMode, QueueNaming, RabbitMQConfig};
pub use publisher::{PublisherStats, RabbitMQPublisher};
pub use subscriber::RabbitMQSubscriber;

use crate::channel::ChannelError;

impl From<lapin::Error> for ChannelError {
    fn from(e: lapin::Error) -> Self {
        ChannelError::Broker(e.to_string())
    }
}
