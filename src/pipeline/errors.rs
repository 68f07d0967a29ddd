//! Error types for the publisher and consumer tasks
//!
//! Per-message problems (bad payloads, failed sink writes) never show up here:
//! consumers log and count them and keep going. These errors end the task
//! that returns them and nothing else.

use std::time::Duration;
use thiserror::Error;

use crate::channel::ChannelError;
use crate::protocol::EncodeError;

/// Errors that stop a publisher task
#[derive(Debug, Error)]
pub enum PublisherError {
    #[error("Encode error: {0}")]
    Encode(#[from] EncodeError),

    #[error("Channel error: {0}")]
    Channel(#[from] ChannelError),

    #[error("Publish to '{queue}' timed out after {timeout:?}")]
    Timeout { queue: String, timeout: Duration },
}

/// Errors that stop a consumer task
#[derive(Debug, Error)]
pub enum ConsumerError {
    #[error("Channel error: {0}")]
    Channel(#[from] ChannelError),
}

/// Outcome of any supervised pipeline task
#[derive(Debug, Error)]
pub enum PipelineError {
    #[error("Publisher failed: {0}")]
    Publisher(#[from] PublisherError),

    #[error("Consumer failed: {0}")]
    Consumer(#[from] ConsumerError),
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_display() {
        let err = PublisherError::Timeout {
            queue: "TSLA".to_string(),
            timeout: Duration::from_secs(5),
        };
        assert_eq!(err.to_string(), "Publish to 'TSLA' timed out after 5s");

        let err = PipelineError::from(ConsumerError::from(ChannelError::Closed));
        assert_eq!(err.to_string(), "Consumer failed: Channel error: Channel closed");
    }
}
