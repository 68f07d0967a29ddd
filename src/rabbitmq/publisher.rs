use async_trait::async_trait;
use lapin::{
    options::*, types::FieldTable, BasicProperties, Channel, Connection, ConnectionProperties,
};
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::Arc;
use tokio::sync::RwLock;

use super::config::RabbitMQConfig;
use crate::channel::{ChannelError, MessageSender};
use crate::protocol::EventCodec;

pub type Result<T> = std::result::Result<T, ChannelError>;

/// Statistics for RabbitMQ publisher
#[derive(Debug, Clone)]
pub struct PublisherStats {
    pub messages_published: u64,
    pub messages_confirmed: u64,
    pub messages_failed: u64,
    pub is_connected: bool,
}

/// Queue options shared by publishers and subscribers so both sides declare
/// the same queue: non-durable, non-exclusive, never auto-deleted
pub(crate) fn queue_declare_options() -> QueueDeclareOptions {
    QueueDeclareOptions {
        durable: false,
        exclusive: false,
        auto_delete: false,
        nowait: false,
        passive: false,
    }
}

/// RabbitMQ publisher owning one connection and one channel
///
/// Messages go through the default exchange with the queue name as routing
/// key, so a declared queue receives exactly what is sent to its name.
pub struct RabbitMQPublisher {
    config: RabbitMQConfig,
    connection: Arc<RwLock<Option<Connection>>>,
    channel: Arc<RwLock<Option<Channel>>>,
    is_connected: Arc<AtomicBool>,

    // Metrics
    messages_published: Arc<AtomicU64>,
    messages_confirmed: Arc<AtomicU64>,
    messages_failed: Arc<AtomicU64>,
}

impl RabbitMQPublisher {
    /// Create a new RabbitMQ publisher
    pub fn new(config: RabbitMQConfig) -> Self {
        Self {
            config,
            connection: Arc::new(RwLock::new(None)),
            channel: Arc::new(RwLock::new(None)),
            is_connected: Arc::new(AtomicBool::new(false)),
            messages_published: Arc::new(AtomicU64::new(0)),
            messages_confirmed: Arc::new(AtomicU64::new(0)),
            messages_failed: Arc::new(AtomicU64::new(0)),
        }
    }

    /// Connect to RabbitMQ server
    pub async fn connect(&self) -> Result<()> {
        tracing::info!("Connecting publisher to RabbitMQ");

        let timeout = self.config.connection_timeout();
        let connection = tokio::time::timeout(
            timeout,
            Connection::connect(&self.config.uri, ConnectionProperties::default()),
        )
        .await
        .map_err(|_| ChannelError::ConnectTimeout(timeout))??;

        let channel = connection.create_channel().await?;

        if self.config.publisher_confirms {
            channel
                .confirm_select(ConfirmSelectOptions::default())
                .await?;
            tracing::info!("Publisher confirms enabled");
        }

        *self.connection.write().await = Some(connection);
        *self.channel.write().await = Some(channel);
        self.is_connected.store(true, Ordering::Release);

        tracing::info!("Publisher connected to RabbitMQ");
        Ok(())
    }

    /// Disconnect from RabbitMQ
    pub async fn disconnect(&self) -> Result<()> {
        tracing::info!("Disconnecting publisher from RabbitMQ");

        if let Some(channel) = self.channel.write().await.take() {
            let _ = channel.close(200, "Normal shutdown").await;
        }

        if let Some(connection) = self.connection.write().await.take() {
            let _ = connection.close(200, "Normal shutdown").await;
        }

        self.is_connected.store(false, Ordering::Release);
        Ok(())
    }

    /// Check if connected
    pub fn is_connected(&self) -> bool {
        self.is_connected.load(Ordering::Acquire)
    }

    /// Get publisher statistics
    pub fn stats(&self) -> PublisherStats {
        PublisherStats {
            messages_published: self.messages_published.load(Ordering::Relaxed),
            messages_confirmed: self.messages_confirmed.load(Ordering::Relaxed),
            messages_failed: self.messages_failed.load(Ordering::Relaxed),
            is_connected: self.is_connected(),
        }
    }

    async fn channel(&self) -> Result<Channel> {
        if !self.is_connected() {
            return Err(ChannelError::NotConnected);
        }

        self.channel
            .read()
            .await
            .as_ref()
            .cloned()
            .ok_or(ChannelError::NotConnected)
    }
}

#[async_trait]
impl MessageSender for RabbitMQPublisher {
    async fn declare_queue(&self, queue: &str) -> Result<()> {
        let channel = self.channel().await?;

        channel
            .queue_declare(queue, queue_declare_options(), FieldTable::default())
            .await
            .map_err(|e| ChannelError::QueueDeclare {
                queue: queue.to_string(),
                reason: e.to_string(),
            })?;

        tracing::debug!("Declared queue '{}'", queue);
        Ok(())
    }

    async fn send(&self, queue: &str, payload: &[u8]) -> Result<()> {
        let channel = self.channel().await?;

        let properties = BasicProperties::default().with_content_type(EventCodec::CONTENT_TYPE.into());

        let confirm = channel
            .basic_publish("", queue, BasicPublishOptions::default(), payload, properties)
            .await
            .map_err(|e| {
                self.messages_failed.fetch_add(1, Ordering::Relaxed);
                ChannelError::PublishFailed(e.to_string())
            })?;

        self.messages_published.fetch_add(1, Ordering::Relaxed);

        // Wait for publisher confirm if enabled
        if self.config.publisher_confirms {
            match confirm.await {
                Ok(confirmation) if confirmation.is_nack() => {
                    self.messages_failed.fetch_add(1, Ordering::Relaxed);
                    return Err(ChannelError::PublishFailed(format!(
                        "broker rejected message for queue '{}'",
                        queue
                    )));
                }
                Ok(_) => {
                    self.messages_confirmed.fetch_add(1, Ordering::Relaxed);
                    tracing::trace!("Message confirmed: queue={}", queue);
                }
                Err(e) => {
                    self.messages_failed.fetch_add(1, Ordering::Relaxed);
                    return Err(ChannelError::PublishFailed(e.to_string()));
                }
            }
        }

        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_publisher_creation() {
        let publisher = RabbitMQPublisher::new(RabbitMQConfig::default());

        assert!(!publisher.is_connected());

        let stats = publisher.stats();
        assert_eq!(stats.messages_published, 0);
        assert_eq!(stats.messages_confirmed, 0);
        assert_eq!(stats.messages_failed, 0);
    }

    #[tokio::test]
    async fn test_send_requires_connection() {
        let publisher = RabbitMQPublisher::new(RabbitMQConfig::default());

        assert!(matches!(
            publisher.send("TSLA", b"{}").await,
            Err(ChannelError::NotConnected)
        ));
        assert!(matches!(
            publisher.declare_queue("TSLA").await,
            Err(ChannelError::NotConnected)
        ));
    }

    #[test]
    fn test_queue_options() {
        let options = queue_declare_options();
        assert!(!options.durable);
        assert!(!options.exclusive);
        assert!(!options.auto_delete);
    }

    #[tokio::test]
    async fn test_live_publish() {
        // Requires a running broker - skipped unless RABBITMQ_TEST_URL is set
        let Ok(uri) = std::env::var("RABBITMQ_TEST_URL") else {
            return;
        };

        let publisher = RabbitMQPublisher::new(RabbitMQConfig {
            uri,
            publisher_confirms: true,
            ..Default::default()
        });
        publisher.connect().await.unwrap();
        publisher.declare_queue("stock-stream-test").await.unwrap();
        publisher.send("stock-stream-test", b"{}").await.unwrap();

        assert_eq!(publisher.stats().messages_confirmed, 1);
        publisher.disconnect().await.unwrap();
    }
}
