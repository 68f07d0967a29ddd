use async_trait::async_trait;
use futures::StreamExt;
use lapin::{options::*, types::FieldTable, Channel, Connection, ConnectionProperties, Consumer};
use uuid::Uuid;

use super::config::{AckMode, RabbitMQConfig};
use super::publisher::queue_declare_options;
use crate::channel::{ChannelError, InboundMessage, MessageReceiver};

/// RabbitMQ subscription to a single queue
///
/// Owns its connection and channel exclusively. The `no_ack` consume flag
/// follows the configured [`AckMode`]: with `BeforeProcess` the broker treats
/// every delivery as acknowledged as soon as it is sent to us.
pub struct RabbitMQSubscriber {
    queue: String,
    connection: Connection,
    channel: Channel,
    consumer: Consumer,
    consumer_tag: String,
    ack_mode: AckMode,
    cancelled: bool,
}

impl RabbitMQSubscriber {
    /// Connect, declare `queue` and start consuming from it
    pub async fn connect(config: &RabbitMQConfig, queue: &str) -> Result<Self, ChannelError> {
        tracing::info!("Connecting subscriber for queue '{}' to RabbitMQ", queue);

        let timeout = config.connection_timeout();
        let connection = tokio::time::timeout(
            timeout,
            Connection::connect(&config.uri, ConnectionProperties::default()),
        )
        .await
        .map_err(|_| ChannelError::ConnectTimeout(timeout))??;

        let channel = connection.create_channel().await?;

        channel
            .queue_declare(queue, queue_declare_options(), FieldTable::default())
            .await
            .map_err(|e| ChannelError::QueueDeclare {
                queue: queue.to_string(),
                reason: e.to_string(),
            })?;

        // Bound the unacked window; auto-ack subscriptions ignore it
        if !config.ack_mode.auto_ack() {
            channel
                .basic_qos(config.prefetch_count, BasicQosOptions::default())
                .await?;
        }

        let consumer_tag = format!("stock-consumer-{}", Uuid::new_v4());
        let consumer = channel
            .basic_consume(
                queue,
                &consumer_tag,
                BasicConsumeOptions {
                    no_ack: config.ack_mode.auto_ack(),
                    exclusive: false,
                    no_local: false,
                    nowait: false,
                },
                FieldTable::default(),
            )
            .await?;

        tracing::info!(
            "Subscribed to queue '{}' (consumer tag {}, ack mode {:?})",
            queue,
            consumer_tag,
            config.ack_mode
        );

        Ok(Self {
            queue: queue.to_string(),
            connection,
            channel,
            consumer,
            consumer_tag,
            ack_mode: config.ack_mode,
            cancelled: false,
        })
    }

    pub fn queue(&self) -> &str {
        &self.queue
    }

    /// Close channel and connection. Unacked deliveries return to the queue.
    pub async fn close(self) {
        let _ = self.channel.close(200, "Normal shutdown").await;
        let _ = self.connection.close(200, "Normal shutdown").await;
        tracing::info!("Subscriber for queue '{}' closed", self.queue);
    }
}

#[async_trait]
impl MessageReceiver for RabbitMQSubscriber {
    async fn recv(&mut self) -> Option<Result<InboundMessage, ChannelError>> {
        let delivery = self.consumer.next().await?;

        Some(
            delivery
                .map(|delivery| InboundMessage {
                    delivery_tag: delivery.delivery_tag,
                    payload: delivery.data,
                    redelivered: delivery.redelivered,
                })
                .map_err(ChannelError::from),
        )
    }

    async fn ack(&mut self, delivery_tag: u64) -> Result<(), ChannelError> {
        if self.ack_mode.auto_ack() {
            return Ok(());
        }

        self.channel
            .basic_ack(delivery_tag, BasicAckOptions::default())
            .await?;
        Ok(())
    }

    async fn reject(&mut self, delivery_tag: u64, requeue: bool) -> Result<(), ChannelError> {
        if self.ack_mode.auto_ack() {
            return Ok(());
        }

        self.channel
            .basic_nack(
                delivery_tag,
                BasicNackOptions {
                    multiple: false,
                    requeue,
                },
            )
            .await?;
        Ok(())
    }

    async fn cancel(&mut self) -> Result<(), ChannelError> {
        if self.cancelled {
            return Ok(());
        }

        // The consumer stream yields what is already buffered, then ends
        self.channel
            .basic_cancel(&self.consumer_tag, BasicCancelOptions::default())
            .await?;
        self.cancelled = true;

        tracing::info!("Cancelled consumer {} on queue '{}'", self.consumer_tag, self.queue);
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::channel::MessageSender;
    use crate::rabbitmq::RabbitMQPublisher;

    #[tokio::test]
    async fn test_live_round_trip() {
        // Requires a running broker - skipped unless RABBITMQ_TEST_URL is set
        let Ok(uri) = std::env::var("RABBITMQ_TEST_URL") else {
            return;
        };

        let config = RabbitMQConfig {
            uri,
            ack_mode: AckMode::AfterProcess,
            ..Default::default()
        };
        let queue = format!("stock-stream-test-{}", Uuid::new_v4());

        let mut subscriber = RabbitMQSubscriber::connect(&config, &queue).await.unwrap();

        let publisher = RabbitMQPublisher::new(config);
        publisher.connect().await.unwrap();
        publisher.declare_queue(&queue).await.unwrap();
        publisher.send(&queue, b"hello").await.unwrap();

        let delivery = tokio::time::timeout(std::time::Duration::from_secs(5), subscriber.recv())
            .await
            .unwrap()
            .unwrap()
            .unwrap();
        assert_eq!(delivery.payload, b"hello".to_vec());
        subscriber.ack(delivery.delivery_tag).await.unwrap();

        subscriber.cancel().await.unwrap();
        publisher.send(&queue, b"late").await.unwrap();
        let after_cancel = tokio::time::timeout(std::time::Duration::from_secs(1), subscriber.recv()).await;
        assert!(!matches!(after_cancel, Ok(Some(Ok(_)))));

        publisher.disconnect().await.unwrap();
        subscriber.close().await;
    }
}
