use std::sync::Arc;
use std::time::Duration;
use tokio_util::sync::CancellationToken;

use super::errors::ConsumerError;
use super::stats::{ConsumeCounters, ConsumeSnapshot};
use crate::channel::{ChannelError, InboundMessage, MessageReceiver};
use crate::database::Sink;
use crate::models::{EventType, NormalizedRecord};
use crate::protocol::EventCodec;
use crate::rabbitmq::AckMode;

/// Upper bound on the wait for one buffered delivery after the subscription is cancelled
pub const DEFAULT_DRAIN_IDLE: Duration = Duration::from_millis(250);

/// Pause before a delivery whose write failed goes back to the broker
pub const DEFAULT_REQUEUE_DELAY: Duration = Duration::from_secs(1);

/// What happened to a single delivery
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ProcessOutcome {
    Persisted,
    DecodeFailed,
    PersistFailed,
}

/// Per-queue consuming loop: decode, normalize, persist
///
/// Bad payloads and failed writes are logged, counted and skipped. Only a
/// broken subscription ends the loop with an error.
pub struct StockConsumer<R: MessageReceiver> {
    queue: String,
    receiver: R,
    sink: Arc<dyn Sink>,
    ack_mode: AckMode,
    drain_idle: Duration,
    requeue_delay: Duration,
    counters: ConsumeCounters,
}

impl<R: MessageReceiver> StockConsumer<R> {
    pub fn new(queue: impl Into<String>, receiver: R, sink: Arc<dyn Sink>) -> Self {
        Self {
            queue: queue.into(),
            receiver,
            sink,
            ack_mode: AckMode::default(),
            drain_idle: DEFAULT_DRAIN_IDLE,
            requeue_delay: DEFAULT_REQUEUE_DELAY,
            counters: ConsumeCounters::default(),
        }
    }

    /// Must match the mode the subscription was opened with
    pub fn with_ack_mode(mut self, ack_mode: AckMode) -> Self {
        self.ack_mode = ack_mode;
        self
    }

    pub fn with_drain_idle(mut self, drain_idle: Duration) -> Self {
        self.drain_idle = drain_idle;
        self
    }

    /// Only used in after-process mode, where failed writes are requeued
    pub fn with_requeue_delay(mut self, requeue_delay: Duration) -> Self {
        self.requeue_delay = requeue_delay;
        self
    }

    pub fn queue(&self) -> &str {
        &self.queue
    }

    pub fn counters(&self) -> ConsumeCounters {
        self.counters.clone()
    }

    pub fn stats(&self) -> ConsumeSnapshot {
        self.counters.snapshot()
    }

    pub fn into_receiver(self) -> R {
        self.receiver
    }

    /// Consume until `shutdown` fires, then drain what is already buffered
    ///
    /// On shutdown the subscription is cancelled first, so only deliveries that
    /// had already reached this consumer are processed, however busy the queue is.
    pub async fn run(&mut self, shutdown: CancellationToken) -> Result<(), ConsumerError> {
        tracing::info!("📥 Consumer for queue '{}' started ({:?})", self.queue, self.ack_mode);

        loop {
            let next = tokio::select! {
                biased;

                _ = shutdown.cancelled() => break,

                next = self.receiver.recv() => next,
            };

            match next {
                Some(Ok(message)) => {
                    self.process(message).await?;
                }
                Some(Err(e)) => {
                    tracing::error!("❌ Subscription to '{}' failed: {}", self.queue, e);
                    return Err(e.into());
                }
                None => {
                    tracing::error!("❌ Subscription to '{}' ended unexpectedly", self.queue);
                    return Err(ChannelError::Closed.into());
                }
            }
        }

        tracing::info!("Draining queue '{}'", self.queue);
        self.receiver.cancel().await?;

        loop {
            match tokio::time::timeout(self.drain_idle, self.receiver.recv()).await {
                Ok(Some(Ok(message))) => {
                    self.process(message).await?;
                }
                Ok(Some(Err(e))) => return Err(e.into()),
                Ok(None) | Err(_) => break,
            }
        }

        let stats = self.counters.snapshot();
        tracing::info!(
            "🔴 Consumer for queue '{}' stopped (received={}, persisted={}, decode_failures={}, persist_failures={})",
            self.queue,
            stats.received,
            stats.persisted,
            stats.decode_failures,
            stats.persist_failures
        );

        Ok(())
    }

    /// Handle one delivery
    ///
    /// Errors only come from acknowledging; the message itself never fails the loop.
    pub async fn process(&mut self, message: InboundMessage) -> Result<ProcessOutcome, ConsumerError> {
        self.counters.record_received();
        tracing::debug!(
            " [x] Received on '{}': {}",
            self.queue,
            String::from_utf8_lossy(&message.payload)
        );

        let event = match EventCodec::decode(&message.payload) {
            Ok(event) => event,
            Err(e) => {
                self.counters.record_decode_failure();
                tracing::warn!("⚠️  Dropping undecodable message on '{}': {}", self.queue, e);
                self.settle(message.delivery_tag, Settle::Discard).await?;
                return Ok(ProcessOutcome::DecodeFailed);
            }
        };

        match &event.event_type {
            EventType::Buy => tracing::info!("🟢 {} buy at {}", event.company, event.price),
            EventType::Sell => tracing::info!("🔴 {} sell at {}", event.company, event.price),
            EventType::Unknown(raw) => {
                self.counters.record_unknown_event_type();
                tracing::warn!("❓ {} unknown event type '{}' at {}", event.company, raw, event.price);
            }
        }

        let record = NormalizedRecord::from(&event);

        match self.sink.write(&record).await {
            Ok(()) => {
                self.counters.record_persisted();
                self.settle(message.delivery_tag, Settle::Ack).await?;
                Ok(ProcessOutcome::Persisted)
            }
            Err(e) => {
                self.counters.record_persist_failure();
                tracing::error!(
                    "❌ Failed to persist {} record (avgPrice={}): {}",
                    record.company,
                    record.avg_price,
                    e
                );
                if !self.ack_mode.auto_ack() {
                    tokio::time::sleep(self.requeue_delay).await;
                }
                self.settle(message.delivery_tag, Settle::Requeue).await?;
                Ok(ProcessOutcome::PersistFailed)
            }
        }
    }

    async fn settle(&mut self, delivery_tag: u64, settle: Settle) -> Result<(), ConsumerError> {
        // auto-ack subscriptions were settled by the broker on delivery
        if self.ack_mode.auto_ack() {
            return Ok(());
        }

        match settle {
            Settle::Ack => self.receiver.ack(delivery_tag).await?,
            Settle::Discard => self.receiver.reject(delivery_tag, false).await?,
            Settle::Requeue => self.receiver.reject(delivery_tag, true).await?,
        }
        Ok(())
    }
}

enum Settle {
    Ack,
    Discard,
    Requeue,
}
