use std::time::Duration;
use tokio::time::{interval_at, Instant, MissedTickBehavior};
use tokio_util::sync::CancellationToken;

use super::errors::PublisherError;
use super::generator::EventGenerator;
use super::stats::{PublishCounters, PublishSnapshot};
use crate::channel::MessageSender;
use crate::models::StockEvent;
use crate::protocol::EventCodec;

pub const DEFAULT_TICK_INTERVAL: Duration = Duration::from_millis(1000);
pub const DEFAULT_PUBLISH_TIMEOUT: Duration = Duration::from_secs(5);

/// Per-symbol publishing loop
///
/// On every tick it generates one random event for its symbol, encodes it and
/// sends it to its queue. Events from one publisher are sent strictly in
/// generation order: the next tick is not handled before the previous send
/// completed.
///
/// A failed or timed out send ends the loop with an error. Other publishers
/// are unaffected since they share nothing with this one.
pub struct StockPublisher<S: MessageSender> {
    queue: String,
    sender: S,
    generator: EventGenerator,
    tick_interval: Duration,
    publish_timeout: Duration,
    counters: PublishCounters,
}

impl<S: MessageSender> StockPublisher<S> {
    pub fn new(symbol: impl Into<String>, queue: impl Into<String>, sender: S) -> Self {
        Self {
            queue: queue.into(),
            sender,
            generator: EventGenerator::new(symbol),
            tick_interval: DEFAULT_TICK_INTERVAL,
            publish_timeout: DEFAULT_PUBLISH_TIMEOUT,
            counters: PublishCounters::default(),
        }
    }

    pub fn with_tick_interval(mut self, tick_interval: Duration) -> Self {
        // tokio intervals reject a zero period
        self.tick_interval = tick_interval.max(Duration::from_millis(1));
        self
    }

    pub fn with_publish_timeout(mut self, publish_timeout: Duration) -> Self {
        self.publish_timeout = publish_timeout;
        self
    }

    pub fn symbol(&self) -> &str {
        self.generator.symbol()
    }

    pub fn queue(&self) -> &str {
        &self.queue
    }

    /// Shared counters, readable while the loop runs
    pub fn counters(&self) -> PublishCounters {
        self.counters.clone()
    }

    pub fn stats(&self) -> PublishSnapshot {
        self.counters.snapshot()
    }

    /// Declare the queue, then publish one event per tick until `shutdown` fires
    ///
    /// The first event goes out one full interval after start.
    pub async fn run(&mut self, shutdown: CancellationToken) -> Result<(), PublisherError> {
        self.sender.declare_queue(&self.queue).await?;

        tracing::info!(
            "📈 Publisher for {} started (queue '{}', every {:?})",
            self.symbol(),
            self.queue,
            self.tick_interval
        );

        let mut ticker = interval_at(Instant::now() + self.tick_interval, self.tick_interval);
        // A slow send drops the ticks it overlapped instead of bursting them afterwards
        ticker.set_missed_tick_behavior(MissedTickBehavior::Skip);

        loop {
            tokio::select! {
                biased;

                _ = shutdown.cancelled() => break,

                _ = ticker.tick() => {
                    let event = self.generator.next_event();
                    self.publish(&event).await?;
                }
            }
        }

        tracing::info!(
            "🔴 Publisher for {} stopped ({} sent)",
            self.symbol(),
            self.counters.snapshot().published
        );

        Ok(())
    }

    /// Encode and send a single event, bounded by the publish timeout
    pub async fn publish(&self, event: &StockEvent) -> Result<(), PublisherError> {
        let payload = EventCodec::encode(event)?;

        match tokio::time::timeout(self.publish_timeout, self.sender.send(&self.queue, &payload)).await {
            Ok(Ok(())) => {
                self.counters.record_published();
                tracing::debug!(" [x] Sent to '{}': {}", self.queue, String::from_utf8_lossy(&payload));
                Ok(())
            }
            Ok(Err(e)) => {
                self.counters.record_failed();
                tracing::error!("❌ Failed to publish {} event to '{}': {}", event.company, self.queue, e);
                Err(e.into())
            }
            Err(_) => {
                self.counters.record_failed();
                tracing::error!(
                    "❌ Publishing {} event to '{}' timed out after {:?}",
                    event.company,
                    self.queue,
                    self.publish_timeout
                );
                Err(PublisherError::Timeout {
                    queue: self.queue.clone(),
                    timeout: self.publish_timeout,
                })
            }
        }
    }
}
