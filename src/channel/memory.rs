use async_trait::async_trait;
use parking_lot::Mutex;
use std::collections::{HashMap, VecDeque};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use tokio::sync::mpsc;

use super::{ChannelError, InboundMessage, MessageReceiver, MessageSender};

#[derive(Debug)]
struct QueuedMessage {
    payload: Vec<u8>,
    redelivered: bool,
}

struct QueueSlot {
    tx: mpsc::UnboundedSender<QueuedMessage>,
    /// Taken by the active subscriber, given back when it is dropped
    rx: Option<mpsc::UnboundedReceiver<QueuedMessage>>,
}

impl QueueSlot {
    fn new() -> Self {
        let (tx, rx) = mpsc::unbounded_channel();
        Self { tx, rx: Some(rx) }
    }
}

/// In-process broker with named FIFO queues
///
/// Mirrors the parts of RabbitMQ the pipeline relies on:
/// - idempotent queue declaration
/// - FIFO delivery per queue to a single subscriber
/// - ack / reject with requeue
/// - unacked deliveries go back to the queue when the subscriber goes away
/// - a cancelled subscription only hands out what it had already received
/// - sends to an undeclared queue are dropped (default exchange behavior)
#[derive(Clone, Default)]
pub struct MemoryBroker {
    queues: Arc<Mutex<HashMap<String, QueueSlot>>>,
    closed: Arc<AtomicBool>,
}

impl MemoryBroker {
    pub fn new() -> Self {
        Self::default()
    }

    /// Create a sender handle; every handle shares the same queues
    pub fn sender(&self) -> MemorySender {
        MemorySender {
            broker: self.clone(),
        }
    }

    /// Subscribe to `queue`, declaring it if needed
    ///
    /// With `auto_ack` every delivery counts as acknowledged the moment it is
    /// handed out.
    pub fn subscribe(&self, queue: &str, auto_ack: bool) -> Result<MemoryReceiver, ChannelError> {
        let mut queues = self.queues.lock();
        let slot = queues
            .entry(queue.to_string())
            .or_insert_with(QueueSlot::new);

        let rx = slot
            .rx
            .take()
            .ok_or_else(|| ChannelError::AlreadySubscribed(queue.to_string()))?;

        Ok(MemoryReceiver {
            broker: self.clone(),
            queue: queue.to_string(),
            rx: Some(rx),
            requeue_tx: slot.tx.clone(),
            auto_ack,
            next_tag: 1,
            unacked: HashMap::new(),
            cancelled: None,
        })
    }

    /// Names of all declared queues
    pub fn queue_names(&self) -> Vec<String> {
        let mut names: Vec<String> = self.queues.lock().keys().cloned().collect();
        names.sort();
        names
    }

    /// Simulate a broker outage: every later send fails with [`ChannelError::Closed`]
    pub fn close(&self) {
        self.closed.store(true, Ordering::Release);
    }

    fn declare(&self, queue: &str) {
        self.queues
            .lock()
            .entry(queue.to_string())
            .or_insert_with(QueueSlot::new);
    }

    fn enqueue(&self, queue: &str, message: QueuedMessage) -> Result<(), ChannelError> {
        if self.closed.load(Ordering::Acquire) {
            return Err(ChannelError::Closed);
        }

        match self.queues.lock().get(queue) {
            Some(slot) => slot.tx.send(message).map_err(|_| ChannelError::Closed),
            None => {
                tracing::debug!("Dropping message for undeclared queue '{}'", queue);
                Ok(())
            }
        }
    }
}

/// Producer handle for a [`MemoryBroker`]
#[derive(Clone)]
pub struct MemorySender {
    broker: MemoryBroker,
}

#[async_trait]
impl MessageSender for MemorySender {
    async fn declare_queue(&self, queue: &str) -> Result<(), ChannelError> {
        if self.broker.closed.load(Ordering::Acquire) {
            return Err(ChannelError::Closed);
        }
        self.broker.declare(queue);
        Ok(())
    }

    async fn send(&self, queue: &str, payload: &[u8]) -> Result<(), ChannelError> {
        self.broker.enqueue(
            queue,
            QueuedMessage {
                payload: payload.to_vec(),
                redelivered: false,
            },
        )
    }
}

/// Subscription to one [`MemoryBroker`] queue
pub struct MemoryReceiver {
    broker: MemoryBroker,
    queue: String,
    rx: Option<mpsc::UnboundedReceiver<QueuedMessage>>,
    requeue_tx: mpsc::UnboundedSender<QueuedMessage>,
    auto_ack: bool,
    next_tag: u64,
    unacked: HashMap<u64, Vec<u8>>,
    /// Set by `cancel`: what had reached the subscriber at that point
    cancelled: Option<VecDeque<QueuedMessage>>,
}

impl MemoryReceiver {
    pub fn queue(&self) -> &str {
        &self.queue
    }

    /// Deliveries handed out but not yet acked or rejected
    pub fn unacked_count(&self) -> usize {
        self.unacked.len()
    }
}

#[async_trait]
impl MessageReceiver for MemoryReceiver {
    async fn recv(&mut self) -> Option<Result<InboundMessage, ChannelError>> {
        let message = match self.cancelled.as_mut() {
            Some(buffered) => buffered.pop_front()?,
            None => self.rx.as_mut()?.recv().await?,
        };

        let delivery_tag = self.next_tag;
        self.next_tag += 1;

        if !self.auto_ack {
            self.unacked.insert(delivery_tag, message.payload.clone());
        }

        Some(Ok(InboundMessage {
            delivery_tag,
            payload: message.payload,
            redelivered: message.redelivered,
        }))
    }

    async fn ack(&mut self, delivery_tag: u64) -> Result<(), ChannelError> {
        self.unacked
            .remove(&delivery_tag)
            .map(|_| ())
            .ok_or(ChannelError::UnknownDelivery(delivery_tag))
    }

    async fn reject(&mut self, delivery_tag: u64, requeue: bool) -> Result<(), ChannelError> {
        let payload = self
            .unacked
            .remove(&delivery_tag)
            .ok_or(ChannelError::UnknownDelivery(delivery_tag))?;

        if requeue {
            self.requeue_tx
                .send(QueuedMessage {
                    payload,
                    redelivered: true,
                })
                .map_err(|_| ChannelError::Closed)?;
        }

        Ok(())
    }

    async fn cancel(&mut self) -> Result<(), ChannelError> {
        if self.cancelled.is_some() {
            return Ok(());
        }

        let mut buffered = VecDeque::new();
        if let Some(rx) = self.rx.as_mut() {
            while let Ok(message) = rx.try_recv() {
                buffered.push_back(message);
            }
        }

        tracing::debug!(
            "Subscription to '{}' cancelled with {} buffered message(s)",
            self.queue,
            buffered.len()
        );
        self.cancelled = Some(buffered);
        Ok(())
    }
}

impl Drop for MemoryReceiver {
    fn drop(&mut self) {
        // Buffered at cancel but never handed out
        if let Some(buffered) = self.cancelled.take() {
            for message in buffered {
                let _ = self.requeue_tx.send(message);
            }
        }

        for (_, payload) in self.unacked.drain() {
            let _ = self.requeue_tx.send(QueuedMessage {
                payload,
                redelivered: true,
            });
        }

        if let Some(rx) = self.rx.take() {
            if let Some(slot) = self.broker.queues.lock().get_mut(&self.queue) {
                slot.rx = Some(rx);
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    async fn next_payload(receiver: &mut MemoryReceiver) -> InboundMessage {
        tokio::time::timeout(std::time::Duration::from_millis(100), receiver.recv())
            .await
            .unwrap()
            .unwrap()
            .unwrap()
    }

    #[tokio::test]
    async fn test_declare_is_idempotent() {
        let broker = MemoryBroker::new();
        let sender = broker.sender();

        sender.declare_queue("TSLA").await.unwrap();
        sender.declare_queue("TSLA").await.unwrap();
        sender.declare_queue("AAPL").await.unwrap();

        assert_eq!(broker.queue_names(), vec!["AAPL".to_string(), "TSLA".to_string()]);
    }

    #[tokio::test]
    async fn test_fifo_per_queue() {
        let broker = MemoryBroker::new();
        let sender = broker.sender();
        sender.declare_queue("TSLA").await.unwrap();

        for i in 0..5u8 {
            sender.send("TSLA", &[i]).await.unwrap();
        }

        let mut receiver = broker.subscribe("TSLA", true).unwrap();
        for i in 0..5u8 {
            assert_eq!(next_payload(&mut receiver).await.payload, vec![i]);
        }
    }

    #[tokio::test]
    async fn test_single_subscriber_per_queue() {
        let broker = MemoryBroker::new();
        let _first = broker.subscribe("MSFT", true).unwrap();

        assert!(matches!(
            broker.subscribe("MSFT", true),
            Err(ChannelError::AlreadySubscribed(_))
        ));
    }

    #[tokio::test]
    async fn test_undeclared_queue_drops_message() {
        let broker = MemoryBroker::new();
        broker.sender().send("NOPE", b"x").await.unwrap();
        assert!(broker.queue_names().is_empty());
    }

    #[tokio::test]
    async fn test_reject_with_requeue_redelivers() {
        let broker = MemoryBroker::new();
        let sender = broker.sender();
        sender.declare_queue("AAPL").await.unwrap();
        sender.send("AAPL", b"first").await.unwrap();

        let mut receiver = broker.subscribe("AAPL", false).unwrap();
        let delivery = next_payload(&mut receiver).await;
        assert!(!delivery.redelivered);
        assert_eq!(receiver.unacked_count(), 1);

        receiver.reject(delivery.delivery_tag, true).await.unwrap();

        let again = next_payload(&mut receiver).await;
        assert_eq!(again.payload, b"first".to_vec());
        assert!(again.redelivered);

        receiver.ack(again.delivery_tag).await.unwrap();
        assert_eq!(receiver.unacked_count(), 0);
        assert!(matches!(
            receiver.ack(again.delivery_tag).await,
            Err(ChannelError::UnknownDelivery(_))
        ));
    }

    #[tokio::test]
    async fn test_unacked_returned_when_subscriber_dropped() {
        let broker = MemoryBroker::new();
        let sender = broker.sender();
        sender.declare_queue("AAPL").await.unwrap();
        sender.send("AAPL", b"pending").await.unwrap();

        {
            let mut receiver = broker.subscribe("AAPL", false).unwrap();
            let _ = next_payload(&mut receiver).await;
        }

        let mut receiver = broker.subscribe("AAPL", false).unwrap();
        let delivery = next_payload(&mut receiver).await;
        assert_eq!(delivery.payload, b"pending".to_vec());
        assert!(delivery.redelivered);
    }

    #[tokio::test]
    async fn test_cancel_stops_new_deliveries() {
        let broker = MemoryBroker::new();
        let sender = broker.sender();
        sender.declare_queue("TSLA").await.unwrap();
        sender.send("TSLA", b"before").await.unwrap();

        let mut receiver = broker.subscribe("TSLA", true).unwrap();
        receiver.cancel().await.unwrap();
        sender.send("TSLA", b"after").await.unwrap();

        assert_eq!(next_payload(&mut receiver).await.payload, b"before".to_vec());
        assert!(receiver.recv().await.is_none());

        // Whatever arrived after the cancel waits for the next subscriber
        drop(receiver);
        let mut receiver = broker.subscribe("TSLA", true).unwrap();
        assert_eq!(next_payload(&mut receiver).await.payload, b"after".to_vec());
    }

    #[tokio::test]
    async fn test_closed_broker_fails_sends() {
        let broker = MemoryBroker::new();
        let sender = broker.sender();
        sender.declare_queue("TSLA").await.unwrap();

        broker.close();

        assert!(matches!(sender.send("TSLA", b"x").await, Err(ChannelError::Closed)));
    }
}
