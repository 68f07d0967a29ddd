use async_trait::async_trait;
use parking_lot::Mutex;
use std::sync::Arc;

use super::connection::SinkError;
use super::sink::Sink;
use crate::models::NormalizedRecord;

/// In-memory sink that keeps every record in arrival order
///
/// Clones share the same storage. `fail_next` makes the next `n` writes fail,
/// which is how tests simulate an unreachable store.
#[derive(Clone, Default)]
pub struct MemorySink {
    records: Arc<Mutex<Vec<NormalizedRecord>>>,
    failures_left: Arc<Mutex<usize>>,
}

impl MemorySink {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn records(&self) -> Vec<NormalizedRecord> {
        self.records.lock().clone()
    }

    pub fn len(&self) -> usize {
        self.records.lock().len()
    }

    pub fn is_empty(&self) -> bool {
        self.records.lock().is_empty()
    }

    pub fn fail_next(&self, writes: usize) {
        *self.failures_left.lock() = writes;
    }
}

#[async_trait]
impl Sink for MemorySink {
    async fn write(&self, record: &NormalizedRecord) -> Result<(), SinkError> {
        {
            let mut failures_left = self.failures_left.lock();
            if *failures_left > 0 {
                *failures_left -= 1;
                return Err(SinkError::WriteFailed("injected failure".to_string()));
            }
        }

        self.records.lock().push(record.clone());
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_records_kept_in_order() {
        let sink = MemorySink::new();

        sink.write(&NormalizedRecord::new("AAPL", 1.0)).await.unwrap();
        sink.write(&NormalizedRecord::new("AAPL", 2.0)).await.unwrap();
        sink.write(&NormalizedRecord::new("AAPL", 2.0)).await.unwrap();

        let prices: Vec<f64> = sink.records().iter().map(|r| r.avg_price).collect();
        assert_eq!(prices, vec![1.0, 2.0, 2.0]);
    }

    #[tokio::test]
    async fn test_injected_failures() {
        let sink = MemorySink::new();
        sink.fail_next(1);

        assert!(sink.write(&NormalizedRecord::new("MSFT", 10.0)).await.is_err());
        assert!(sink.write(&NormalizedRecord::new("MSFT", 11.0)).await.is_ok());
        assert_eq!(sink.len(), 1);
    }
}
