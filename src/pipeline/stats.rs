use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

/// Counters for one publisher task
#[derive(Debug, Clone, Default)]
pub struct PublishCounters {
    published: Arc<AtomicU64>,
    failed: Arc<AtomicU64>,
}

/// Point-in-time view of [`PublishCounters`]
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PublishSnapshot {
    pub published: u64,
    pub failed: u64,
}

impl PublishCounters {
    pub(crate) fn record_published(&self) {
        self.published.fetch_add(1, Ordering::Relaxed);
    }

    pub(crate) fn record_failed(&self) {
        self.failed.fetch_add(1, Ordering::Relaxed);
    }

    pub fn snapshot(&self) -> PublishSnapshot {
        PublishSnapshot {
            published: self.published.load(Ordering::Relaxed),
            failed: self.failed.load(Ordering::Relaxed),
        }
    }
}

/// Counters for one consumer task
#[derive(Debug, Clone, Default)]
pub struct ConsumeCounters {
    received: Arc<AtomicU64>,
    persisted: Arc<AtomicU64>,
    decode_failures: Arc<AtomicU64>,
    persist_failures: Arc<AtomicU64>,
    unknown_event_types: Arc<AtomicU64>,
}

/// Point-in-time view of [`ConsumeCounters`]
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ConsumeSnapshot {
    pub received: u64,
    pub persisted: u64,
    pub decode_failures: u64,
    pub persist_failures: u64,
    pub unknown_event_types: u64,
}

impl ConsumeCounters {
    pub(crate) fn record_received(&self) {
        self.received.fetch_add(1, Ordering::Relaxed);
    }

    pub(crate) fn record_persisted(&self) {
        self.persisted.fetch_add(1, Ordering::Relaxed);
    }

    pub(crate) fn record_decode_failure(&self) {
        self.decode_failures.fetch_add(1, Ordering::Relaxed);
    }

    pub(crate) fn record_persist_failure(&self) {
        self.persist_failures.fetch_add(1, Ordering::Relaxed);
    }

    pub(crate) fn record_unknown_event_type(&self) {
        self.unknown_event_types.fetch_add(1, Ordering::Relaxed);
    }

    pub fn snapshot(&self) -> ConsumeSnapshot {
        ConsumeSnapshot {
            received: self.received.load(Ordering::Relaxed),
            persisted: self.persisted.load(Ordering::Relaxed),
            decode_failures: self.decode_failures.load(Ordering::Relaxed),
            persist_failures: self.persist_failures.load(Ordering::Relaxed),
            unknown_event_types: self.unknown_event_types.load(Ordering::Relaxed),
        }
    }
}
