//! Session counters and the monitoring snapshot.
//!
//! Counters are plain atomics: the ingestion loop and sink loops increment
//! them, a monitoring caller reads them at any time without coordination.
//! This snapshot is the only observability surface the excluded UI layers
//! get, so everything they might poll lives here.

use std::sync::atomic::{AtomicU64, Ordering};

use crate::serial::ConnectionState;

/// Pipeline-wide frame counters, owned by the ingestion loop
#[derive(Debug, Default)]
pub struct BrokerCounters {
    received: AtomicU64,
    malformed: AtomicU64,
    decoded: AtomicU64,
}

impl BrokerCounters {
    /// One raw line arrived from the source
    pub fn record_received(&self) {
        self.received.fetch_add(1, Ordering::Relaxed);
    }

    /// A prefixed frame failed to decode
    pub fn record_malformed(&self) {
        self.malformed.fetch_add(1, Ordering::Relaxed);
    }

    /// A frame decoded into a sample and was fanned out to every sink
    pub fn record_decoded(&self) {
        self.decoded.fetch_add(1, Ordering::Relaxed);
    }
}

/// Per-sink delivery counters
#[derive(Debug, Default)]
pub struct SinkCounters {
    enqueued: AtomicU64,
    delivered: AtomicU64,
    errors: AtomicU64,
}

impl SinkCounters {
    pub fn record_enqueued(&self) {
        self.enqueued.fetch_add(1, Ordering::Relaxed);
    }

    pub fn record_delivered(&self) {
        self.delivered.fetch_add(1, Ordering::Relaxed);
    }

    pub fn record_error(&self) {
        self.errors.fetch_add(1, Ordering::Relaxed);
    }

    pub fn errors(&self) -> u64 {
        self.errors.load(Ordering::Relaxed)
    }
}

/// Read-only view of one sink's counters
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SinkStats {
    pub name: String,
    /// Samples the ingestion loop enqueued for this sink
    pub enqueued: u64,
    /// Samples the sink accepted successfully
    pub delivered: u64,
    /// Samples evicted from this sink's queue by the drop-oldest policy
    pub dropped: u64,
    /// Processing errors reported by `accept`
    pub errors: u64,
    /// Samples currently waiting in the queue
    pub queued: usize,
}

impl SinkStats {
    pub(super) fn capture(
        name: &str,
        counters: &SinkCounters,
        queue: &super::queue::SampleQueue,
    ) -> Self {
        Self {
            name: name.to_string(),
            enqueued: counters.enqueued.load(Ordering::Relaxed),
            delivered: counters.delivered.load(Ordering::Relaxed),
            dropped: queue.dropped(),
            errors: counters.errors.load(Ordering::Relaxed),
            queued: queue.len(),
        }
    }
}

/// Point-in-time view of the whole pipeline
#[derive(Debug, Clone)]
pub struct BrokerSnapshot {
    /// Raw lines received from the serial source
    pub frames_received: u64,
    /// Prefixed frames that failed to decode (non-frames are not counted)
    pub frames_malformed: u64,
    /// Frames decoded into samples and fanned out
    pub frames_decoded: u64,
    pub sinks: Vec<SinkStats>,
    pub connection: ConnectionState,
}

impl BrokerSnapshot {
    pub(super) fn capture(
        counters: &BrokerCounters,
        sinks: Vec<SinkStats>,
        connection: ConnectionState,
    ) -> Self {
        Self {
            frames_received: counters.received.load(Ordering::Relaxed),
            frames_malformed: counters.malformed.load(Ordering::Relaxed),
            frames_decoded: counters.decoded.load(Ordering::Relaxed),
            sinks,
            connection,
        }
    }
}
