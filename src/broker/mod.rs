//! # Broker Module
//!
//! Wires the pipeline together: serial source → frame codec → fan-out to
//! every registered sink.
//!
//! This module handles:
//! - One bounded drop-oldest queue per sink (see [`queue`])
//! - The ingestion loop (read, decode, count, fan out)
//! - One independent consumption loop per sink
//! - Malformed-frame and per-sink delivery accounting (see [`stats`])
//! - Cooperative shutdown with bounded draining
//!
//! The central invariant: a slow or stalled sink can never block ingestion
//! of new frames or delivery to other sinks. Enqueueing never suspends;
//! backpressure is paid by the lagging sink alone, as dropped samples.

pub mod queue;
pub mod stats;

use std::sync::Arc;
use std::time::Duration;

use tokio::sync::watch;
use tokio::task::JoinHandle;
use tracing::{debug, error, info, warn};

use crate::error::HabetBrokerError;
use crate::frame::{codec, DecodeError, TelemetrySample};
use crate::serial::{ConnectionState, SerialSource};
use crate::sink::Sink;
use queue::SampleQueue;
use stats::{BrokerCounters, BrokerSnapshot, SinkCounters, SinkStats};

/// Grace period per queued sample when draining a sink at shutdown
const DRAIN_GRACE: Duration = Duration::from_millis(500);

struct Registration {
    sink: Box<dyn Sink>,
    queue: Arc<SampleQueue>,
    counters: Arc<SinkCounters>,
}

/// Pipeline builder: construct, register sinks, then [`spawn`](Self::spawn).
pub struct Broker {
    source: SerialSource,
    default_capacity: usize,
    registrations: Vec<Registration>,
    counters: Arc<BrokerCounters>,
}

impl Broker {
    /// `default_capacity` bounds every sink queue unless overridden at
    /// registration.
    pub fn new(source: SerialSource, default_capacity: usize) -> Self {
        Self {
            source,
            default_capacity,
            registrations: Vec::new(),
            counters: Arc::new(BrokerCounters::default()),
        }
    }

    /// Register a sink with the default queue capacity
    pub fn register(&mut self, sink: Box<dyn Sink>) {
        self.register_with_capacity(sink, self.default_capacity);
    }

    /// Register a sink with its own queue capacity
    pub fn register_with_capacity(&mut self, sink: Box<dyn Sink>, capacity: usize) {
        self.registrations.push(Registration {
            sink,
            queue: Arc::new(SampleQueue::new(capacity)),
            counters: Arc::new(SinkCounters::default()),
        });
    }

    /// Spawn the ingestion loop and one consumption loop per sink.
    ///
    /// The returned handle owns the stop signal and is the monitoring
    /// surface. Dropping it stops the pipeline without waiting for the
    /// queues to drain; call [`BrokerHandle::shutdown`] for an orderly
    /// stop.
    pub fn spawn(self) -> BrokerHandle {
        let (stop_tx, stop_rx) = watch::channel(false);
        let state_rx = self.source.state();

        let mut sink_tasks = Vec::new();
        let mut sink_handles = Vec::new();
        let mut outputs = Vec::new();

        for registration in self.registrations {
            let name = registration.sink.name().to_string();
            outputs.push((registration.queue.clone(), registration.counters.clone()));
            sink_handles.push(SinkHandle {
                name: name.clone(),
                counters: registration.counters.clone(),
                queue: registration.queue.clone(),
            });
            info!(sink = %name, "sink registered");
            sink_tasks.push(tokio::spawn(sink_loop(
                registration.sink,
                registration.queue,
                registration.counters,
                stop_rx.clone(),
            )));
        }

        let ingest = tokio::spawn(ingest_loop(
            self.source,
            outputs,
            self.counters.clone(),
            stop_rx,
        ));

        BrokerHandle {
            stop_tx,
            ingest: Some(ingest),
            sink_tasks,
            counters: self.counters,
            sinks: sink_handles,
            state_rx,
        }
    }
}

struct SinkHandle {
    name: String,
    counters: Arc<SinkCounters>,
    queue: Arc<SampleQueue>,
}

/// Running pipeline: stop signal, join handles and the monitoring surface
pub struct BrokerHandle {
    stop_tx: watch::Sender<bool>,
    ingest: Option<JoinHandle<Result<(), HabetBrokerError>>>,
    sink_tasks: Vec<JoinHandle<()>>,
    counters: Arc<BrokerCounters>,
    sinks: Vec<SinkHandle>,
    state_rx: watch::Receiver<ConnectionState>,
}

impl BrokerHandle {
    /// Point-in-time view of all counters and the source connection state
    pub fn snapshot(&self) -> BrokerSnapshot {
        let sinks = self
            .sinks
            .iter()
            .map(|sink| SinkStats::capture(&sink.name, &sink.counters, &sink.queue))
            .collect();
        BrokerSnapshot::capture(&self.counters, sinks, *self.state_rx.borrow())
    }

    pub fn connection_state(&self) -> ConnectionState {
        *self.state_rx.borrow()
    }

    /// Wait for the ingestion loop to stop on its own. Outside of an
    /// explicit shutdown that only happens when the serial source goes
    /// fatal, reported here as [`HabetBrokerError::SourceExhausted`]; a
    /// supervising caller should treat it as terminal and shut the
    /// pipeline down (or restart it). A panicked ingestion task surfaces
    /// as [`HabetBrokerError::Task`]. Returns `Ok(())` once the result
    /// has already been consumed.
    pub async fn ingestion_finished(&mut self) -> Result<(), HabetBrokerError> {
        if let Some(handle) = self.ingest.as_mut() {
            let result = handle.await;
            self.ingest = None;
            return result?;
        }
        Ok(())
    }

    /// Cooperative shutdown: stop ingestion, let every sink drain its
    /// queue (bounded per sample by an internal grace period), join all
    /// tasks. Idempotent; a second call is a no-op.
    pub async fn shutdown(&mut self) {
        let _ = self.stop_tx.send(true);
        if let Some(handle) = self.ingest.take() {
            let _ = handle.await;
        }
        for handle in self.sink_tasks.drain(..) {
            let _ = handle.await;
        }
    }
}

/// Read raw lines, decode, fan out. Stops on the stop signal or, with an
/// error, when the source goes fatal.
async fn ingest_loop(
    mut source: SerialSource,
    outputs: Vec<(Arc<SampleQueue>, Arc<SinkCounters>)>,
    counters: Arc<BrokerCounters>,
    mut stop_rx: watch::Receiver<bool>,
) -> Result<(), HabetBrokerError> {
    info!("ingestion loop started");
    loop {
        let line = tokio::select! {
            _ = stop_rx.changed() => {
                debug!("ingestion loop stopping");
                return Ok(());
            }
            line = source.next_line() => line,
        };

        let Some(raw) = line else {
            error!("telemetry source is gone, ingestion halted");
            return Err(HabetBrokerError::SourceExhausted);
        };

        counters.record_received();
        match codec::decode(&raw.text, raw.captured) {
            Ok(sample) => {
                counters.record_decoded();
                for (queue, sink_counters) in &outputs {
                    queue.push(sample.clone());
                    sink_counters.record_enqueued();
                }
            }
            // Interleaved non-telemetry output, ignored without accounting
            Err(DecodeError::NotATelemetryFrame) => {}
            Err(e) => {
                counters.record_malformed();
                debug!("malformed frame dropped: {}", e);
            }
        }
    }
}

/// One sink's consumption loop: dequeue and deliver at the sink's own pace
/// until the stop signal, then drain what is already queued.
async fn sink_loop(
    mut sink: Box<dyn Sink>,
    queue: Arc<SampleQueue>,
    counters: Arc<SinkCounters>,
    mut stop_rx: watch::Receiver<bool>,
) {
    loop {
        let sample = tokio::select! {
            _ = stop_rx.changed() => break,
            sample = queue.pop() => sample,
        };
        tokio::select! {
            // An accept stuck in sink-side I/O is abandoned at shutdown
            _ = stop_rx.changed() => break,
            _ = deliver(sink.as_mut(), &sample, &counters) => {}
        }
    }
    drain(sink.as_mut(), &queue, &counters).await;
}

/// Deliver one sample; sink errors are counted and logged, never raised
async fn deliver(sink: &mut dyn Sink, sample: &TelemetrySample, counters: &SinkCounters) {
    match sink.accept(sample).await {
        Ok(()) => counters.record_delivered(),
        Err(e) => {
            counters.record_error();
            warn!(sink = sink.name(), errors = counters.errors(), "sink error: {}", e);
        }
    }
}

/// Best-effort drain of already-enqueued samples at shutdown
async fn drain(sink: &mut dyn Sink, queue: &SampleQueue, counters: &SinkCounters) {
    let mut drained = 0u64;
    while let Some(sample) = queue.try_pop() {
        match tokio::time::timeout(DRAIN_GRACE, deliver(sink, &sample, counters)).await {
            Ok(()) => drained += 1,
            Err(_) => {
                warn!(
                    sink = sink.name(),
                    abandoned = queue.len() + 1,
                    "sink did not drain in time, abandoning queue"
                );
                return;
            }
        }
    }
    if drained > 0 {
        debug!(sink = sink.name(), drained, "sink drained at shutdown");
    }
}
