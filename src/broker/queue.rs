//! Bounded per-sink sample queue with drop-oldest backpressure.

use std::collections::VecDeque;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Mutex;

use tokio::sync::Notify;

use crate::frame::TelemetrySample;

/// Single-producer single-consumer bounded queue.
///
/// The producer is the broker's ingestion loop, the consumer is one sink's
/// consumption loop. A full queue evicts its oldest entry to admit the new
/// one, so [`push`](Self::push) never blocks and never suspends; that is
/// what keeps a stalled sink from ever holding up ingestion.
#[derive(Debug)]
pub struct SampleQueue {
    inner: Mutex<VecDeque<TelemetrySample>>,
    capacity: usize,
    dropped: AtomicU64,
    notify: Notify,
}

impl SampleQueue {
    pub fn new(capacity: usize) -> Self {
        assert!(capacity > 0, "queue capacity must be non-zero");
        Self {
            inner: Mutex::new(VecDeque::with_capacity(capacity)),
            capacity,
            dropped: AtomicU64::new(0),
            notify: Notify::new(),
        }
    }

    /// Enqueue a sample, evicting the oldest entry if at capacity
    pub fn push(&self, sample: TelemetrySample) {
        {
            let mut queue = self.inner.lock().unwrap();
            if queue.len() >= self.capacity {
                queue.pop_front();
                self.dropped.fetch_add(1, Ordering::Relaxed);
            }
            queue.push_back(sample);
        }
        self.notify.notify_one();
    }

    /// Dequeue without waiting
    pub fn try_pop(&self) -> Option<TelemetrySample> {
        self.inner.lock().unwrap().pop_front()
    }

    /// Dequeue, waiting for a sample if the queue is empty
    pub async fn pop(&self) -> TelemetrySample {
        loop {
            if let Some(sample) = self.try_pop() {
                return sample;
            }
            // notify_one stores a permit if nobody is waiting yet, so a
            // push between try_pop and notified() is not missed.
            self.notify.notified().await;
        }
    }

    pub fn len(&self) -> usize {
        self.inner.lock().unwrap().len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Samples evicted by the drop-oldest policy since creation
    pub fn dropped(&self) -> u64 {
        self.dropped.load(Ordering::Relaxed)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::frame::{codec, CaptureTime};
    use std::sync::Arc;

    fn sample(battery: f64) -> TelemetrySample {
        let line = format!("$$HAR,0,0,0,0,0,0,0,0,0,0,{}", battery);
        codec::decode(&line, CaptureTime::now()).unwrap()
    }

    #[test]
    fn test_fifo_order() {
        let queue = SampleQueue::new(8);
        for i in 0..3 {
            queue.push(sample(i as f64));
        }
        assert_eq!(queue.try_pop().unwrap().battery, 0.0);
        assert_eq!(queue.try_pop().unwrap().battery, 1.0);
        assert_eq!(queue.try_pop().unwrap().battery, 2.0);
        assert!(queue.try_pop().is_none());
    }

    #[test]
    fn test_full_queue_drops_oldest() {
        let capacity = 4;
        let queue = SampleQueue::new(capacity);

        // N+1 pushes into a queue of capacity N
        for i in 0..=capacity {
            queue.push(sample(i as f64));
        }

        assert_eq!(queue.dropped(), 1);
        assert_eq!(queue.len(), capacity);
        // The oldest entry (battery 0.0) was the one evicted
        assert_eq!(queue.try_pop().unwrap().battery, 1.0);
    }

    #[test]
    fn test_sustained_overflow_counts_every_drop() {
        let queue = SampleQueue::new(2);
        for i in 0..10 {
            queue.push(sample(i as f64));
        }
        assert_eq!(queue.dropped(), 8);
        assert_eq!(queue.try_pop().unwrap().battery, 8.0);
        assert_eq!(queue.try_pop().unwrap().battery, 9.0);
    }

    #[tokio::test]
    async fn test_pop_waits_for_push() {
        let queue = Arc::new(SampleQueue::new(4));

        let consumer = {
            let queue = queue.clone();
            tokio::spawn(async move { queue.pop().await })
        };

        tokio::task::yield_now().await;
        queue.push(sample(7.0));

        let popped = consumer.await.unwrap();
        assert_eq!(popped.battery, 7.0);
    }
}
