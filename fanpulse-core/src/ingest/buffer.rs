//! Bounded ingestion buffer.
//!
//! A lock-free ring over [`crossbeam::queue::ArrayQueue`]. Producers never
//! block: when the ring is full the oldest event is evicted to make room
//! and the overflow counter is bumped.

use std::sync::atomic::{AtomicU64, Ordering};

use crossbeam::queue::ArrayQueue;

use crate::events::BufferedEvent;

pub struct IngestionBuffer {
    queue: ArrayQueue<BufferedEvent>,
    overflow: AtomicU64,
}

impl IngestionBuffer {
    /// Create a buffer holding at most `capacity` events (minimum 1).
    pub fn new(capacity: usize) -> Self {
        Self {
            queue: ArrayQueue::new(capacity.max(1)),
            overflow: AtomicU64::new(0),
        }
    }

    /// Append at the tail. Returns the evicted event when the buffer was full.
    pub fn push(&self, event: BufferedEvent) -> Option<BufferedEvent> {
        let evicted = self.queue.force_push(event);
        if evicted.is_some() {
            self.overflow.fetch_add(1, Ordering::Relaxed);
        }
        evicted
    }

    /// Remove up to `max` events from the head, oldest first.
    pub fn drain(&self, max: usize) -> Vec<BufferedEvent> {
        let mut out = Vec::with_capacity(max.min(self.queue.len()));
        while out.len() < max {
            match self.queue.pop() {
                Some(event) => out.push(event),
                None => break,
            }
        }
        out
    }

    pub fn len(&self) -> usize {
        self.queue.len()
    }

    pub fn is_empty(&self) -> bool {
        self.queue.is_empty()
    }

    pub fn capacity(&self) -> usize {
        self.queue.capacity()
    }

    /// Events evicted since creation.
    pub fn overflow_count(&self) -> u64 {
        self.overflow.load(Ordering::Relaxed)
    }
}
