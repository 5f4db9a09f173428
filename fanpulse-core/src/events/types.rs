//! Event type definitions for the pipeline.
//!
//! Game events themselves are shared with clients and live in
//! `fanpulse_sdk::objects`; this module re-exports them and adds the
//! in-process envelopes that travel between processors.

use std::sync::Arc;
use std::time::Instant;

pub use fanpulse_sdk::objects::{
    EventType, FantasyImpact, GameEvent, PlayType, PlayerStateSnapshot, ProcessedData, RawEvent,
    Stat, StatLine, TeamStateSnapshot, Trigger,
};

/// A validated event waiting in an ingestion buffer.
///
/// `ingested_at` is captured once at the arrival call and is the reference
/// point for every latency measurement downstream.
#[derive(Debug, Clone)]
pub struct BufferedEvent {
    pub event: GameEvent,
    pub ingested_at: Instant,
}

impl BufferedEvent {
    pub fn new(event: GameEvent) -> Self {
        Self {
            event,
            ingested_at: Instant::now(),
        }
    }
}

/// Periodic tick emitted by the flush scheduler.
///
/// Every partition runner receives every tick and force-flushes its pending
/// batch when one arrives.
#[derive(Debug, Clone, Copy)]
pub struct FlushTick {
    /// Monotonic tick counter, starting at 1.
    pub seq: u64,
    pub fired_at: Instant,
}

/// Request to persist the latest snapshot of one player.
#[derive(Debug, Clone)]
pub struct PersistRequest {
    pub snapshot: PlayerStateSnapshot,
}

/// Processed update as delivered to subscribers.
pub type TeamNotification = Arc<ProcessedData>;
