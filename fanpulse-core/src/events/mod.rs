//! Event system for the pipeline.
//!
//! This module provides event types and channel infrastructure connecting
//! the pipeline's processors.
//!
//! # Event Flow
//!
//! 1. `RawEvent` -> adapter -> `GameEvent` -> `BufferedEvent` in a partition buffer
//! 2. `FlushScheduler` emits `FlushTick` -> every `PartitionRunner`
//! 3. `PartitionRunner` folds events and emits `ProcessedData` -> `SinkDispatcher`
//! 4. `SinkDispatcher` broadcasts `TeamNotification` and queues `PersistRequest` -> `StateWriter`

pub mod channels;
pub mod types;

pub use channels::{
    DEFAULT_CHANNEL_BUFFER, DEFAULT_NOTIFICATION_BUFFER, DEFAULT_PERSIST_QUEUE, FlushTickReceiver,
    FlushTickSender, NotificationReceiver, NotificationSender, PersistRequestReceiver,
    PersistRequestSender, flush_tick_channel, notification_channel, persist_request_channel,
};

pub use types::{
    BufferedEvent, EventType, FantasyImpact, FlushTick, GameEvent, PersistRequest, PlayType,
    PlayerStateSnapshot, ProcessedData, RawEvent, Stat, StatLine, TeamNotification,
    TeamStateSnapshot, Trigger,
};
