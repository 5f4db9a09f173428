//! Event channel factories and handles.
//!
//! Provides factory functions for creating the channels that connect the
//! pipeline's processors, with buffer sizes suited to each hop.

use super::types::{FlushTick, PersistRequest, TeamNotification};
use tokio::sync::{broadcast, mpsc};

/// Default buffer size for event channels.
///
/// This provides enough buffer to handle bursts while keeping memory bounded.
pub const DEFAULT_CHANNEL_BUFFER: usize = 256;

/// Default capacity of the subscriber notification channel.
///
/// Subscribers that fall further behind than this observe a lag and skip
/// ahead (at-most-once delivery).
pub const DEFAULT_NOTIFICATION_BUFFER: usize = 1024;

/// Default capacity of the state writer's queue.
pub const DEFAULT_PERSIST_QUEUE: usize = 4096;

/// Sender handle for FlushTick events.
pub type FlushTickSender = broadcast::Sender<FlushTick>;
/// Receiver handle for FlushTick events.
pub type FlushTickReceiver = broadcast::Receiver<FlushTick>;

/// Sender handle for PersistRequest events.
pub type PersistRequestSender = mpsc::Sender<PersistRequest>;
/// Receiver handle for PersistRequest events.
pub type PersistRequestReceiver = mpsc::Receiver<PersistRequest>;

/// Sender handle for processed-update notifications.
pub type NotificationSender = broadcast::Sender<TeamNotification>;
/// Receiver handle for processed-update notifications.
pub type NotificationReceiver = broadcast::Receiver<TeamNotification>;

/// Create a new FlushTick channel.
///
/// Ticks are broadcast so each partition runner can subscribe independently.
/// A runner that misses ticks only needs the next one, so the buffer is small.
pub fn flush_tick_channel() -> (FlushTickSender, FlushTickReceiver) {
    broadcast::channel(16)
}

/// Create a new PersistRequest channel with the given capacity.
///
/// Producers must use `try_send`; a full queue means the writer is behind and
/// the request is dropped (and counted) rather than stalling the runner.
pub fn persist_request_channel(capacity: usize) -> (PersistRequestSender, PersistRequestReceiver) {
    mpsc::channel(capacity.max(1))
}

/// Create a new notification channel with the given capacity.
pub fn notification_channel(capacity: usize) -> (NotificationSender, NotificationReceiver) {
    broadcast::channel(capacity.max(1))
}
