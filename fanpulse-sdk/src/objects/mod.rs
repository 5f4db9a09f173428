pub mod event;
pub mod health;
pub mod ingest;
pub mod processed;
pub mod ws;

pub use event::{EventTimestamp, EventType, GameEvent, PlayType, RawEvent, Stat, StatLine};
pub use health::{HealthSnapshot, MetricTotals};
pub use ingest::{IngestRequest, IngestResponse, RejectedEvent, decode_events};
pub use processed::{
    FantasyImpact, PlayerStateSnapshot, ProcessedData, TeamStateSnapshot, Trigger,
};
