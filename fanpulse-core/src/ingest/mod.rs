//! Ingestion side: feed adapter, bounded buffers and sequence tracking.

pub mod adapter;
pub mod buffer;
pub mod feed;
pub mod sequence;

pub use adapter::{MalformedEvent, normalize};
pub use buffer::IngestionBuffer;
pub use feed::{FeedConsumer, FeedStats};
pub use sequence::{SequenceCheck, SequenceTracker};
