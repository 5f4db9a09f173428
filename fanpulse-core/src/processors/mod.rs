//! Long-running processors of the pipeline.
//!
//! - `PartitionRunner`: Drains one `IngestionBuffer` through its topology,
//!   emits batch `ProcessedData` to the `SinkDispatcher`
//! - `FlushScheduler`: Emits `FlushTick` to every partition runner
//! - `StateWriter`: Receives `PersistRequest`, writes player snapshots
//! - `MetricsReporter`: Publishes a `HealthSnapshot` every interval

pub mod batch;
pub mod flush_scheduler;
pub mod metrics_reporter;
pub mod partition_runner;
pub mod state_writer;

pub use batch::BatchState;
pub use flush_scheduler::FlushScheduler;
pub use metrics_reporter::MetricsReporter;
pub use partition_runner::{PartitionRunner, PartitionTopology, build_topology};
pub use state_writer::{StateWriter, calculate_retry_delay};
