#![deny(clippy::unwrap_used)]
#![deny(clippy::expect_used)]
#![deny(clippy::panic)]
#![forbid(unsafe_code)]
#![cfg_attr(test, allow(clippy::unwrap_used, clippy::expect_used, clippy::panic))]

pub mod config;
pub mod entities;
pub mod events;
pub mod fast_path;
pub mod framework;
pub mod ingest;
pub mod metrics;
pub mod pipeline;
pub mod processors;
pub mod scoring;
pub mod sink;
pub mod state;
pub mod topology;

pub use pipeline::{Pipeline, PipelineBuilder, PipelineError, PipelineHandle, RunningPipeline};

#[cfg(test)]
pub(crate) mod test_support;
