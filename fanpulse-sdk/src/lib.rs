//! Shared types for the FanPulse live game event pipeline.
//!
//! `objects` holds every payload that crosses a process boundary: the
//! inbound feed shape, the canonical event, processed updates, health
//! snapshots and WebSocket frames. The `client` feature adds typed HTTP and
//! WebSocket clients.

#![forbid(unsafe_code)]

pub mod objects;

#[cfg(feature = "client")]
pub mod client;
