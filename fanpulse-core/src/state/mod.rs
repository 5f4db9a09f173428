//! In-memory player and team state.

pub mod player;
pub mod store;

pub use player::{PlayerState, TeamState, decay_factor};
pub use store::{ApplyOutcome, PlayerStateStore};
