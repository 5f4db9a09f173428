//! Broadcast and persistence sink.

pub mod dispatcher;
pub mod impact;
pub mod repository;
pub mod team_index;

pub use dispatcher::{DispatchReport, SinkDispatcher};
pub use impact::record_impact;
pub use repository::{NoopRepository, PersistError, PgStateRepository, StateRepository};
pub use team_index::{StaticTeamIndex, TeamIndex, TeamList};
