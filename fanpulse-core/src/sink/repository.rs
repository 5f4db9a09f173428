//! Persistence boundary for player snapshots.

use std::sync::Arc;

use async_trait::async_trait;
use compact_str::CompactString;
use fanpulse_sdk::objects::PlayerStateSnapshot;
use kanau::processor::Processor;
use thiserror::Error;

use crate::entities::player_states::{GetPlayerState, UpsertPlayerState};
use crate::framework::DatabaseProcessor;

#[derive(Debug, Error)]
pub enum PersistError {
    #[error("database error: {0}")]
    Database(#[from] sqlx::Error),

    #[error("store unavailable: {0}")]
    Unavailable(String),
}

/// Current-state store keyed by player id. Writes overwrite.
#[async_trait]
pub trait StateRepository: Send + Sync {
    async fn upsert(&self, snapshot: &PlayerStateSnapshot) -> Result<(), PersistError>;

    async fn fetch(&self, player_id: &str) -> Result<Option<PlayerStateSnapshot>, PersistError>;
}

#[async_trait]
impl<R: StateRepository + ?Sized> StateRepository for Arc<R> {
    async fn upsert(&self, snapshot: &PlayerStateSnapshot) -> Result<(), PersistError> {
        (**self).upsert(snapshot).await
    }

    async fn fetch(&self, player_id: &str) -> Result<Option<PlayerStateSnapshot>, PersistError> {
        (**self).fetch(player_id).await
    }
}

/// Postgres `player_states` table.
pub struct PgStateRepository {
    db: DatabaseProcessor,
}

impl PgStateRepository {
    pub fn new(db: DatabaseProcessor) -> Self {
        Self { db }
    }
}

#[async_trait]
impl StateRepository for PgStateRepository {
    async fn upsert(&self, snapshot: &PlayerStateSnapshot) -> Result<(), PersistError> {
        self.db
            .process(UpsertPlayerState {
                snapshot: snapshot.clone(),
            })
            .await?;
        Ok(())
    }

    async fn fetch(&self, player_id: &str) -> Result<Option<PlayerStateSnapshot>, PersistError> {
        let record = self
            .db
            .process(GetPlayerState {
                player_id: CompactString::from(player_id),
            })
            .await?;
        Ok(record.map(Into::into))
    }
}

/// Persistence disabled. Writes succeed and are discarded.
#[derive(Debug, Default, Clone, Copy)]
pub struct NoopRepository;

#[async_trait]
impl StateRepository for NoopRepository {
    async fn upsert(&self, _snapshot: &PlayerStateSnapshot) -> Result<(), PersistError> {
        Ok(())
    }

    async fn fetch(&self, _player_id: &str) -> Result<Option<PlayerStateSnapshot>, PersistError> {
        Ok(None)
    }
}
