use compact_str::CompactString;
use fanpulse_sdk::objects::{PlayerStateSnapshot, StatLine};
use kanau::processor::Processor;
use sqlx::types::Json;

use crate::framework::DatabaseProcessor;

/// Row of the `player_states` current-state table.
///
/// One row per player, overwritten on every persisted update.
#[derive(Debug, Clone, PartialEq, sqlx::FromRow)]
pub struct PlayerStateRecord {
    pub player_id: String,
    pub game_stats: Json<StatLine>,
    pub fantasy_points: f64,
    pub momentum: f64,
    pub fatigue: f64,
    pub last_update: time::OffsetDateTime,
    pub persisted_at: time::OffsetDateTime,
}

impl From<PlayerStateRecord> for PlayerStateSnapshot {
    fn from(record: PlayerStateRecord) -> Self {
        PlayerStateSnapshot {
            player_id: CompactString::from(record.player_id),
            game_stats: record.game_stats.0,
            fantasy_points: record.fantasy_points,
            momentum: record.momentum,
            fatigue: record.fatigue,
            last_update: record.last_update,
        }
    }
}

#[derive(Debug, Clone)]
/// Insert or overwrite the stored snapshot of one player.
pub struct UpsertPlayerState {
    pub snapshot: PlayerStateSnapshot,
}

impl Processor<UpsertPlayerState> for DatabaseProcessor {
    type Output = ();
    type Error = sqlx::Error;
    #[tracing::instrument(skip_all, err, name = "SQL:UpsertPlayerState")]
    async fn process(&self, upsert: UpsertPlayerState) -> Result<(), sqlx::Error> {
        let UpsertPlayerState { snapshot } = upsert;
        sqlx::query(
            r#"
            INSERT INTO player_states
                (player_id, game_stats, fantasy_points, momentum, fatigue, last_update)
            VALUES ($1, $2, $3, $4, $5, $6)
            ON CONFLICT (player_id) DO UPDATE SET
                game_stats = EXCLUDED.game_stats,
                fantasy_points = EXCLUDED.fantasy_points,
                momentum = EXCLUDED.momentum,
                fatigue = EXCLUDED.fatigue,
                last_update = EXCLUDED.last_update,
                persisted_at = now()
            "#,
        )
        .bind(snapshot.player_id.as_str())
        .bind(Json(&snapshot.game_stats))
        .bind(snapshot.fantasy_points)
        .bind(snapshot.momentum)
        .bind(snapshot.fatigue)
        .bind(snapshot.last_update)
        .execute(&self.pool)
        .await?;
        Ok(())
    }
}

#[derive(Debug, Clone)]
/// Fetch the stored snapshot of one player, if any.
pub struct GetPlayerState {
    pub player_id: CompactString,
}

impl Processor<GetPlayerState> for DatabaseProcessor {
    type Output = Option<PlayerStateRecord>;
    type Error = sqlx::Error;
    #[tracing::instrument(skip_all, err, name = "SQL:GetPlayerState")]
    async fn process(
        &self,
        query: GetPlayerState,
    ) -> Result<Option<PlayerStateRecord>, sqlx::Error> {
        let record = sqlx::query_as::<_, PlayerStateRecord>(
            r#"
            SELECT player_id, game_stats, fantasy_points, momentum, fatigue, last_update, persisted_at
            FROM player_states
            WHERE player_id = $1
            "#,
        )
        .bind(query.player_id.as_str())
        .fetch_optional(&self.pool)
        .await?;
        Ok(record)
    }
}
