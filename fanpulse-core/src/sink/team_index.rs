//! Player → subscriber-team index.
//!
//! The pipeline only reads this index. Who maintains rosters is outside its
//! concern; [`StaticTeamIndex`] covers the common case of a roster file.

use std::collections::HashMap;

use compact_str::CompactString;
use serde::Deserialize;
use smallvec::SmallVec;

use crate::config::ConfigError;

/// Teams a player belongs to. Almost always a handful.
pub type TeamList = SmallVec<[CompactString; 4]>;

pub trait TeamIndex: Send + Sync {
    fn teams_for(&self, player_id: &str) -> TeamList;
}

/// Fixed index loaded once at startup.
///
/// TOML form:
///
/// ```toml
/// [players]
/// mahomes-15 = ["league-a/team-3", "league-b/team-1"]
/// ```
#[derive(Debug, Clone, Default, Deserialize)]
pub struct StaticTeamIndex {
    #[serde(default)]
    players: HashMap<CompactString, TeamList>,
}

impl StaticTeamIndex {
    pub fn new(players: HashMap<CompactString, TeamList>) -> Self {
        Self { players }
    }

    pub fn from_toml_str(content: &str) -> Result<Self, ConfigError> {
        Ok(toml::from_str(content)?)
    }

    pub fn len(&self) -> usize {
        self.players.len()
    }

    pub fn is_empty(&self) -> bool {
        self.players.is_empty()
    }
}

impl TeamIndex for StaticTeamIndex {
    fn teams_for(&self, player_id: &str) -> TeamList {
        self.players.get(player_id).cloned().unwrap_or_default()
    }
}
