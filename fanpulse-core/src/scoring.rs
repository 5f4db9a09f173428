//! Fantasy scoring.
//!
//! [`score`] is a pure function of an event and a [`ScoringTable`]. Tables
//! are plain data, loadable from TOML and swappable at runtime through a
//! [`ConfigStore`](crate::config::ConfigStore).

use std::collections::{BTreeMap, BTreeSet};
use std::path::Path;

use fanpulse_sdk::objects::{EventType, GameEvent, Stat};
use serde::{Deserialize, Serialize};

use crate::config::ConfigError;

/// Per-stat weights plus per-type bonuses.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ScoringTable {
    /// Points awarded per unit of each stat.
    #[serde(default = "default_weights")]
    pub weights: BTreeMap<Stat, f64>,
    /// Event types whose stat deltas are scored. Other types only earn their
    /// `type_bonus`, if any.
    #[serde(default = "default_scored_types")]
    pub scored_types: BTreeSet<EventType>,
    /// Fixed points added for every event of the given type.
    #[serde(default)]
    pub type_bonus: BTreeMap<EventType, f64>,
}

fn default_weights() -> BTreeMap<Stat, f64> {
    BTreeMap::from([
        (Stat::Points, 1.0),
        (Stat::PassingYards, 0.04),
        (Stat::PassingTouchdowns, 4.0),
        (Stat::Interceptions, -2.0),
        (Stat::RushingYards, 0.1),
        (Stat::RushingTouchdowns, 6.0),
        (Stat::ReceivingYards, 0.1),
        (Stat::ReceivingTouchdowns, 6.0),
        (Stat::Receptions, 1.0),
        (Stat::FumblesLost, -2.0),
    ])
}

fn default_scored_types() -> BTreeSet<EventType> {
    BTreeSet::from([EventType::Play, EventType::Score])
}

impl Default for ScoringTable {
    /// Point-per-reception table.
    fn default() -> Self {
        Self {
            weights: default_weights(),
            scored_types: default_scored_types(),
            type_bonus: BTreeMap::new(),
        }
    }
}

impl ScoringTable {
    pub fn from_toml_str(content: &str) -> Result<Self, ConfigError> {
        let table: ScoringTable = toml::from_str(content)?;
        table.validate()?;
        Ok(table)
    }

    pub fn from_path(path: impl AsRef<Path>) -> Result<Self, ConfigError> {
        let content = std::fs::read_to_string(path)?;
        Self::from_toml_str(&content)
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        let bad_weight = self.weights.iter().find(|(_, weight)| !weight.is_finite());
        if let Some((stat, _)) = bad_weight {
            return Err(ConfigError::Validation(format!(
                "weight for {stat} is not a finite number"
            )));
        }
        let bad_bonus = self.type_bonus.iter().find(|(_, bonus)| !bonus.is_finite());
        if let Some((kind, _)) = bad_bonus {
            return Err(ConfigError::Validation(format!(
                "bonus for {kind} is not a finite number"
            )));
        }
        Ok(())
    }

    pub fn weight(&self, stat: Stat) -> f64 {
        self.weights.get(&stat).copied().unwrap_or(0.0)
    }
}

/// Fantasy points earned by a single event.
///
/// Stats without a weight, and non-finite stat values, contribute zero.
pub fn score(event: &GameEvent, table: &ScoringTable) -> f64 {
    let bonus = table.type_bonus.get(&event.kind).copied().unwrap_or(0.0);
    if !table.scored_types.contains(&event.kind) {
        return bonus;
    }

    let from_stats: f64 = event
        .stats
        .iter()
        .filter(|(_, value)| value.is_finite())
        .map(|(stat, value)| table.weight(*stat) * value)
        .sum();

    from_stats + bonus
}
