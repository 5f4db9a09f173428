use fanpulse_sdk::objects::{FantasyImpact, GameEvent};

use super::team_index::TeamIndex;

/// Add one applied event to a [`FantasyImpact`]: the event's own team plus
/// every subscriber team of its player, and the player's point change.
pub fn record_impact(
    impact: &mut FantasyImpact,
    event: &GameEvent,
    fantasy_delta: f64,
    index: &dyn TeamIndex,
) {
    impact.affected_teams.insert(event.team_id.clone());
    if let Some(player_id) = &event.player_id {
        impact.add_points(player_id, fantasy_delta);
        impact.affected_teams.extend(index.teams_for(player_id));
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use compact_str::CompactString;
    use crate::sink::team_index::{StaticTeamIndex, TeamList};
    use crate::test_support::event;
    use fanpulse_sdk::objects::EventType;
    use std::collections::HashMap;

    #[test]
    fn unions_event_team_with_index() {
        let index = StaticTeamIndex::new(HashMap::from([(
            CompactString::from("p1"),
            TeamList::from_vec(vec!["fantasy-a".into(), "t1".into()]),
        )]));
        let mut impact = FantasyImpact::default();

        record_impact(&mut impact, &event("e1", EventType::Score, "t1", Some("p1")), 6.0, &index);
        record_impact(&mut impact, &event("e2", EventType::Timeout, "t2", None), 0.0, &index);

        let teams: Vec<_> = impact.affected_teams.iter().map(|t| t.as_str()).collect();
        assert_eq!(teams, ["fantasy-a", "t1", "t2"]);
        assert_eq!(impact.point_changes.len(), 1);
        assert_eq!(impact.point_changes.get("p1"), Some(&6.0));
    }
}
