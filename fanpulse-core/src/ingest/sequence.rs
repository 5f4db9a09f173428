//! Per-game sequence tracking.
//!
//! Events are applied in dequeue order regardless of what this reports;
//! the tracker only makes gaps, regressions and duplicates observable.

use std::collections::HashMap;

use compact_str::CompactString;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SequenceCheck {
    /// First event seen for the game, or exactly the next sequence number.
    InOrder,
    /// Sequence numbers were skipped.
    Gap { expected: u64, got: u64 },
    /// Sequence is lower than the last one seen (late delivery).
    Regression { last: u64, got: u64 },
    /// Same sequence as the last one seen (redelivery). Not out of order.
    Duplicate { sequence: u64 },
    /// The event carries no sequence number.
    Unsequenced,
}

impl SequenceCheck {
    /// Gap or regression.
    pub fn is_anomaly(&self) -> bool {
        matches!(
            self,
            SequenceCheck::Gap { .. } | SequenceCheck::Regression { .. }
        )
    }
}

/// Highest sequence seen per `gameId`. Owned by a single partition runner.
#[derive(Debug, Default)]
pub struct SequenceTracker {
    last_seen: HashMap<CompactString, u64>,
}

impl SequenceTracker {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn observe(&mut self, game_id: &CompactString, sequence: Option<u64>) -> SequenceCheck {
        let Some(got) = sequence else {
            return SequenceCheck::Unsequenced;
        };
        match self.last_seen.get_mut(game_id) {
            None => {
                self.last_seen.insert(game_id.clone(), got);
                SequenceCheck::InOrder
            }
            Some(last) if got == *last => SequenceCheck::Duplicate { sequence: got },
            Some(last) if got < *last => SequenceCheck::Regression { last: *last, got },
            Some(last) => {
                let expected = *last + 1;
                *last = got;
                if got == expected {
                    SequenceCheck::InOrder
                } else {
                    SequenceCheck::Gap { expected, got }
                }
            }
        }
    }

    pub fn games(&self) -> usize {
        self.last_seen.len()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn detects_gaps_and_regressions_per_game() {
        let mut tracker = SequenceTracker::new();
        let g1: CompactString = "g1".into();
        let g2: CompactString = "g2".into();

        assert_eq!(tracker.observe(&g1, Some(1)), SequenceCheck::InOrder);
        assert_eq!(tracker.observe(&g1, Some(2)), SequenceCheck::InOrder);
        assert_eq!(
            tracker.observe(&g1, Some(5)),
            SequenceCheck::Gap { expected: 3, got: 5 }
        );
        assert_eq!(
            tracker.observe(&g1, Some(4)),
            SequenceCheck::Regression { last: 5, got: 4 }
        );
        // Regressions do not move the high-water mark.
        assert_eq!(tracker.observe(&g1, Some(6)), SequenceCheck::InOrder);

        assert_eq!(tracker.observe(&g2, Some(100)), SequenceCheck::InOrder);
        assert_eq!(tracker.observe(&g2, None), SequenceCheck::Unsequenced);
        assert_eq!(tracker.games(), 2);
    }

    #[test]
    fn duplicates_are_not_anomalies() {
        let mut tracker = SequenceTracker::new();
        let g: CompactString = "g".into();
        tracker.observe(&g, Some(7));

        let check = tracker.observe(&g, Some(7));
        assert_eq!(check, SequenceCheck::Duplicate { sequence: 7 });
        assert!(!check.is_anomaly());
        assert_eq!(tracker.observe(&g, Some(8)), SequenceCheck::InOrder);
    }
}
