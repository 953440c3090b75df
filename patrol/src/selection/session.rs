use log::info;

use super::{Candidate, PrioritySelector};
use crate::geometry::Point;

/// Clicks closer than this on both axes to an earlier click hit the same card.
const CLICK_DEDUP_DISTANCE: i32 = 40;

/// The outcome of one selection round.
#[derive(Clone, PartialEq, Debug, Default)]
pub struct Choice {
    pub picks: Vec<Candidate>,
    /// Screen points to click, one per pick not clicked before.
    pub clicks: Vec<Point>,
}

/// Tracks a choice screen that asks for `target` picks across several rounds.
///
/// Candidates passed in each round include the already chosen ones. These count toward the
/// target and are never picked again.
#[derive(Clone, Debug)]
pub struct ChoiceSession {
    target: usize,
    clicked: Vec<Point>,
}

impl ChoiceSession {
    pub fn new(target: usize) -> Self {
        Self {
            target,
            clicked: vec![],
        }
    }

    /// Number of picks still open given the `candidates` currently on screen.
    pub fn remaining(&self, candidates: &[Candidate]) -> usize {
        let chosen = candidates
            .iter()
            .filter(|candidate| candidate.chosen)
            .count();
        self.target.saturating_sub(chosen)
    }

    #[inline]
    pub fn is_complete(&self, candidates: &[Candidate]) -> bool {
        self.remaining(candidates) == 0
    }

    /// Picks candidates for the open slots and the points to click for them.
    pub fn choose(&mut self, selector: &PrioritySelector, candidates: &[Candidate]) -> Choice {
        let remaining = self.remaining(candidates);
        if remaining == 0 {
            return Choice::default();
        }

        let picks = selector.select(candidates, remaining);
        let mut clicks = Vec::with_capacity(picks.len());
        for pick in picks.iter() {
            let center = pick.rect.center();
            let duplicated = self.clicked.iter().any(|clicked| {
                (clicked.x - center.x).abs() < CLICK_DEDUP_DISTANCE
                    && (clicked.y - center.y).abs() < CLICK_DEDUP_DISTANCE
            });
            if duplicated {
                continue;
            }
            self.clicked.push(center);
            clicks.push(center);
        }
        info!(
            target: "selection",
            "{remaining} of {} open, clicking {} new points",
            self.target,
            clicks.len()
        );

        Choice { picks, clicks }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{geometry::Rect, models::PriorityConfig};

    fn candidate(text: &str, x: i32, y: i32) -> Candidate {
        Candidate::from_ocr(text, Rect::new(x - 50, y - 10, 100, 20)).unwrap()
    }

    fn selector() -> PrioritySelector {
        PrioritySelector::new(PriorityConfig {
            consider_not_in_priority: true,
            ..PriorityConfig::default()
        })
    }

    #[test]
    fn remaining_counts_chosen_candidates() {
        let session = ChoiceSession::new(2);
        let mut chosen = candidate("[通用]一", 200, 500);
        chosen.chosen = true;
        chosen.selectable = false;
        let candidates = vec![chosen.clone(), candidate("[通用]二", 600, 500)];

        assert_eq!(session.remaining(&candidates), 1);
        assert!(!session.is_complete(&candidates));
        assert!(session.is_complete(&[chosen.clone(), chosen]));
    }

    #[test]
    fn choose_fills_open_slots_only() {
        let mut session = ChoiceSession::new(2);
        let selector = selector();
        let mut chosen = candidate("[通用]一", 200, 500);
        chosen.chosen = true;
        chosen.selectable = false;
        let candidates = vec![
            chosen,
            candidate("[通用]二", 600, 500),
            candidate("[通用]三", 1000, 500),
        ];

        let choice = session.choose(&selector, &candidates);

        assert_eq!(choice.picks.len(), 1);
        assert_eq!(choice.picks[0].name, "二");
        assert_eq!(choice.clicks, vec![Point::new(600, 500)]);
    }

    #[test]
    fn choose_does_not_click_same_card_twice() {
        let mut session = ChoiceSession::new(1);
        let selector = selector();

        let first = session.choose(&selector, &[candidate("[通用]一", 600, 500)]);
        let second = session.choose(&selector, &[candidate("[通用]一", 620, 510)]);

        assert_eq!(first.clicks, vec![Point::new(600, 500)]);
        assert_eq!(second.picks.len(), 1);
        assert!(second.clicks.is_empty());
    }

    #[test]
    fn choose_complete_session_picks_nothing() {
        let mut session = ChoiceSession::new(1);
        let selector = selector();
        let mut chosen = candidate("[通用]一", 600, 500);
        chosen.chosen = true;

        assert_eq!(session.choose(&selector, &[chosen]), Choice::default());
    }
}
