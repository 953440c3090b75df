use log::{debug, info};
use strum::IntoEnumIterator;

use crate::models::PriorityConfig;

mod candidate;
mod rule;
mod session;

pub use {
    candidate::{
        Candidate, Level, Marker, NO_DETAIL_CATEGORY, OcrText, annotate_markers, build_candidates,
        remove_overlapping,
    },
    rule::{
        PriorityRule, find_by_lcs, is_category_match, lcs_length, normalize_category, parse_rules,
    },
    session::{Choice, ChoiceSession},
};

/// Picks candidates in layered priority passes.
///
/// Primary candidates are considered before secondary ones. Within each group the passes are, in
/// order: newly available by level, same archetype as equipped, priority list 1, priority list 2
/// and finally every remaining candidate when allowed.
#[derive(Clone, Debug, Default)]
pub struct PrioritySelector {
    config: PriorityConfig,
    /// Rules derived at runtime that rank before the configured list 1.
    dynamic: Vec<String>,
}

impl PrioritySelector {
    pub fn new(config: PriorityConfig) -> Self {
        Self {
            config,
            dynamic: vec![],
        }
    }

    pub fn set_dynamic_priority(&mut self, rules: Vec<String>) {
        debug!(target: "selection", "dynamic priority updated to {rules:?}");
        self.dynamic = rules;
    }

    /// Selects up to `count` candidates.
    ///
    /// Overlapping candidates are removed first. A candidate is never selected twice and
    /// candidates that are not selectable are never selected.
    pub fn select(&self, candidates: &[Candidate], count: usize) -> Vec<Candidate> {
        let candidates = remove_overlapping(candidates.to_vec(), self.config.overlap_distance);
        let rule_lists = [
            self.dynamic
                .iter()
                .chain(self.config.priority_1.iter())
                .filter_map(|rule| PriorityRule::parse(rule))
                .collect::<Vec<_>>(),
            self.config
                .priority_2
                .iter()
                .filter_map(|rule| PriorityRule::parse(rule))
                .collect::<Vec<_>>(),
        ];
        let consider_rest = self.config.consider_not_in_priority;
        info!(
            target: "selection",
            "selecting {count} of {} new={} rest={consider_rest}",
            candidates.len(),
            self.config.consider_new
        );

        let mut picked = Vec::<usize>::new();
        for primary in [true, false] {
            let group = candidates
                .iter()
                .enumerate()
                .filter(|(_, candidate)| candidate.primary == primary && candidate.selectable)
                .collect::<Vec<_>>();
            let mut pick = |predicate: &dyn Fn(&Candidate) -> bool| {
                for (index, candidate) in group.iter() {
                    if !picked.contains(index) && predicate(*candidate) {
                        picked.push(*index);
                    }
                }
            };

            if self.config.consider_new {
                for level in Level::iter() {
                    pick(&|candidate| candidate.new && candidate.level == level);
                }
            }
            pick(&|candidate| candidate.same_archetype);
            for rule in rule_lists.iter().flatten() {
                pick(&|candidate| rule.matches(candidate));
            }
            if consider_rest {
                pick(&|_| true);
            }
        }

        let selected = picked
            .into_iter()
            .take(count)
            .map(|index| candidates[index].clone())
            .collect::<Vec<_>>();
        info!(
            target: "selection",
            "selected {:?}",
            selected.iter().map(Candidate::display_name).collect::<Vec<_>>()
        );

        selected
    }
}

/// Selects up to `count` candidates with the rules in `config` alone.
pub fn select_by_priority(
    candidates: &[Candidate],
    count: usize,
    config: &PriorityConfig,
) -> Vec<Candidate> {
    PrioritySelector::new(config.clone()).select(candidates, count)
}
