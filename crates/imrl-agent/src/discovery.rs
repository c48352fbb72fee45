//! Subgoal registry: which subgoals exist and which already have an option

use indexmap::IndexMap;

use imrl_core::{State, Subgoal};

use crate::option::OptionId;

/// Registered subgoals and the options materialized for the reached ones.
#[derive(Debug, Clone, Default)]
pub struct SubgoalRegistry {
    subgoals: Vec<Subgoal>,
    reached: IndexMap<usize, OptionId>,
}

impl SubgoalRegistry {
    /// Registry over `subgoals`, none reached yet
    #[must_use]
    pub fn new(subgoals: Vec<Subgoal>) -> Self {
        Self {
            subgoals,
            reached: IndexMap::new(),
        }
    }

    /// All registered subgoals
    #[must_use]
    pub fn subgoals(&self) -> &[Subgoal] {
        &self.subgoals
    }

    /// Subgoal by registry index
    #[must_use]
    pub fn get(&self, index: usize) -> Option<&Subgoal> {
        self.subgoals.get(index)
    }

    /// Indices of subgoals containing `state` that have not been reached before
    #[must_use]
    pub fn newly_reached(&self, state: &State) -> Vec<usize> {
        self.subgoals
            .iter()
            .enumerate()
            .filter(|(i, g)| !self.reached.contains_key(i) && g.contains(state))
            .map(|(i, _)| i)
            .collect()
    }

    /// Record that subgoal `index` is served by `option`.
    ///
    /// Returns `false`, leaving the first binding in place, when the subgoal
    /// was already reached.
    pub fn mark_reached(&mut self, index: usize, option: OptionId) -> bool {
        if self.reached.contains_key(&index) {
            return false;
        }
        self.reached.insert(index, option);
        true
    }

    /// Option created for subgoal `index`
    #[must_use]
    pub fn option_for(&self, index: usize) -> Option<OptionId> {
        self.reached.get(&index).copied()
    }

    /// `(subgoal index, option)` pairs in the order they were reached
    pub fn reached(&self) -> impl Iterator<Item = (usize, OptionId)> + '_ {
        self.reached.iter().map(|(&i, &o)| (i, o))
    }
}
