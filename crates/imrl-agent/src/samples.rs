//! The set of visited states that planning sweeps over

use std::collections::HashSet;

use imrl_core::State;

/// Growing set of visited states.
///
/// Discrete states are deduplicated exactly. A continuous state is kept only
/// when no continuous sample already lies within `epsilon` of it, so the set
/// stays sparse in dense regions of the state space.
#[derive(Debug, Clone, Default)]
pub struct SampleSet {
    epsilon: f64,
    states: Vec<State>,
    discrete: HashSet<usize>,
}

impl SampleSet {
    /// Empty sample set with continuous separation `epsilon`
    #[must_use]
    pub fn new(epsilon: f64) -> Self {
        Self {
            epsilon,
            states: Vec::new(),
            discrete: HashSet::new(),
        }
    }

    /// Add `state` unless an equivalent sample exists; returns whether it was added.
    pub fn insert(&mut self, state: &State) -> bool {
        let novel = match state {
            State::Discrete(i) => self.discrete.insert(*i),
            State::Continuous(_) => !self
                .states
                .iter()
                .any(|s| s.distance(state).is_some_and(|d| d < self.epsilon)),
        };
        if novel {
            self.states.push(state.clone());
        }
        novel
    }

    /// Samples in insertion order
    #[must_use]
    pub fn states(&self) -> &[State] {
        &self.states
    }

    /// Iterate samples in insertion order
    pub fn iter(&self) -> std::slice::Iter<'_, State> {
        self.states.iter()
    }

    /// Number of samples
    #[must_use]
    pub fn len(&self) -> usize {
        self.states.len()
    }

    /// Whether no state has been sampled yet
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.states.is_empty()
    }
}
