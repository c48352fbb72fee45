//! Combination lock: a chain of tumblers set by one exact action sequence

use rand::rngs::StdRng;
use rand::Rng;
use serde::{Deserialize, Serialize};

use imrl_core::{
    Environment, EnvironmentConfig, FeatureSpace, FeatureVector, ImrlError, Initiation, Result,
    State, Subgoal,
};

use crate::{check_probability, seeded_rng};

/// Combination lock parameters
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct CombinationLockConfig {
    /// Number of tumblers
    pub n_tumblers: usize,
    /// Correct actions needed to set one tumbler
    pub tumbler_length: usize,
    /// Size of the action set
    pub num_actions: usize,
    /// Probability that an action has no effect
    pub failure_rate: f64,
    /// Correct action sequence, `n_tumblers * tumbler_length` long.
    /// Defaults to setting tumbler `i` with action `i`.
    pub solution: Option<Vec<usize>>,
}

impl Default for CombinationLockConfig {
    fn default() -> Self {
        Self {
            n_tumblers: 3,
            tumbler_length: 1,
            num_actions: 6,
            failure_rate: 0.0,
            solution: None,
        }
    }
}

/// Lock whose state counts the correct actions taken so far.
///
/// States run from `0` to `n_tumblers * tumbler_length`. The correct action
/// advances the lock by one, any other action resets it to `0`, and the fully
/// open state is terminal.
pub struct CombinationLock {
    config: CombinationLockConfig,
    solution: Vec<usize>,
    rng: StdRng,
}

impl CombinationLock {
    /// Create a lock from generic environment configuration
    pub fn new(config: EnvironmentConfig) -> Result<Self> {
        Self::with_config(config.params_as()?, config.seed)
    }

    /// Create a lock from its own parameters
    pub fn with_config(config: CombinationLockConfig, seed: Option<u64>) -> Result<Self> {
        if config.n_tumblers == 0 || config.tumbler_length == 0 || config.num_actions == 0 {
            return Err(ImrlError::InvalidConfig(
                "combination lock needs tumblers, tumbler length and actions".into(),
            ));
        }
        check_probability("failure_rate", config.failure_rate)?;

        let length = config.n_tumblers * config.tumbler_length;
        let solution = match &config.solution {
            Some(solution) => solution.clone(),
            None => (0..length)
                .map(|k| (k / config.tumbler_length).min(config.num_actions - 1))
                .collect(),
        };
        if solution.len() != length {
            return Err(ImrlError::InvalidConfig(format!(
                "solution has {} actions, lock needs {length}",
                solution.len()
            )));
        }
        if let Some(a) = solution.iter().find(|&&a| a >= config.num_actions) {
            return Err(ImrlError::InvalidConfig(format!(
                "solution uses action {a} of {}",
                config.num_actions
            )));
        }

        Ok(Self {
            config,
            solution,
            rng: seeded_rng(seed),
        })
    }

    /// The correct action sequence
    #[must_use]
    pub fn solution(&self) -> &[usize] {
        &self.solution
    }

    /// The actions that set the lock to `state` from `0`
    pub fn actions_to(&self, state: &State) -> Result<&[usize]> {
        let i = self.index(state)?;
        Ok(&self.solution[..i])
    }

    fn open(&self) -> usize {
        self.solution.len()
    }

    fn index(&self, state: &State) -> Result<usize> {
        match state.index() {
            Some(i) if i <= self.open() => Ok(i),
            _ => Err(ImrlError::InvalidState(format!(
                "{state} is not a state of a lock with {} positions",
                self.open()
            ))),
        }
    }
}

impl Environment for CombinationLock {
    fn name(&self) -> &str {
        "combination_lock"
    }

    fn num_actions(&self) -> usize {
        self.config.num_actions
    }

    fn num_states(&self) -> Option<usize> {
        Some(self.open() + 1)
    }

    fn initial_state(&mut self) -> State {
        State::Discrete(0)
    }

    fn next_state(&mut self, state: &State, action: usize) -> Result<State> {
        let i = self.index(state)?;
        if action >= self.config.num_actions {
            return Err(ImrlError::InvalidAction(format!(
                "lock has no action {action}"
            )));
        }
        if i == self.open() {
            return Ok(self.initial_state());
        }
        if self.rng.gen::<f64>() < self.config.failure_rate {
            return Ok(state.clone());
        }
        if self.solution[i] == action {
            Ok(State::Discrete(i + 1))
        } else {
            Ok(self.initial_state())
        }
    }

    fn is_terminal(&self, state: &State) -> bool {
        state.index() == Some(self.open())
    }

    fn reward(&self, state: &State) -> f64 {
        if self.is_terminal(state) {
            1.0
        } else {
            0.0
        }
    }

    fn reward_vector(&self, features: &dyn FeatureSpace) -> Result<FeatureVector> {
        features.evaluate(&State::Discrete(self.open()))
    }

    /// One subgoal at the end of every tumbler
    fn create_subgoals(&self) -> Vec<Subgoal> {
        (1..=self.config.n_tumblers)
            .map(|t| Subgoal::new(t * self.config.tumbler_length))
            .collect()
    }

    fn initiation(&self) -> Initiation {
        Initiation::Precedes
    }
}
