//! Discrete gridworld

use rand::rngs::StdRng;
use rand::Rng;
use serde::{Deserialize, Serialize};

use imrl_core::{
    Environment, EnvironmentConfig, FeatureSpace, FeatureVector, ImrlError, Result, State, Subgoal,
};

use crate::{check_probability, seeded_rng};

/// Moves available in the gridworlds
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum GridAction {
    /// `y + 1`
    Up = 0,
    /// `y - 1`
    Down = 1,
    /// `x - 1`
    Left = 2,
    /// `x + 1`
    Right = 3,
}

impl GridAction {
    /// All moves in action-index order
    pub const ALL: [Self; 4] = [Self::Up, Self::Down, Self::Left, Self::Right];
}

impl TryFrom<usize> for GridAction {
    type Error = ImrlError;

    fn try_from(action: usize) -> Result<Self> {
        Self::ALL
            .get(action)
            .copied()
            .ok_or_else(|| ImrlError::InvalidAction(format!("gridworld has no action {action}")))
    }
}

/// Gridworld parameters
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct GridworldConfig {
    /// Side length of the square grid
    pub size: usize,
    /// Probability that a move has no effect
    pub failure_rate: f64,
    /// Cells `(x, y)` registered as subgoals
    pub subgoals: Vec<(usize, usize)>,
}

impl Default for GridworldConfig {
    fn default() -> Self {
        Self {
            size: 5,
            failure_rate: 0.0,
            subgoals: Vec::new(),
        }
    }
}

/// Square grid of `size * size` cells, numbered `y * size + x`.
///
/// The agent starts at `(0, 0)`; the opposite corner is rewarding and
/// terminal, and any move from it restarts the episode.
pub struct Gridworld {
    config: GridworldConfig,
    rng: StdRng,
}

impl Gridworld {
    /// Create a gridworld from generic environment configuration
    pub fn new(config: EnvironmentConfig) -> Result<Self> {
        Self::with_config(config.params_as()?, config.seed)
    }

    /// Create a gridworld from its own parameters
    pub fn with_config(config: GridworldConfig, seed: Option<u64>) -> Result<Self> {
        if config.size == 0 {
            return Err(ImrlError::InvalidConfig("gridworld size must be positive".into()));
        }
        check_probability("failure_rate", config.failure_rate)?;
        if let Some(&(x, y)) = config
            .subgoals
            .iter()
            .find(|&&(x, y)| x >= config.size || y >= config.size)
        {
            return Err(ImrlError::InvalidConfig(format!(
                "subgoal ({x}, {y}) outside a {0}x{0} grid",
                config.size
            )));
        }
        Ok(Self {
            config,
            rng: seeded_rng(seed),
        })
    }

    /// Parameters
    #[must_use]
    pub fn config(&self) -> &GridworldConfig {
        &self.config
    }

    /// State of cell `(x, y)`
    #[must_use]
    pub fn state_at(&self, x: usize, y: usize) -> State {
        State::Discrete(y * self.config.size + x)
    }

    /// Cell `(x, y)` of `state`
    pub fn position(&self, state: &State) -> Result<(usize, usize)> {
        let size = self.config.size;
        match state.index() {
            Some(i) if i < size * size => Ok((i % size, i / size)),
            _ => Err(ImrlError::InvalidState(format!(
                "{state} is not a cell of a {size}x{size} grid"
            ))),
        }
    }

    /// The rewarding, terminal corner
    #[must_use]
    pub fn goal(&self) -> State {
        self.state_at(self.config.size - 1, self.config.size - 1)
    }
}

impl Environment for Gridworld {
    fn name(&self) -> &str {
        "gridworld"
    }

    fn num_actions(&self) -> usize {
        GridAction::ALL.len()
    }

    fn num_states(&self) -> Option<usize> {
        Some(self.config.size * self.config.size)
    }

    fn initial_state(&mut self) -> State {
        self.state_at(0, 0)
    }

    fn next_state(&mut self, state: &State, action: usize) -> Result<State> {
        let (x, y) = self.position(state)?;
        let action = GridAction::try_from(action)?;
        if self.is_terminal(state) {
            return Ok(self.initial_state());
        }
        if self.rng.gen::<f64>() < self.config.failure_rate {
            return Ok(state.clone());
        }

        let last = self.config.size - 1;
        let (x, y) = match action {
            GridAction::Up => (x, (y + 1).min(last)),
            GridAction::Down => (x, y.saturating_sub(1)),
            GridAction::Left => (x.saturating_sub(1), y),
            GridAction::Right => ((x + 1).min(last), y),
        };
        Ok(self.state_at(x, y))
    }

    fn is_terminal(&self, state: &State) -> bool {
        *state == self.goal()
    }

    fn reward(&self, state: &State) -> f64 {
        if self.is_terminal(state) {
            1.0
        } else {
            0.0
        }
    }

    fn reward_vector(&self, features: &dyn FeatureSpace) -> Result<FeatureVector> {
        features.evaluate(&self.goal())
    }

    fn create_subgoals(&self) -> Vec<Subgoal> {
        self.config
            .subgoals
            .iter()
            .map(|&(x, y)| Subgoal::new(self.state_at(x, y)))
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use imrl_core::TabularFeatures;

    fn grid(size: usize, failure_rate: f64) -> Gridworld {
        Gridworld::with_config(
            GridworldConfig {
                size,
                failure_rate,
                subgoals: vec![(1, 2)],
            },
            Some(3),
        )
        .unwrap()
    }

    #[test]
    fn deterministic_moves() {
        let mut env = grid(4, 0.0);
        let start = env.initial_state();
        assert_eq!(env.next_state(&start, 0).unwrap(), env.state_at(0, 1));
        assert_eq!(env.next_state(&start, 1).unwrap(), env.state_at(0, 0));
        assert_eq!(env.next_state(&start, 2).unwrap(), env.state_at(0, 0));
        assert_eq!(env.next_state(&start, 3).unwrap(), env.state_at(1, 0));
        assert!(env.next_state(&start, 4).is_err());
        assert!(env.next_state(&State::Discrete(16), 0).is_err());
    }

    #[test]
    fn failed_moves_stay_put() {
        let mut env = grid(4, 0.1);
        let start = env.initial_state();
        let trials = 10_000;
        let stayed = (0..trials)
            .filter(|_| env.next_state(&start, 0).unwrap() == start)
            .count();
        let ratio = stayed as f64 / f64::from(trials);
        assert!(ratio > 0.08 && ratio < 0.12, "ratio {ratio}");
        assert!((0..100).all(|_| env.next_state(&start, 2).unwrap() == start));
    }

    #[test]
    fn goal_is_terminal_and_restarts() {
        let mut env = grid(4, 0.0);
        assert!(!env.is_terminal(&env.state_at(0, 0)));
        let goal = env.state_at(3, 3);
        assert!(env.is_terminal(&goal));
        assert_eq!(env.reward(&goal), 1.0);
        assert_eq!(env.next_state(&goal, 1).unwrap(), env.initial_state());
    }

    #[test]
    fn reward_vector_and_subgoals() {
        let env = grid(3, 0.0);
        let rv = env.reward_vector(&TabularFeatures::new(9)).unwrap();
        assert_eq!(rv[8], 1.0);
        assert_eq!(rv.sum(), 1.0);
        assert_eq!(env.create_subgoals(), vec![Subgoal::new(7)]);
        assert_eq!(env.position(&State::Discrete(7)).unwrap(), (1, 2));
    }

    #[test]
    fn params_from_environment_config() {
        let env = Gridworld::new(EnvironmentConfig::seeded(1).with_param("size", 3)).unwrap();
        assert_eq!(env.num_states(), Some(9));
        assert!(Gridworld::new(EnvironmentConfig::default().with_param("size", 0)).is_err());
    }
}
