//! Continuous gridworld on the unit square

use rand::rngs::StdRng;
use rand_distr::{Distribution, Normal};
use serde::{Deserialize, Serialize};

use imrl_core::{
    subgoal::DEFAULT_RADIUS, Environment, EnvironmentConfig, FeatureSpace, FeatureVector,
    ImrlError, Result, State, Subgoal,
};

use crate::gridworld::GridAction;
use crate::{normal, seeded_rng};

/// Spread of the start position around the origin
const START_SD: f64 = 0.01;

/// Continuous gridworld parameters
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ContinuousGridworldConfig {
    /// Mean distance moved along the chosen axis
    pub move_mean: f64,
    /// Standard deviation of the move and of the sideways drift
    pub move_sd: f64,
    /// Center of the rewarding region
    pub reward_center: [f64; 2],
    /// Radius of the rewarding region
    pub reward_radius: f64,
    /// Points registered as subgoals
    pub subgoals: Vec<[f64; 2]>,
    /// Membership radius of the subgoals
    pub subgoal_radius: f64,
}

impl Default for ContinuousGridworldConfig {
    fn default() -> Self {
        Self {
            move_mean: 0.1,
            move_sd: 0.01,
            reward_center: [0.95, 0.95],
            reward_radius: 0.02,
            subgoals: Vec::new(),
            subgoal_radius: DEFAULT_RADIUS,
        }
    }
}

/// Point agent on `[0, 1]^2` moving with Gaussian noise.
pub struct ContinuousGridworld {
    config: ContinuousGridworldConfig,
    step: Normal<f64>,
    drift: Normal<f64>,
    start: Normal<f64>,
    rng: StdRng,
}

impl ContinuousGridworld {
    /// Create a continuous gridworld from generic environment configuration
    pub fn new(config: EnvironmentConfig) -> Result<Self> {
        Self::with_config(config.params_as()?, config.seed)
    }

    /// Create a continuous gridworld from its own parameters
    pub fn with_config(config: ContinuousGridworldConfig, seed: Option<u64>) -> Result<Self> {
        if config.reward_radius <= 0.0 {
            return Err(ImrlError::InvalidConfig("reward_radius must be positive".into()));
        }
        Ok(Self {
            step: normal(config.move_mean, config.move_sd)?,
            drift: normal(0.0, config.move_sd)?,
            start: normal(0.0, START_SD)?,
            config,
            rng: seeded_rng(seed),
        })
    }

    /// Parameters
    #[must_use]
    pub fn config(&self) -> &ContinuousGridworldConfig {
        &self.config
    }

    fn point(state: &State) -> Result<(f64, f64)> {
        match state.point() {
            Some(&[x, y]) => Ok((x, y)),
            _ => Err(ImrlError::InvalidState(format!(
                "{state} is not a point in the plane"
            ))),
        }
    }
}

impl Environment for ContinuousGridworld {
    fn name(&self) -> &str {
        "gridworld_continuous"
    }

    fn num_actions(&self) -> usize {
        GridAction::ALL.len()
    }

    fn initial_state(&mut self) -> State {
        let x = self.start.sample(&mut self.rng).max(0.0);
        let y = self.start.sample(&mut self.rng).max(0.0);
        State::Continuous(vec![x, y])
    }

    fn next_state(&mut self, state: &State, action: usize) -> Result<State> {
        let (x, y) = Self::point(state)?;
        let action = GridAction::try_from(action)?;
        if self.is_terminal(state) {
            return Ok(self.initial_state());
        }

        let step = self.step.sample(&mut self.rng);
        let drift = self.drift.sample(&mut self.rng);
        let (x, y) = match action {
            GridAction::Up => (x + drift, y + step),
            GridAction::Down => (x + drift, y - step),
            GridAction::Left => (x - step, y + drift),
            GridAction::Right => (x + step, y + drift),
        };
        Ok(State::Continuous(vec![x.clamp(0.0, 1.0), y.clamp(0.0, 1.0)]))
    }

    fn is_terminal(&self, state: &State) -> bool {
        let center = State::Continuous(self.config.reward_center.to_vec());
        state
            .distance(&center)
            .is_some_and(|d| d < self.config.reward_radius)
    }

    fn reward(&self, state: &State) -> f64 {
        if self.is_terminal(state) {
            1.0
        } else {
            0.0
        }
    }

    fn reward_vector(&self, features: &dyn FeatureSpace) -> Result<FeatureVector> {
        features.evaluate(&State::Continuous(self.config.reward_center.to_vec()))
    }

    fn create_subgoals(&self) -> Vec<Subgoal> {
        self.config
            .subgoals
            .iter()
            .map(|p| Subgoal::with_radius(p.to_vec(), self.config.subgoal_radius))
            .collect()
    }
}
