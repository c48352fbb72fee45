//! Environment trait and configuration

use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};

use crate::{FeatureSpace, FeatureVector, Initiation, Result, State, Subgoal};

/// Configuration for environments
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct EnvironmentConfig {
    /// Random seed
    pub seed: Option<u64>,
    /// Environment-specific parameters
    #[serde(flatten)]
    pub params: serde_json::Map<String, serde_json::Value>,
}

impl EnvironmentConfig {
    /// Configuration with a fixed seed and no parameters
    #[must_use]
    pub fn seeded(seed: u64) -> Self {
        Self {
            seed: Some(seed),
            params: serde_json::Map::new(),
        }
    }

    /// Set one parameter, builder style
    #[must_use]
    pub fn with_param(mut self, key: &str, value: impl Into<serde_json::Value>) -> Self {
        self.params.insert(key.to_string(), value.into());
        self
    }

    /// Deserialize the parameter map into an environment's own config type.
    ///
    /// Missing keys fall back to that type's serde defaults.
    pub fn params_as<T: DeserializeOwned>(&self) -> Result<T> {
        Ok(serde_json::from_value(serde_json::Value::Object(
            self.params.clone(),
        ))?)
    }
}

/// State-transition interface of a simulated environment.
///
/// Transitions may be stochastic; environments own their random number
/// generator so that seeded runs are reproducible.
pub trait Environment: Send {
    /// Human-readable name
    fn name(&self) -> &str;

    /// Number of primitive actions
    fn num_actions(&self) -> usize;

    /// Number of discrete states, `None` for continuous environments
    fn num_states(&self) -> Option<usize> {
        None
    }

    /// State at the start of an episode
    fn initial_state(&mut self) -> State;

    /// Apply `action` in `state` and return the next state
    fn next_state(&mut self, state: &State, action: usize) -> Result<State>;

    /// Whether `state` ends an episode
    fn is_terminal(&self, state: &State) -> bool;

    /// Scalar reward for entering `state`
    fn reward(&self, state: &State) -> f64;

    /// Extrinsic reward expressed linearly in `features`
    fn reward_vector(&self, features: &dyn FeatureSpace) -> Result<FeatureVector>;

    /// Regions whose first visit should create an option
    fn create_subgoals(&self) -> Vec<Subgoal> {
        Vec::new()
    }

    /// Initiation rule for the options created from this environment's subgoals
    fn initiation(&self) -> Initiation {
        Initiation::Always
    }
}
