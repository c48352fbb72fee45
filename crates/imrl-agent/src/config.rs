//! Agent, planner and experiment configuration

use serde::{Deserialize, Serialize};

use imrl_core::{ImrlError, Result};

/// Configuration for an option-learning agent
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct AgentConfig {
    /// UOM learning rate
    pub eta: f64,
    /// UOM discount factor
    pub gamma: f64,
    /// Value iteration step size
    pub alpha: f64,
    /// Value iteration discount factor
    pub planning_gamma: f64,
    /// Sweeps per main planner run
    pub planning_iterations: usize,
    /// Sweeps per option-local planner run
    pub option_planning_iterations: usize,
    /// Keep theta between planner runs instead of restarting from zero
    pub retain_theta: bool,
    /// Let the main planner back up over subgoal options as well as primitives
    pub use_options: bool,
    /// Let option-local planners choose other subgoal options
    pub nested_options: bool,
    /// Minimum distance between continuous samples
    pub sample_epsilon: f64,
    /// Maximum length of a model rollout
    pub rollout_horizon: usize,
    /// Maximum rollouts per option per planning call
    pub rollout_starts: usize,
    /// Reward the main planner for unpredicted subgoal visits
    pub intrinsic_reward: bool,
    /// Magnitude of the intrinsic reward
    pub intrinsic_scale: f64,
    /// Random seed; `None` seeds from entropy
    pub seed: Option<u64>,
}

impl Default for AgentConfig {
    fn default() -> Self {
        Self {
            eta: 0.1,
            gamma: 0.99,
            alpha: 0.1,
            planning_gamma: 0.99,
            planning_iterations: 10,
            option_planning_iterations: 10,
            retain_theta: true,
            use_options: true,
            nested_options: false,
            sample_epsilon: 0.05,
            rollout_horizon: 20,
            rollout_starts: 10,
            intrinsic_reward: false,
            intrinsic_scale: 1.0,
            seed: None,
        }
    }
}

/// Settings of a single value-iteration planner
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct PlannerConfig {
    /// Full sweeps per run
    pub iterations: usize,
    /// Step size
    pub alpha: f64,
    /// Discount factor
    pub gamma: f64,
    /// Keep theta between runs
    pub retain_theta: bool,
    /// Back up over subgoal options, not only primitives
    pub use_options: bool,
}

impl AgentConfig {
    /// Parse a JSON configuration; missing fields take their defaults.
    pub fn from_json(json: &str) -> Result<Self> {
        let config: Self = serde_json::from_str(json)?;
        config.validate()?;
        Ok(config)
    }

    /// Check parameter ranges
    pub fn validate(&self) -> Result<()> {
        let unit = |name: &str, v: f64| {
            if (0.0..=1.0).contains(&v) {
                Ok(())
            } else {
                Err(ImrlError::InvalidConfig(format!("{name} must be in [0, 1], got {v}")))
            }
        };
        unit("eta", self.eta)?;
        unit("gamma", self.gamma)?;
        unit("alpha", self.alpha)?;
        unit("planning_gamma", self.planning_gamma)?;
        if self.gamma == 0.0 {
            return Err(ImrlError::InvalidConfig("gamma must be positive".into()));
        }
        if self.sample_epsilon < 0.0 {
            return Err(ImrlError::InvalidConfig(format!(
                "sample_epsilon must be non-negative, got {}",
                self.sample_epsilon
            )));
        }
        Ok(())
    }

    /// Planner settings for the agent's main planner
    #[must_use]
    pub fn main_planner(&self) -> PlannerConfig {
        PlannerConfig {
            iterations: self.planning_iterations,
            alpha: self.alpha,
            gamma: self.planning_gamma,
            retain_theta: self.retain_theta,
            use_options: self.use_options,
        }
    }

    /// Planner settings for a subgoal option's own planner
    #[must_use]
    pub fn option_planner(&self) -> PlannerConfig {
        PlannerConfig {
            iterations: self.option_planning_iterations,
            use_options: self.nested_options,
            ..self.main_planner()
        }
    }
}

/// Configuration of the interval-based experiment loop
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ExperimentConfig {
    /// Steps between planning calls
    pub interval_length: usize,
    /// Total environment steps
    pub max_steps: usize,
    /// Leading intervals driven by the random policy
    pub explore_intervals: usize,
}

impl Default for ExperimentConfig {
    fn default() -> Self {
        Self {
            interval_length: 1000,
            max_steps: 10_000,
            explore_intervals: 1,
        }
    }
}

impl ExperimentConfig {
    /// Check parameter ranges
    pub fn validate(&self) -> Result<()> {
        if self.interval_length == 0 {
            return Err(ImrlError::InvalidConfig(
                "interval_length must be positive".into(),
            ));
        }
        Ok(())
    }
}
