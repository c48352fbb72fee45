//! Simulated environments for IMRL experiments
//!
//! This crate provides the testbeds the option-learning agent is evaluated on:
//! - Discrete and continuous gridworlds
//! - A combination lock with sequential subgoals
//! - A chemistry lab whose legal states form corridors between subgoals
//!
//! Environments are also reachable by name through the [`registry`].

#![warn(missing_docs)]
#![warn(clippy::all)]
#![warn(clippy::pedantic)]
#![allow(clippy::module_name_repetitions)]

pub mod chemistry_lab;
pub mod combination_lock;
pub mod continuous;
pub mod gridworld;
pub mod registry;

use rand::rngs::StdRng;
use rand::SeedableRng;
use rand_distr::Normal;

use imrl_core::{ImrlError, Result};

// Re-export environments
pub use chemistry_lab::{ChemistryLab, ChemistryLabConfig};
pub use combination_lock::{CombinationLock, CombinationLockConfig};
pub use continuous::{ContinuousGridworld, ContinuousGridworldConfig};
pub use gridworld::{GridAction, Gridworld, GridworldConfig};
pub use registry::{list_envs, make_env, register_env, EnvRegistry};

// Re-export core types
pub use imrl_core::{Environment, EnvironmentConfig, State, Subgoal};

/// Prelude module for convenient imports
pub mod prelude {
    pub use crate::{
        list_envs, make_env, ChemistryLab, CombinationLock, ContinuousGridworld, Gridworld,
    };
    pub use imrl_core::prelude::*;
}

/// Environment RNG: reproducible when seeded, from entropy otherwise
pub(crate) fn seeded_rng(seed: Option<u64>) -> StdRng {
    match seed {
        Some(seed) => StdRng::seed_from_u64(seed),
        None => StdRng::from_entropy(),
    }
}

/// Gaussian distribution, rejecting invalid parameters as configuration errors
pub(crate) fn normal(mean: f64, sd: f64) -> Result<Normal<f64>> {
    Normal::new(mean, sd)
        .map_err(|e| ImrlError::InvalidConfig(format!("normal({mean}, {sd}): {e}")))
}

/// Fail with [`ImrlError::InvalidConfig`] unless `p` is a probability
pub(crate) fn check_probability(name: &str, p: f64) -> Result<()> {
    if (0.0..=1.0).contains(&p) {
        Ok(())
    } else {
        Err(ImrlError::InvalidConfig(format!("{name} must be in [0, 1], got {p}")))
    }
}
