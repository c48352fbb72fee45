//! Core types for hierarchical, intrinsically motivated reinforcement learning
//!
//! This crate provides the vocabulary shared by the option-learning engine
//! and the simulated environments: states, feature spaces, subgoals and the
//! environment interface.

#![warn(missing_docs)]
#![warn(clippy::all)]
#![allow(clippy::module_name_repetitions)]

pub mod environment;
pub mod error;
pub mod features;
pub mod state;
pub mod subgoal;

// Re-export core traits and types
pub use environment::{Environment, EnvironmentConfig};
pub use error::{ensure_dim, ImrlError, Result};
pub use features::{argmax, one_hot, FeatureSpace, FeatureVector, RbfFeatures, TabularFeatures};
pub use state::State;
pub use subgoal::{Initiation, Subgoal, SubgoalGraph, SubgoalNode};

/// Prelude module for convenient imports
pub mod prelude {
    pub use crate::{
        Environment, EnvironmentConfig, FeatureSpace, FeatureVector, ImrlError, Initiation,
        Result, State, Subgoal,
    };
}
