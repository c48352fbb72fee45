//! Option learning and planning for intrinsically motivated agents
//!
//! This crate provides the learning engine:
//! - Universal option models (UOMs) learned from experience
//! - Options bound to subgoals, created the first time a subgoal is reached
//! - Value iteration over primitive actions and options
//! - An agent executing options through an option stack
//! - An interval-based experiment driver

#![warn(missing_docs)]
#![warn(clippy::all)]
#![warn(clippy::pedantic)]
#![allow(clippy::module_name_repetitions)]

pub mod agent;
pub mod config;
pub mod discovery;
pub mod experiment;
pub mod option;
pub mod policy;
pub mod samples;
pub mod uom;
pub mod value_iteration;

// Re-export the engine
pub use agent::{Agent, StackFrame};
pub use config::{AgentConfig, ExperimentConfig, PlannerConfig};
pub use discovery::SubgoalRegistry;
pub use experiment::{Experiment, ExperimentReport, IntervalStats};
pub use option::{Opt, OptionId, OptionKind};
pub use policy::ChoicePolicy;
pub use samples::SampleSet;
pub use uom::Uom;
pub use value_iteration::{PlannerId, Planners, PlanningContext, RewardVectors, ValueIteration};

/// Prelude module for convenient imports
pub mod prelude {
    pub use crate::{
        Agent, AgentConfig, ChoicePolicy, Experiment, ExperimentConfig, Opt, OptionId, PlannerId,
        ValueIteration,
    };
    pub use imrl_core::prelude::*;
}
