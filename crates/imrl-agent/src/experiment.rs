//! Interval-based experiment loop
//!
//! An experiment alternates acting and planning: the agent interacts with the
//! environment for one interval of steps, then plans. The first intervals use
//! the random top-level policy to populate the sample set.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use tracing::info;
use uuid::Uuid;

use imrl_core::{Environment, Result};

use crate::agent::Agent;
use crate::config::ExperimentConfig;

/// What happened during one interval
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct IntervalStats {
    /// Interval number, from 0
    pub index: usize,
    /// Whether the random policy drove this interval
    pub explored: bool,
    /// Environment steps taken
    pub steps: usize,
    /// Terminal states entered
    pub terminal_visits: usize,
    /// Sum of scalar rewards of the states entered
    pub extrinsic_return: f64,
    /// Options known after planning, primitives included
    pub options: usize,
    /// Sampled states after the interval
    pub samples: usize,
    /// Norm of the main planner's value weights after planning
    pub theta_norm: f64,
}

/// Summary of a complete run
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ExperimentReport {
    /// Unique run identifier
    pub run_id: Uuid,
    /// Name of the environment
    pub environment: String,
    /// Wall-clock start
    pub started_at: DateTime<Utc>,
    /// Wall-clock end
    pub finished_at: DateTime<Utc>,
    /// Total environment steps
    pub total_steps: usize,
    /// Per-interval statistics
    pub intervals: Vec<IntervalStats>,
}

impl ExperimentReport {
    /// Pretty-printed JSON
    pub fn to_json(&self) -> Result<String> {
        Ok(serde_json::to_string_pretty(self)?)
    }

    /// Terminal visits summed over all intervals
    #[must_use]
    pub fn terminal_visits(&self) -> usize {
        self.intervals.iter().map(|i| i.terminal_visits).sum()
    }
}

/// Drives an agent through an environment.
#[derive(Debug, Clone, Default)]
pub struct Experiment {
    config: ExperimentConfig,
}

impl Experiment {
    /// Create an experiment, validating its configuration
    pub fn new(config: ExperimentConfig) -> Result<Self> {
        config.validate()?;
        Ok(Self { config })
    }

    /// Configuration
    #[must_use]
    pub fn config(&self) -> &ExperimentConfig {
        &self.config
    }

    /// Run until `max_steps` environment steps have been taken.
    ///
    /// Stops at the first error from the agent or the environment.
    pub fn run(&self, agent: &mut Agent, env: &mut dyn Environment) -> Result<ExperimentReport> {
        let run_id = Uuid::new_v4();
        let started_at = Utc::now();
        info!(%run_id, environment = env.name(), max_steps = self.config.max_steps, "experiment started");

        let mut state = env.initial_state();
        let mut intervals = Vec::new();
        let mut total_steps = 0;

        while total_steps < self.config.max_steps {
            let index = intervals.len();
            let explored = index < self.config.explore_intervals;
            if explored {
                agent.use_random_policy();
            } else {
                agent.use_value_iteration_policy();
            }

            let mut stats = IntervalStats {
                index,
                explored,
                ..IntervalStats::default()
            };
            let length = self
                .config
                .interval_length
                .min(self.config.max_steps - total_steps);
            for _ in 0..length {
                let action = agent.choose_action(&state)?;
                let next = env.next_state(&state, action)?;
                agent.update(&state, action, &next)?;
                stats.extrinsic_return += env.reward(&next);
                if env.is_terminal(&next) {
                    stats.terminal_visits += 1;
                }
                state = next;
            }
            stats.steps = length;
            total_steps += length;

            agent.plan()?;
            let theta = agent.planners().main().theta();
            stats.options = agent.options().len();
            stats.samples = agent.samples().len();
            stats.theta_norm = theta.dot(theta).sqrt();
            info!(
                interval = index,
                explored,
                terminal_visits = stats.terminal_visits,
                options = stats.options,
                samples = stats.samples,
                "interval finished"
            );
            intervals.push(stats);
        }

        Ok(ExperimentReport {
            run_id,
            environment: env.name().to_string(),
            started_at,
            finished_at: Utc::now(),
            total_steps,
            intervals,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::AgentConfig;
    use imrl_core::{EnvironmentConfig, TabularFeatures};
    use imrl_env::{CombinationLock, Gridworld};
    use std::sync::Arc;

    #[test]
    fn intervals_cover_max_steps() {
        let mut env = Gridworld::new(EnvironmentConfig::seeded(1).with_param("size", 3)).unwrap();
        let mut agent = Agent::for_environment(
            AgentConfig {
                seed: Some(1),
                ..AgentConfig::default()
            },
            Arc::new(TabularFeatures::new(9)),
            &env,
        )
        .unwrap();
        let experiment = Experiment::new(ExperimentConfig {
            interval_length: 40,
            max_steps: 100,
            explore_intervals: 2,
        })
        .unwrap();

        let report = experiment.run(&mut agent, &mut env).unwrap();
        let steps: Vec<_> = report.intervals.iter().map(|i| i.steps).collect();
        assert_eq!(steps, vec![40, 40, 20]);
        assert_eq!(report.total_steps, 100);
        assert!(report.intervals[1].explored);
        assert!(!report.intervals[2].explored);
        assert_eq!(agent.step(), 100);
        assert!(report.finished_at >= report.started_at);
        assert_eq!(report.environment, "gridworld");

        let json = report.to_json().unwrap();
        let parsed: ExperimentReport = serde_json::from_str(&json).unwrap();
        assert_eq!(parsed.run_id, report.run_id);
        assert_eq!(parsed.intervals, report.intervals);
    }

    #[test]
    fn lock_options_appear_during_the_run() {
        let mut env = CombinationLock::new(
            EnvironmentConfig::seeded(5)
                .with_param("n_tumblers", 2)
                .with_param("num_actions", 2),
        )
        .unwrap();
        let mut agent = Agent::for_environment(
            AgentConfig {
                seed: Some(5),
                ..AgentConfig::default()
            },
            Arc::new(TabularFeatures::new(3)),
            &env,
        )
        .unwrap();
        let experiment = Experiment::new(ExperimentConfig {
            interval_length: 200,
            max_steps: 400,
            explore_intervals: 1,
        })
        .unwrap();

        let report = experiment.run(&mut agent, &mut env).unwrap();
        assert_eq!(agent.options().len(), 4);
        assert_eq!(report.intervals[0].options, 4);
        assert!(report.terminal_visits() > 0);
    }

    #[test]
    fn zero_interval_length_rejected() {
        assert!(Experiment::new(ExperimentConfig {
            interval_length: 0,
            ..ExperimentConfig::default()
        })
        .is_err());
    }
}
