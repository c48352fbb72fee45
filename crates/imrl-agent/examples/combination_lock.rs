//! Example: an option-learning agent opening a combination lock
//!
//! Run with `RUST_LOG=info` to follow option creation and planning.

use std::sync::Arc;

use imrl_agent::prelude::*;
use imrl_core::TabularFeatures;
use imrl_env::make_env;
use tracing_subscriber::EnvFilter;

fn main() -> anyhow::Result<()> {
    // Initialize logging
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::from_default_env())
        .init();

    // Four tumblers of two actions each, three actions to choose from
    let env_config = EnvironmentConfig::seeded(42)
        .with_param("n_tumblers", 4)
        .with_param("tumbler_length", 2)
        .with_param("num_actions", 3)
        .with_param("failure_rate", 0.05);
    let mut env = make_env("combination_lock", env_config)?;
    let num_states = env
        .num_states()
        .ok_or_else(|| anyhow::anyhow!("combination lock is discrete"))?;

    let agent_config = AgentConfig::from_json(r#"{"seed": 42, "eta": 0.2, "alpha": 0.2}"#)?;
    let mut agent =
        Agent::for_environment(agent_config, Arc::new(TabularFeatures::new(num_states)), &*env)?;

    let experiment = Experiment::new(ExperimentConfig {
        interval_length: 500,
        max_steps: 5000,
        explore_intervals: 2,
    })?;
    let report = experiment.run(&mut agent, env.as_mut())?;

    println!("run {} on {}", report.run_id, report.environment);
    for interval in &report.intervals {
        println!(
            "interval {:>2} {:<8} opened {:>3} times, {} options",
            interval.index,
            if interval.explored { "explore" } else { "plan" },
            interval.terminal_visits,
            interval.options,
        );
    }
    println!("theta = {}", agent.planners().main().theta());
    Ok(())
}
