use std::sync::Arc;

use criterion::{black_box, criterion_group, criterion_main, Criterion};

use imrl_agent::{Agent, AgentConfig};
use imrl_core::{Environment, EnvironmentConfig, FeatureSpace, RbfFeatures, TabularFeatures};
use imrl_env::Gridworld;

fn explored_agent(mut env: Gridworld, features: Arc<dyn FeatureSpace>, steps: usize) -> Agent {
    let mut agent = Agent::for_environment(
        AgentConfig {
            seed: Some(0),
            ..AgentConfig::default()
        },
        features,
        &env,
    )
    .expect("agent");
    let mut state = env.initial_state();
    for _ in 0..steps {
        let action = agent.choose_action(&state).expect("action");
        let next = env.next_state(&state, action).expect("transition");
        agent.update(&state, action, &next).expect("update");
        state = next;
    }
    agent
}

fn bench_planning(c: &mut Criterion) {
    let env = Gridworld::new(EnvironmentConfig::seeded(0).with_param("size", 10)).expect("env");
    let mut agent = explored_agent(env, Arc::new(TabularFeatures::new(100)), 5000);
    c.bench_function("plan gridworld 10x10", |b| {
        b.iter(|| agent.plan().expect("plan"));
    });

    let env = Gridworld::new(
        EnvironmentConfig::seeded(0)
            .with_param("size", 5)
            .with_param("subgoals", vec![vec![2, 2], vec![4, 0]]),
    )
    .expect("env");
    let mut agent = explored_agent(env, Arc::new(TabularFeatures::new(25)), 2000);
    c.bench_function("plan gridworld 5x5 with options", |b| {
        b.iter(|| agent.plan().expect("plan"));
    });
}

fn bench_features(c: &mut Criterion) {
    let rbf = RbfFeatures::unit(2, 10).expect("features");
    let state = imrl_core::State::Continuous(vec![0.37, 0.81]);
    c.bench_function("rbf evaluate 100 kernels", |b| {
        b.iter(|| rbf.evaluate(black_box(&state)).expect("evaluate"));
    });
}

criterion_group!(benches, bench_planning, bench_features);
criterion_main!(benches);
