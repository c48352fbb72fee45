//! Chemistry lab: controllable parameters that must follow corridors between subgoals
//!
//! The lab has two parameters. The first (think temperature) can be raised or
//! lowered, the second (think the amount of an added reagent) can only be
//! raised. Legal settings form a graph of axis-aligned corridors between
//! subgoals; leaving every corridor ruins the experiment and restarts it.

use rand::rngs::StdRng;
use rand_distr::{Distribution, Normal};
use serde::{Deserialize, Serialize};

use imrl_core::{
    subgoal::within_corridor, Environment, EnvironmentConfig, FeatureSpace, FeatureVector,
    ImrlError, Result, State, Subgoal, SubgoalGraph,
};

use crate::{normal, seeded_rng};

/// Number of controllable parameters
const PARAMS: usize = 2;

/// Nominal start point; the first parameter starts at 0.5, the rest near zero
const START: [f64; PARAMS] = [0.5, 0.0];

/// Node whose neighbourhood is rewarding
const GOAL_NODE: usize = 8;

/// Chemistry lab parameters
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ChemistryLabConfig {
    /// Mean change of the chosen parameter
    pub move_mean: f64,
    /// Standard deviation of the change and of the drift of other parameters
    pub move_sd: f64,
    /// Subgoal radius, also half the width of every corridor
    pub reward_radius: f64,
}

impl Default for ChemistryLabConfig {
    fn default() -> Self {
        Self {
            move_mean: 0.05,
            move_sd: 0.01,
            reward_radius: 0.1,
        }
    }
}

/// Two-parameter lab with a fixed nine-node corridor graph.
pub struct ChemistryLab {
    config: ChemistryLabConfig,
    graph: SubgoalGraph,
    start: Subgoal,
    step: Normal<f64>,
    drift: Normal<f64>,
    rng: StdRng,
}

impl ChemistryLab {
    /// Create a lab from generic environment configuration
    pub fn new(config: EnvironmentConfig) -> Result<Self> {
        Self::with_config(config.params_as()?, config.seed)
    }

    /// Create a lab from its own parameters
    pub fn with_config(config: ChemistryLabConfig, seed: Option<u64>) -> Result<Self> {
        if config.reward_radius <= 0.0 {
            return Err(ImrlError::InvalidConfig("reward_radius must be positive".into()));
        }
        Ok(Self {
            graph: Self::subgoal_graph(config.reward_radius),
            start: Subgoal::with_radius(START.to_vec(), config.reward_radius),
            step: normal(config.move_mean, config.move_sd)?,
            drift: normal(0.0, config.move_sd)?,
            config,
            rng: seeded_rng(seed),
        })
    }

    /// The lab's corridor graph, rooted at `(0.5, 0.25)`:
    ///
    /// ```text
    ///   g(.25,.75) - h(.5,.75) - i(.75,.75)
    ///                  |
    ///   d(.25,.5)  - e(.5,.5)    f(.75,.5)
    ///   |                        |
    ///   b(.25,.25) - a(.5,.25) - c(.75,.25)
    /// ```
    #[must_use]
    pub fn subgoal_graph(radius: f64) -> SubgoalGraph {
        let mut graph = SubgoalGraph::new();
        let mut node = |x: f64, y: f64| graph.add(Subgoal::with_radius(vec![x, y], radius));
        let a = node(0.5, 0.25);
        let b = node(0.25, 0.25);
        let c = node(0.75, 0.25);
        let d = node(0.25, 0.5);
        let e = node(0.5, 0.5);
        let f = node(0.75, 0.5);
        let g = node(0.25, 0.75);
        let h = node(0.5, 0.75);
        let i = node(0.75, 0.75);
        for (from, to) in [(a, b), (a, c), (b, d), (c, f), (d, e), (e, h), (h, g), (h, i)] {
            graph.connect(from, to);
        }
        graph.set_root(a);
        graph
    }

    /// Parameters
    #[must_use]
    pub fn config(&self) -> &ChemistryLabConfig {
        &self.config
    }

    /// The corridor graph
    #[must_use]
    pub fn graph(&self) -> &SubgoalGraph {
        &self.graph
    }

    fn goal(&self) -> Option<&Subgoal> {
        self.graph.nodes().get(GOAL_NODE).map(|n| &n.subgoal)
    }

    fn params(state: &State) -> Result<&[f64]> {
        match state.point() {
            Some(p) if p.len() == PARAMS => Ok(p),
            _ => Err(ImrlError::InvalidState(format!(
                "{state} is not a setting of {PARAMS} lab parameters"
            ))),
        }
    }
}

impl Environment for ChemistryLab {
    fn name(&self) -> &str {
        "chemistry_lab"
    }

    /// Raise the first parameter, raise the second, lower the first
    fn num_actions(&self) -> usize {
        PARAMS + 1
    }

    fn initial_state(&mut self) -> State {
        let mut params = START.to_vec();
        for p in params.iter_mut().skip(1) {
            *p = self.drift.sample(&mut self.rng).max(0.0);
        }
        State::Continuous(params)
    }

    fn next_state(&mut self, state: &State, action: usize) -> Result<State> {
        let params = Self::params(state)?;
        if action >= self.num_actions() {
            return Err(ImrlError::InvalidAction(format!("lab has no action {action}")));
        }

        let mut next: Vec<f64> = params
            .iter()
            .map(|p| p + self.drift.sample(&mut self.rng))
            .collect();
        let amount = self.step.sample(&mut self.rng);
        match action {
            0 => next[0] = params[0] + amount,
            1 => next[1] = params[1] + amount,
            _ => next[0] = params[0] - amount,
        }
        for p in &mut next {
            *p = p.clamp(0.0, 1.0);
        }

        let next = State::Continuous(next);
        if self.is_terminal(&next) {
            Ok(self.initial_state())
        } else {
            Ok(next)
        }
    }

    /// A setting outside every corridor, including the one leading from the
    /// start to the root, is a failed experiment.
    fn is_terminal(&self, state: &State) -> bool {
        if self.graph.in_any_corridor(state) {
            return false;
        }
        match self.graph.root() {
            Some(root) => !within_corridor(state, &root.subgoal, &self.start),
            None => true,
        }
    }

    fn reward(&self, state: &State) -> f64 {
        match self.goal() {
            Some(goal) if goal.contains(state) => 1.0,
            _ => 0.0,
        }
    }

    fn reward_vector(&self, features: &dyn FeatureSpace) -> Result<FeatureVector> {
        let goal = self
            .goal()
            .ok_or_else(|| ImrlError::Environment("lab graph has no goal node".into()))?;
        features.evaluate(&goal.state)
    }

    fn create_subgoals(&self) -> Vec<Subgoal> {
        self.graph.subgoals()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use imrl_core::RbfFeatures;

    fn lab() -> ChemistryLab {
        ChemistryLab::with_config(ChemistryLabConfig::default(), Some(4)).unwrap()
    }

    fn at(x: f64, y: f64) -> State {
        State::Continuous(vec![x, y])
    }

    #[test]
    fn corridors_between_connected_subgoals() {
        let a = Subgoal::with_radius(vec![0.5, 0.25], 0.1);
        let b = Subgoal::with_radius(vec![0.25, 0.25], 0.1);
        let c = Subgoal::with_radius(vec![0.5, 0.75], 0.1);
        assert!(!within_corridor(&at(0.5, 0.5), &a, &b));
        assert!(within_corridor(&at(0.3, 0.25), &a, &b));
        assert!(within_corridor(&at(0.2, 0.25), &a, &b));
        assert!(!within_corridor(&at(0.145, 0.25), &a, &b));
        assert!(within_corridor(&at(0.6, 0.6), &a, &c));
    }

    #[test]
    fn parameters_from_environment_config() {
        let lab = ChemistryLab::new(
            EnvironmentConfig::seeded(1)
                .with_param("move_mean", 0.02)
                .with_param("reward_radius", 0.05),
        )
        .unwrap();
        assert_eq!(lab.config().move_mean, 0.02);
        assert_eq!(lab.config().move_sd, 0.01);
        assert_eq!(lab.config().reward_radius, 0.05);
        assert!(lab
            .graph()
            .nodes()
            .iter()
            .all(|n| n.subgoal.radius == 0.05));
        assert!(ChemistryLab::new(EnvironmentConfig::default().with_param("reward_radius", 0.0)).is_err());
    }

    #[test]
    fn graph_shape() {
        let lab = lab();
        let root = lab.graph().root().unwrap();
        assert_eq!(root.connections.len(), 2);
        assert_eq!(root.subgoal.state, at(0.5, 0.25));
        assert_eq!(lab.create_subgoals().len(), 9);
    }

    #[test]
    fn wrong_moves_are_terminal() {
        let mut lab = lab();
        let start = lab.initial_state();
        assert!(!lab.is_terminal(&start));
        assert!(!lab.is_terminal(&at(0.55, 0.45)));
        assert!(!lab.is_terminal(&at(0.25, 0.4)));
        assert!(lab.is_terminal(&at(0.0, 0.0)));
        assert!(lab.is_terminal(&at(0.25, 0.64)));
        assert!(lab.is_terminal(&at(1.0, 1.0)));
        assert!(!lab.is_terminal(&at(0.64, 0.75)));
        assert!(!lab.is_terminal(&at(0.64, 0.70)));
        assert!(!lab.is_terminal(&at(0.25, 0.70)));
        assert!(lab.is_terminal(&at(0.64, 0.5)));
    }

    #[test]
    fn moves_stay_in_corridors() {
        let mut lab = lab();
        let mut state = lab.initial_state();
        for t in 0..500 {
            state = lab.next_state(&state, t % 3).unwrap();
            assert!(!lab.is_terminal(&state), "{state}");
        }
        assert!(lab.next_state(&state, 3).is_err());
        assert!(lab.next_state(&State::Discrete(0), 0).is_err());
    }

    #[test]
    fn goal_node_rewards() {
        let lab = lab();
        assert_eq!(lab.reward(&at(0.75, 0.75)), 1.0);
        assert_eq!(lab.reward(&at(0.5, 0.25)), 0.0);
        let rv = lab.reward_vector(&RbfFeatures::unit(2, 5).unwrap()).unwrap();
        assert_eq!(rv.len(), 25);
    }
}
