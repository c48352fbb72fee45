//! Subgoals: target regions whose first visit creates a new option

use serde::{Deserialize, Serialize};
use std::fmt;
use std::sync::Arc;

use crate::features::{argmax, FeatureVector};
use crate::State;

/// Default membership radius for continuous subgoals
pub const DEFAULT_RADIUS: f64 = 0.1;

/// A target state (discrete) or ball around a point (continuous).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Subgoal {
    /// Target state or center of the target region
    pub state: State,
    /// Membership radius for continuous states, ignored for discrete ones
    pub radius: f64,
}

impl Subgoal {
    /// Create a subgoal with the default radius
    #[must_use]
    pub fn new(state: impl Into<State>) -> Self {
        Self::with_radius(state, DEFAULT_RADIUS)
    }

    /// Create a subgoal with an explicit radius
    #[must_use]
    pub fn with_radius(state: impl Into<State>, radius: f64) -> Self {
        Self {
            state: state.into(),
            radius,
        }
    }

    /// Exact match for discrete states, Euclidean ball for continuous states.
    #[must_use]
    pub fn contains(&self, state: &State) -> bool {
        match (&self.state, state) {
            (State::Discrete(g), State::Discrete(s)) => g == s,
            _ => self
                .state
                .distance(state)
                .is_some_and(|d| d <= self.radius),
        }
    }
}

/// Predicate deciding whether a subgoal option may start from a state.
///
/// The rule is domain specific, so environments pick the variant that fits
/// them and the agent binds it to every option it creates.
#[derive(Clone, Default)]
pub enum Initiation {
    /// Initiable everywhere
    #[default]
    Always,
    /// Initiable where the feature argmax comes strictly before the
    /// subgoal's feature argmax (sequential domains such as a combination lock)
    Precedes,
    /// Arbitrary predicate over the subgoal, its features and the candidate features
    Custom(Arc<dyn Fn(&Subgoal, &FeatureVector, &FeatureVector) -> bool + Send + Sync>),
}

impl Initiation {
    /// Whether an option bound to `subgoal` can start from features `fv`
    #[must_use]
    pub fn permits(&self, subgoal: &Subgoal, subgoal_fv: &FeatureVector, fv: &FeatureVector) -> bool {
        match self {
            Self::Always => true,
            Self::Precedes => match (argmax(fv), argmax(subgoal_fv)) {
                (Some(here), Some(goal)) => here < goal,
                _ => false,
            },
            Self::Custom(f) => f(subgoal, subgoal_fv, fv),
        }
    }
}

impl fmt::Debug for Initiation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Always => write!(f, "Always"),
            Self::Precedes => write!(f, "Precedes"),
            Self::Custom(_) => write!(f, "Custom(..)"),
        }
    }
}

/// A subgoal in a directed graph of legal corridors.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SubgoalNode {
    /// The region itself
    pub subgoal: Subgoal,
    /// Indices of the nodes this one connects to
    pub connections: Vec<usize>,
}

/// Arena of connected subgoals with a distinguished root.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct SubgoalGraph {
    nodes: Vec<SubgoalNode>,
    root: usize,
}

impl SubgoalGraph {
    /// Create an empty graph
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Add a node and return its index. The first node added is the root.
    pub fn add(&mut self, subgoal: Subgoal) -> usize {
        self.nodes.push(SubgoalNode {
            subgoal,
            connections: Vec::new(),
        });
        self.nodes.len() - 1
    }

    /// Add a directed corridor `from -> to`; unknown indices are ignored.
    pub fn connect(&mut self, from: usize, to: usize) {
        if to < self.nodes.len() {
            if let Some(node) = self.nodes.get_mut(from) {
                node.connections.push(to);
            }
        }
    }

    /// Make `index` the root
    pub fn set_root(&mut self, index: usize) {
        if index < self.nodes.len() {
            self.root = index;
        }
    }

    /// Root node, `None` for an empty graph
    #[must_use]
    pub fn root(&self) -> Option<&SubgoalNode> {
        self.nodes.get(self.root)
    }

    /// All nodes in insertion order
    #[must_use]
    pub fn nodes(&self) -> &[SubgoalNode] {
        &self.nodes
    }

    /// The subgoals of every node, in insertion order
    #[must_use]
    pub fn subgoals(&self) -> Vec<Subgoal> {
        self.nodes.iter().map(|n| n.subgoal.clone()).collect()
    }

    /// Whether `state` lies in any corridor reachable from the root.
    ///
    /// Nodes are visited breadth first; each node is expanded once even when
    /// the graph has converging corridors.
    #[must_use]
    pub fn in_any_corridor(&self, state: &State) -> bool {
        let mut visited = vec![false; self.nodes.len()];
        let mut queue = std::collections::VecDeque::new();
        if self.root().is_some() {
            queue.push_back(self.root);
        }
        while let Some(i) = queue.pop_front() {
            if std::mem::replace(&mut visited[i], true) {
                continue;
            }
            let node = &self.nodes[i];
            for &j in &node.connections {
                if within_corridor(state, &node.subgoal, &self.nodes[j].subgoal) {
                    return true;
                }
                queue.push_back(j);
            }
        }
        false
    }
}

/// Whether `state` lies in the axis-aligned box spanned by two subgoals,
/// widened by the first subgoal's radius.
#[must_use]
pub fn within_corridor(state: &State, a: &Subgoal, b: &Subgoal) -> bool {
    let (Some(x), Some(p), Some(q)) = (state.point(), a.state.point(), b.state.point()) else {
        return false;
    };
    if x.len() != p.len() || x.len() != q.len() {
        return false;
    }
    let margin = a.radius;
    x.iter().zip(p.iter().zip(q)).all(|(&v, (&lo, &hi))| {
        let (lo, hi) = if lo <= hi { (lo, hi) } else { (hi, lo) };
        v >= lo - margin && v <= hi + margin
    })
}
