//! Environment states

use serde::{Deserialize, Serialize};
use std::fmt;

/// A state of a simulated environment.
///
/// Discrete domains (gridworld, combination lock) number their states from
/// zero; continuous domains (continuous gridworld, chemistry lab) use a point
/// in the unit hypercube.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum State {
    /// Index of a discrete state
    Discrete(usize),
    /// Point in a continuous state space
    Continuous(Vec<f64>),
}

impl State {
    /// Index of a discrete state, `None` for continuous states
    #[must_use]
    pub fn index(&self) -> Option<usize> {
        match self {
            Self::Discrete(i) => Some(*i),
            Self::Continuous(_) => None,
        }
    }

    /// Coordinates of a continuous state, `None` for discrete states
    #[must_use]
    pub fn point(&self) -> Option<&[f64]> {
        match self {
            Self::Discrete(_) => None,
            Self::Continuous(p) => Some(p),
        }
    }

    /// Euclidean distance between two continuous states of equal dimension.
    ///
    /// Returns `None` when either state is discrete or the dimensions differ.
    #[must_use]
    pub fn distance(&self, other: &Self) -> Option<f64> {
        match (self, other) {
            (Self::Continuous(a), Self::Continuous(b)) if a.len() == b.len() => Some(
                a.iter()
                    .zip(b)
                    .map(|(x, y)| (x - y).powi(2))
                    .sum::<f64>()
                    .sqrt(),
            ),
            _ => None,
        }
    }
}

impl fmt::Display for State {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Discrete(i) => write!(f, "{i}"),
            Self::Continuous(p) => {
                write!(f, "(")?;
                for (i, x) in p.iter().enumerate() {
                    if i > 0 {
                        write!(f, ", ")?;
                    }
                    write!(f, "{x:.3}")?;
                }
                write!(f, ")")
            }
        }
    }
}

impl From<usize> for State {
    fn from(index: usize) -> Self {
        Self::Discrete(index)
    }
}

impl From<Vec<f64>> for State {
    fn from(point: Vec<f64>) -> Self {
        Self::Continuous(point)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_abs_diff_eq;

    #[test]
    fn distance_is_euclidean() {
        let a = State::Continuous(vec![0.0, 0.0]);
        let b = State::Continuous(vec![0.3, 0.4]);
        assert_abs_diff_eq!(a.distance(&b).unwrap(), 0.5, epsilon = 1e-12);
    }

    #[test]
    fn distance_undefined_across_kinds() {
        let a = State::Discrete(1);
        let b = State::Continuous(vec![1.0]);
        assert!(a.distance(&b).is_none());
        assert!(State::Continuous(vec![0.0]).distance(&State::Continuous(vec![0.0, 1.0])).is_none());
    }

    #[test]
    fn display() {
        assert_eq!(State::Discrete(7).to_string(), "7");
        assert_eq!(State::Continuous(vec![0.5, 0.25]).to_string(), "(0.500, 0.250)");
    }
}
