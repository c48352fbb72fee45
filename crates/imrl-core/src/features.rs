//! Feature spaces: linear function approximators mapping states to feature vectors

use ndarray::Array1;
use serde::{Deserialize, Serialize};

use crate::{ImrlError, Result, State};

/// Fixed-length column of feature activations for a single state.
pub type FeatureVector = Array1<f64>;

/// A function approximator evaluating states into feature vectors.
///
/// Evaluation is a pure function of the state; any randomness (such as kernel
/// placement) belongs to construction.
pub trait FeatureSpace: Send + Sync {
    /// Length `F` of every feature vector this space produces
    fn num_features(&self) -> usize;

    /// Evaluate the feature vector for `state`
    fn evaluate(&self, state: &State) -> Result<FeatureVector>;
}

/// A vector of zeros except for a one at `position`.
#[must_use]
pub fn one_hot(len: usize, position: usize) -> FeatureVector {
    let mut fv = Array1::zeros(len);
    if position < len {
        fv[position] = 1.0;
    }
    fv
}

/// Index of the largest feature, first one on ties. `None` for an empty vector.
#[must_use]
pub fn argmax(fv: &FeatureVector) -> Option<usize> {
    fv.iter()
        .enumerate()
        .fold(None, |best: Option<(usize, f64)>, (i, &x)| match best {
            Some((_, v)) if v >= x => best,
            _ => Some((i, x)),
        })
        .map(|(i, _)| i)
}

/// Exact one-to-one representation of a discrete state space.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TabularFeatures {
    /// Number of discrete states
    pub num_states: usize,
}

impl TabularFeatures {
    /// Create a tabular feature space over `num_states` states
    #[must_use]
    pub fn new(num_states: usize) -> Self {
        Self { num_states }
    }
}

impl FeatureSpace for TabularFeatures {
    fn num_features(&self) -> usize {
        self.num_states
    }

    fn evaluate(&self, state: &State) -> Result<FeatureVector> {
        match state {
            State::Discrete(i) if *i < self.num_states => Ok(one_hot(self.num_states, *i)),
            State::Discrete(i) => Err(ImrlError::InvalidState(format!(
                "state {i} is outside a tabular space of {} states",
                self.num_states
            ))),
            State::Continuous(_) => Err(ImrlError::InvalidState(format!(
                "tabular features require a discrete state, got {state}"
            ))),
        }
    }
}

/// Gaussian radial basis functions on an evenly spaced grid.
///
/// `resolution^dim` kernels are placed on the Cartesian product of
/// `resolution` evenly spaced points in `[min, max]` along each dimension.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RbfFeatures {
    dim: usize,
    resolution: usize,
    min: f64,
    max: f64,
    eps: f64,
    centers: Vec<Vec<f64>>,
}

impl RbfFeatures {
    /// Create an RBF feature space; `eps` is the kernel width coefficient.
    pub fn new(dim: usize, resolution: usize, min: f64, max: f64, eps: f64) -> Result<Self> {
        if dim == 0 || resolution == 0 {
            return Err(ImrlError::InvalidConfig(
                "RBF features need a positive dimension and resolution".into(),
            ));
        }
        if min >= max {
            return Err(ImrlError::InvalidConfig(format!(
                "RBF range [{min}, {max}] is empty"
            )));
        }

        let axis: Vec<f64> = if resolution == 1 {
            vec![min]
        } else {
            (0..resolution)
                .map(|i| min + (max - min) * i as f64 / (resolution - 1) as f64)
                .collect()
        };

        // Cartesian product, last dimension varying fastest
        let mut centers: Vec<Vec<f64>> = vec![Vec::with_capacity(dim)];
        for _ in 0..dim {
            centers = centers
                .into_iter()
                .flat_map(|prefix| {
                    axis.iter().map(move |&x| {
                        let mut c = prefix.clone();
                        c.push(x);
                        c
                    })
                })
                .collect();
        }

        Ok(Self {
            dim,
            resolution,
            min,
            max,
            eps,
            centers,
        })
    }

    /// Unit-square RBF features with the default width used by the experiments
    pub fn unit(dim: usize, resolution: usize) -> Result<Self> {
        Self::new(dim, resolution, 0.0, 1.0, 8.0)
    }

    /// Kernel centers in evaluation order
    #[must_use]
    pub fn centers(&self) -> &[Vec<f64>] {
        &self.centers
    }

    /// Number of kernels along one dimension
    #[must_use]
    pub fn resolution(&self) -> usize {
        self.resolution
    }

    fn kernel(&self, center: &[f64], x: &[f64]) -> f64 {
        let sq: f64 = center.iter().zip(x).map(|(c, v)| (c - v).powi(2)).sum();
        (-self.eps * sq).exp()
    }
}

impl FeatureSpace for RbfFeatures {
    fn num_features(&self) -> usize {
        self.centers.len()
    }

    fn evaluate(&self, state: &State) -> Result<FeatureVector> {
        let x = state.point().ok_or_else(|| {
            ImrlError::InvalidState(format!("RBF features require a continuous state, got {state}"))
        })?;
        if x.len() != self.dim {
            return Err(ImrlError::DimensionMismatch {
                expected: self.dim,
                actual: x.len(),
            });
        }
        if let Some(v) = x.iter().find(|v| !(self.min..=self.max).contains(*v)) {
            return Err(ImrlError::InvalidState(format!(
                "coordinate {v} outside [{}, {}]",
                self.min, self.max
            )));
        }

        Ok(self.centers.iter().map(|c| self.kernel(c, x)).collect())
    }
}
