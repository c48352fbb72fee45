//! Universal option models
//!
//! A UOM is a pair of linear predictors over a feature space of size `F`:
//! `M` maps the features of a start state to the discounted expected features
//! at termination, and `U` maps them to the expected discounted feature
//! occupancy while the option runs. The expected return of an option under any
//! linear reward `r` is then `r . (U fv)` without re-simulating it.

use ndarray::{Array2, Axis};
use serde::{Deserialize, Serialize};

use imrl_core::{ensure_dim, FeatureVector, Result};

/// Learned transition (`M`) and return (`U`) model of one option.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Uom {
    m: Array2<f64>,
    u: Array2<f64>,
    /// Learning rate
    pub eta: f64,
    /// Discount factor
    pub gamma: f64,
    /// Largest elementwise change made by the latest `update_m`
    last_m_change: Option<f64>,
}

/// `target += scale * outer(delta, fv)` without allocating the outer product.
fn add_outer(target: &mut Array2<f64>, scale: f64, delta: &FeatureVector, fv: &FeatureVector) -> f64 {
    let mut largest = 0.0f64;
    for (mut row, &d) in target.axis_iter_mut(Axis(0)).zip(delta) {
        let coefficient = scale * d;
        if coefficient == 0.0 {
            continue;
        }
        for (cell, &x) in row.iter_mut().zip(fv) {
            let change = coefficient * x;
            *cell += change;
            largest = largest.max(change.abs());
        }
    }
    largest
}

impl Uom {
    /// Zero-initialized model over `num_features` features
    #[must_use]
    pub fn new(num_features: usize, eta: f64, gamma: f64) -> Self {
        Self {
            m: Array2::zeros((num_features, num_features)),
            u: Array2::zeros((num_features, num_features)),
            eta,
            gamma,
            last_m_change: None,
        }
    }

    /// Feature space size `F`
    #[must_use]
    pub fn num_features(&self) -> usize {
        self.m.nrows()
    }

    /// Transition model `M`
    #[must_use]
    pub fn m(&self) -> &Array2<f64> {
        &self.m
    }

    /// Return model `U`
    #[must_use]
    pub fn u(&self) -> &Array2<f64> {
        &self.u
    }

    /// Predicted (discounted) features at termination: `M fv`
    pub fn predict_next(&self, fv: &FeatureVector) -> Result<FeatureVector> {
        ensure_dim(self.num_features(), fv.len())?;
        Ok(self.m.dot(fv))
    }

    /// Predicted discounted occupancy: `U fv`
    pub fn predict_occupancy(&self, fv: &FeatureVector) -> Result<FeatureVector> {
        ensure_dim(self.num_features(), fv.len())?;
        Ok(self.u.dot(fv))
    }

    /// `M += eta * (gamma^tau * fv' - M fv) fv^T`
    ///
    /// `tau` is the number of primitive steps the option ran for.
    pub fn update_m(
        &mut self,
        fv: &FeatureVector,
        fv_prime: &FeatureVector,
        tau: u32,
    ) -> Result<&Array2<f64>> {
        ensure_dim(self.num_features(), fv.len())?;
        ensure_dim(fv.len(), fv_prime.len())?;

        let discount = self.gamma.powi(i32::try_from(tau).unwrap_or(i32::MAX));
        let delta = fv_prime * discount - self.m.dot(fv);
        let change = add_outer(&mut self.m, self.eta, &delta, fv);
        self.last_m_change = Some(change);
        Ok(&self.m)
    }

    /// `U += eta * (fv + gamma * U fv' - U fv) fv^T`
    ///
    /// `fv_prime` is `None` when the option terminated on this transition, in
    /// which case the successor term is zero.
    pub fn update_u(
        &mut self,
        fv: &FeatureVector,
        fv_prime: Option<&FeatureVector>,
    ) -> Result<&Array2<f64>> {
        ensure_dim(self.num_features(), fv.len())?;

        let mut delta = fv - &self.u.dot(fv);
        if let Some(next) = fv_prime {
            ensure_dim(fv.len(), next.len())?;
            delta.scaled_add(self.gamma, &self.u.dot(next));
        }
        add_outer(&mut self.u, self.eta, &delta, fv);
        Ok(&self.u)
    }

    /// Whether the latest `M` update changed every entry by less than `epsilon`.
    ///
    /// Informational only: learning is continual and never stops on this.
    #[must_use]
    pub fn converged(&self, epsilon: f64) -> bool {
        self.last_m_change.is_some_and(|c| c < epsilon)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_abs_diff_eq;
    use imrl_core::{one_hot, ImrlError};
    use proptest::prelude::*;

    #[test]
    fn starts_at_zero() {
        let uom = Uom::new(9, 0.1, 0.99);
        assert_eq!(uom.m().dim(), (9, 9));
        assert_eq!(uom.u().dim(), (9, 9));
        assert!(uom.m().iter().all(|&x| x == 0.0));
        assert!(uom.u().iter().all(|&x| x == 0.0));
        assert!(!uom.converged(1.0));
    }

    #[test]
    fn m_update_is_local_to_active_feature() {
        let mut uom = Uom::new(9, 0.1, 0.99);
        let m = uom.update_m(&one_hot(9, 0), &one_hot(9, 2), 1).unwrap().clone();
        for ((i, j), &x) in m.indexed_iter() {
            if (i, j) == (2, 0) {
                assert_abs_diff_eq!(x, 0.1 * 0.99, epsilon = 1e-15);
            } else {
                assert_eq!(x, 0.0);
            }
        }
    }

    #[test]
    fn m_update_discounts_by_duration() {
        let mut uom = Uom::new(4, 1.0, 0.5);
        uom.update_m(&one_hot(4, 0), &one_hot(4, 3), 3).unwrap();
        assert_abs_diff_eq!(uom.m()[[3, 0]], 0.125, epsilon = 1e-15);
    }

    #[test]
    fn terminal_u_update_sets_diagonal() {
        let mut uom = Uom::new(9, 0.1, 0.99);
        let u = uom.update_u(&one_hot(9, 4), None).unwrap();
        for ((i, j), &x) in u.indexed_iter() {
            if i == 4 && j == 4 {
                assert_abs_diff_eq!(x, 0.1, epsilon = 1e-15);
            } else {
                assert_eq!(x, 0.0);
            }
        }
    }

    #[test]
    fn non_terminal_u_update_bootstraps() {
        let mut uom = Uom::new(3, 0.5, 0.9);
        uom.update_u(&one_hot(3, 1), None).unwrap();
        // U[1,1] = 0.5; now a transition 0 -> 1
        uom.update_u(&one_hot(3, 0), Some(&one_hot(3, 1))).unwrap();
        assert_abs_diff_eq!(uom.u()[[0, 0]], 0.5, epsilon = 1e-15);
        assert_abs_diff_eq!(uom.u()[[1, 0]], 0.5 * 0.9 * 0.5, epsilon = 1e-15);
    }

    #[test]
    fn converged_tracks_last_change() {
        let mut uom = Uom::new(2, 1.0, 1.0);
        uom.update_m(&one_hot(2, 0), &one_hot(2, 1), 1).unwrap();
        assert!(!uom.converged(0.5));
        uom.update_m(&one_hot(2, 0), &one_hot(2, 1), 1).unwrap();
        assert!(uom.converged(1e-9));
    }

    #[test]
    fn shape_mismatch_fails() {
        let mut uom = Uom::new(4, 0.1, 0.9);
        assert!(matches!(
            uom.update_m(&one_hot(4, 0), &one_hot(5, 0), 1),
            Err(ImrlError::DimensionMismatch { expected: 4, actual: 5 })
        ));
        assert!(uom.update_u(&one_hot(3, 0), None).is_err());
        assert!(uom.update_u(&one_hot(4, 0), Some(&one_hot(2, 0))).is_err());
        assert!(uom.predict_next(&one_hot(2, 0)).is_err());
    }

    proptest! {
        #[test]
        fn repeated_deterministic_updates_converge(
            eta in 0.05f64..1.0,
            gamma in 0.1f64..1.0,
            from in 0usize..6,
            to in 0usize..6,
        ) {
            let mut uom = Uom::new(6, eta, gamma);
            for _ in 0..2000 {
                uom.update_m(&one_hot(6, from), &one_hot(6, to), 1).unwrap();
            }
            prop_assert!((uom.m()[[to, from]] - gamma).abs() < 1e-6);
            prop_assert_eq!(uom.m().row(to).sum(), uom.m()[[to, from]]);
        }
    }
}
