//! Options: temporally-extended actions with a learned model

use std::fmt;
use std::sync::Arc;

use imrl_core::{
    argmax, ensure_dim, FeatureSpace, FeatureVector, Initiation, Result, State, Subgoal,
};

use crate::policy::ChoicePolicy;
use crate::samples::SampleSet;
use crate::uom::Uom;

/// Dense index of an option. Primitive actions occupy `0..num_actions`.
pub type OptionId = usize;

/// What an option is bound to.
#[derive(Debug, Clone)]
pub enum OptionKind {
    /// Runs a single primitive action and terminates
    Primitive,
    /// Runs until its subgoal region is reached
    Subgoal {
        /// The bound subgoal
        subgoal: Subgoal,
        /// Features of the subgoal's state
        subgoal_fv: FeatureVector,
        /// Where the option may start
        initiation: Initiation,
    },
}

/// An option: a choice policy, a universal option model and a termination test.
pub struct Opt {
    id: OptionId,
    kind: OptionKind,
    policy: ChoicePolicy,
    uom: Uom,
    features: Arc<dyn FeatureSpace>,
}

impl Opt {
    /// The option executing primitive action `id`
    pub fn primitive(id: OptionId, features: Arc<dyn FeatureSpace>, eta: f64, gamma: f64) -> Self {
        Self {
            id,
            kind: OptionKind::Primitive,
            policy: ChoicePolicy::Fixed(id),
            uom: Uom::new(features.num_features(), eta, gamma),
            features,
        }
    }

    /// An option reaching `subgoal`, with a fresh model
    pub fn with_subgoal(
        id: OptionId,
        features: Arc<dyn FeatureSpace>,
        subgoal: Subgoal,
        initiation: Initiation,
        policy: ChoicePolicy,
        eta: f64,
        gamma: f64,
    ) -> Result<Self> {
        let subgoal_fv = features.evaluate(&subgoal.state)?;
        Ok(Self {
            id,
            kind: OptionKind::Subgoal {
                subgoal,
                subgoal_fv,
                initiation,
            },
            policy,
            uom: Uom::new(features.num_features(), eta, gamma),
            features,
        })
    }

    /// Option id
    #[must_use]
    pub fn id(&self) -> OptionId {
        self.id
    }

    /// Whether this option is a single primitive action
    #[must_use]
    pub fn is_primitive(&self) -> bool {
        matches!(self.kind, OptionKind::Primitive)
    }

    /// Binding of this option
    #[must_use]
    pub fn kind(&self) -> &OptionKind {
        &self.kind
    }

    /// Bound subgoal, `None` for primitives
    #[must_use]
    pub fn subgoal(&self) -> Option<&Subgoal> {
        match &self.kind {
            OptionKind::Primitive => None,
            OptionKind::Subgoal { subgoal, .. } => Some(subgoal),
        }
    }

    /// Features of the bound subgoal, `None` for primitives
    #[must_use]
    pub fn subgoal_fv(&self) -> Option<&FeatureVector> {
        match &self.kind {
            OptionKind::Primitive => None,
            OptionKind::Subgoal { subgoal_fv, .. } => Some(subgoal_fv),
        }
    }

    /// Internal choice policy
    #[must_use]
    pub fn policy(&self) -> &ChoicePolicy {
        &self.policy
    }

    /// Learned model
    #[must_use]
    pub fn uom(&self) -> &Uom {
        &self.uom
    }

    /// Expected discounted features at termination: `M fv`
    pub fn get_next_fv(&self, fv: &FeatureVector) -> Result<FeatureVector> {
        self.uom.predict_next(fv)
    }

    /// Expected discounted return from `fv` under linear reward `r`: `r . (U fv)`
    pub fn get_return(&self, r: &FeatureVector, fv: &FeatureVector) -> Result<f64> {
        ensure_dim(self.uom.num_features(), r.len())?;
        Ok(r.dot(&self.uom.predict_occupancy(fv)?))
    }

    /// Primitives terminate after one step; subgoal options inside their region.
    #[must_use]
    pub fn is_terminal_in_state(&self, state: &State) -> bool {
        match &self.kind {
            OptionKind::Primitive => true,
            OptionKind::Subgoal { subgoal, .. } => subgoal.contains(state),
        }
    }

    /// Feature-space termination used for model rollouts: the features peak
    /// where the subgoal's features peak.
    #[must_use]
    pub fn is_terminal_in_fv(&self, fv: &FeatureVector) -> bool {
        match &self.kind {
            OptionKind::Primitive => true,
            OptionKind::Subgoal { subgoal_fv, .. } => {
                argmax(fv).is_some() && argmax(fv) == argmax(subgoal_fv)
            }
        }
    }

    /// Whether the option may start in `state`.
    ///
    /// A subgoal option never starts where it would already terminate.
    pub fn can_init_from_state(&self, state: &State) -> Result<bool> {
        if self.is_primitive() {
            return Ok(true);
        }
        if self.is_terminal_in_state(state) {
            return Ok(false);
        }
        Ok(self.can_init_from_fv(&self.features.evaluate(state)?))
    }

    /// Whether the option may start from features `fv`
    #[must_use]
    pub fn can_init_from_fv(&self, fv: &FeatureVector) -> bool {
        match &self.kind {
            OptionKind::Primitive => true,
            OptionKind::Subgoal {
                subgoal,
                subgoal_fv,
                initiation,
            } => !self.is_terminal_in_fv(fv) && initiation.permits(subgoal, subgoal_fv, fv),
        }
    }

    /// The sampled states this option can start from
    pub fn get_init_set(&self, samples: &SampleSet) -> Result<Vec<State>> {
        let mut init = Vec::new();
        for state in samples.iter() {
            if self.can_init_from_state(state)? {
                init.push(state.clone());
            }
        }
        Ok(init)
    }

    /// Credit a completed execution of `tau` primitive steps to `M`
    pub fn update_m(&mut self, fv: &FeatureVector, fv_prime: &FeatureVector, tau: u32) -> Result<()> {
        self.uom.update_m(fv, fv_prime, tau).map(|_| ())
    }

    /// Credit one step of occupancy to `U`; `None` successor on termination
    pub fn update_u(&mut self, fv: &FeatureVector, fv_prime: Option<&FeatureVector>) -> Result<()> {
        self.uom.update_u(fv, fv_prime).map(|_| ())
    }
}

impl fmt::Debug for Opt {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Opt")
            .field("id", &self.id)
            .field("kind", &self.kind)
            .field("policy", &self.policy)
            .finish_non_exhaustive()
    }
}
