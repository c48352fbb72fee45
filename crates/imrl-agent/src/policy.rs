//! Choice policies deciding which action or option to run next

use rand::Rng;
use serde::{Deserialize, Serialize};

use imrl_core::{FeatureVector, ImrlError, Result, State};

use crate::option::OptionId;
use crate::value_iteration::{PlannerId, Planners, PlanningContext};

/// How an agent or option picks its next choice.
///
/// Choices are option ids; ids below the number of primitive actions are the
/// primitive actions themselves.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum ChoicePolicy {
    /// Always the same choice
    Fixed(OptionId),
    /// Uniformly random primitive action
    Random {
        /// Number of primitive actions to choose from
        num_actions: usize,
    },
    /// Greedy with respect to a value-iteration planner
    ValueIteration(PlannerId),
}

impl ChoicePolicy {
    /// Choose from a state, evaluating its features first.
    pub fn choose_action<R: Rng + ?Sized>(
        &self,
        state: &State,
        planners: &Planners,
        ctx: &PlanningContext<'_>,
        rng: &mut R,
    ) -> Result<OptionId> {
        let fv = ctx.features.evaluate(state)?;
        self.choose_action_from_fv(&fv, planners, ctx, &[], rng)
    }

    /// Choose from features `fv`.
    ///
    /// `exclude` lists options that may not be chosen, typically the options
    /// already executing on the caller's option stack.
    pub fn choose_action_from_fv<R: Rng + ?Sized>(
        &self,
        fv: &FeatureVector,
        planners: &Planners,
        ctx: &PlanningContext<'_>,
        exclude: &[OptionId],
        rng: &mut R,
    ) -> Result<OptionId> {
        match *self {
            Self::Fixed(choice) => Ok(choice),
            Self::Random { num_actions } => {
                if num_actions == 0 {
                    return Err(ImrlError::InvalidConfig(
                        "random policy over zero actions".into(),
                    ));
                }
                Ok(rng.gen_range(0..num_actions))
            }
            Self::ValueIteration(id) => {
                let planner = match id {
                    PlannerId::Main => planners.main(),
                    PlannerId::Option(o) => planners.get(id).ok_or(ImrlError::UnknownOption(o))?,
                };
                planner.get_max_action(fv, ctx, exclude, rng)
            }
        }
    }
}
