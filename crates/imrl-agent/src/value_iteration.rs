//! Value iteration over primitive actions and options
//!
//! The planner keeps a linear value function `theta` over the feature space.
//! One backup at features `fv` computes, for every visible option `o`,
//!
//! ```text
//! value(o) = r_o . (U_o fv) + gamma * (M_o fv) . theta
//! ```
//!
//! and moves `theta` toward the best of them along `fv`. Because `U_o` and
//! `M_o` already fold an option's multi-step return and discounting, the same
//! backup covers primitives and variable-duration options alike.

use std::borrow::Cow;

use indexmap::IndexMap;
use rand::seq::SliceRandom;
use rand::Rng;
use serde::{Deserialize, Serialize};
use tracing::{debug, trace};

use imrl_core::{ensure_dim, FeatureSpace, FeatureVector, ImrlError, Result, State};

use crate::config::PlannerConfig;
use crate::option::{OptionId, Opt};
use crate::samples::SampleSet;

/// Which planner: the agent's main planner or a subgoal option's own.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum PlannerId {
    /// Plans the agent's top-level behaviour
    Main,
    /// Plans the internal policy of the given option
    Option(OptionId),
}

/// Linear reward used in backups.
#[derive(Debug, Clone)]
pub enum RewardVectors {
    /// One reward vector for every option
    Shared(FeatureVector),
    /// Reward vector per option id; options beyond the list earn nothing
    PerOption(Vec<FeatureVector>),
}

impl RewardVectors {
    /// Reward vector applying to `option`
    #[must_use]
    pub fn for_option(&self, option: OptionId) -> Option<&FeatureVector> {
        match self {
            Self::Shared(r) => Some(r),
            Self::PerOption(rs) => rs.get(option),
        }
    }
}

/// Read-only view of what a planner sweeps over.
#[derive(Clone, Copy)]
pub struct PlanningContext<'a> {
    /// Every option known to the agent, indexed by id
    pub options: &'a [Opt],
    /// States visited so far
    pub samples: &'a SampleSet,
    /// Feature space shared by all options
    pub features: &'a dyn FeatureSpace,
}

/// Value-iteration planner with a linear value function.
#[derive(Debug, Clone)]
pub struct ValueIteration {
    owner: PlannerId,
    reward: RewardVectors,
    config: PlannerConfig,
    theta: FeatureVector,
}

impl ValueIteration {
    /// Planner with a zero value function over `num_features` features
    pub fn new(
        owner: PlannerId,
        reward: RewardVectors,
        num_features: usize,
        config: PlannerConfig,
    ) -> Result<Self> {
        match &reward {
            RewardVectors::Shared(r) => ensure_dim(num_features, r.len())?,
            RewardVectors::PerOption(rs) => {
                for r in rs {
                    ensure_dim(num_features, r.len())?;
                }
            }
        }
        Ok(Self {
            owner,
            reward,
            config,
            theta: FeatureVector::zeros(num_features),
        })
    }

    /// Which planner this is
    #[must_use]
    pub fn owner(&self) -> PlannerId {
        self.owner
    }

    /// Current value function weights
    #[must_use]
    pub fn theta(&self) -> &FeatureVector {
        &self.theta
    }

    /// Reward representation
    #[must_use]
    pub fn reward(&self) -> &RewardVectors {
        &self.reward
    }

    /// Planner settings
    #[must_use]
    pub fn config(&self) -> &PlannerConfig {
        &self.config
    }

    /// Replace the reward vector of one option, growing a per-option list with
    /// zero vectors as needed. A shared reward is left untouched.
    pub fn set_option_reward(&mut self, option: OptionId, reward: FeatureVector) -> Result<()> {
        ensure_dim(self.theta.len(), reward.len())?;
        if let RewardVectors::PerOption(rs) = &mut self.reward {
            if rs.len() <= option {
                rs.resize(option + 1, FeatureVector::zeros(self.theta.len()));
            }
            rs[option] = reward;
        }
        Ok(())
    }

    /// Estimated value of features `fv`: `fv . theta`
    pub fn state_value(&self, fv: &FeatureVector) -> Result<f64> {
        ensure_dim(self.theta.len(), fv.len())?;
        Ok(fv.dot(&self.theta))
    }

    fn visible<'a>(&self, ctx: &PlanningContext<'a>) -> impl Iterator<Item = &'a Opt> + 'a {
        let owner = self.owner;
        let use_options = self.config.use_options;
        ctx.options.iter().filter(move |o| {
            if use_options {
                owner != PlannerId::Option(o.id())
            } else {
                o.is_primitive()
            }
        })
    }

    fn samples<'a>(&self, ctx: &PlanningContext<'a>) -> Result<Cow<'a, [State]>> {
        match self.owner {
            PlannerId::Main => Ok(Cow::Borrowed(ctx.samples.states())),
            PlannerId::Option(id) => {
                let option = ctx.options.get(id).ok_or(ImrlError::UnknownOption(id))?;
                if option.is_primitive() {
                    Ok(Cow::Borrowed(ctx.samples.states()))
                } else {
                    Ok(Cow::Owned(option.get_init_set(ctx.samples)?))
                }
            }
        }
    }

    /// Bellman residual term of `option` at `fv` under the current theta
    pub fn option_value(&self, option: &Opt, fv: &FeatureVector) -> Result<f64> {
        let ret = match self.reward.for_option(option.id()) {
            Some(r) => option.get_return(r, fv)?,
            None => 0.0,
        };
        Ok(ret + self.config.gamma * option.get_next_fv(fv)?.dot(&self.theta))
    }

    /// Best backed-up value at `fv` over `options`, `None` if there are none
    fn max_value<'a>(
        &self,
        options: impl Iterator<Item = &'a Opt>,
        fv: &FeatureVector,
    ) -> Result<Option<f64>> {
        let mut best: Option<f64> = None;
        for option in options {
            let v = self.option_value(option, fv)?;
            best = Some(best.map_or(v, |b| b.max(v)));
        }
        Ok(best)
    }

    /// One full backup over every sample; returns the number of backups made.
    ///
    /// An empty sample set or option set makes this a no-op.
    pub fn sweep(&mut self, ctx: &PlanningContext<'_>) -> Result<usize> {
        let samples = self.samples(ctx)?;
        let mut backups = 0;
        for state in samples.iter() {
            let fv = ctx.features.evaluate(state)?;
            ensure_dim(self.theta.len(), fv.len())?;
            let Some(target) = self.max_value(self.visible(ctx), &fv)? else {
                break;
            };
            let error = target - fv.dot(&self.theta);
            self.theta.scaled_add(self.config.alpha * error, &fv);
            backups += 1;
        }
        trace!(owner = ?self.owner, backups, "sweep");
        Ok(backups)
    }

    /// Run the configured number of sweeps, starting from zero unless theta
    /// is retained between runs.
    pub fn run(&mut self, ctx: &PlanningContext<'_>) -> Result<&FeatureVector> {
        if !self.config.retain_theta {
            self.theta.fill(0.0);
        }
        let mut backups = 0;
        for _ in 0..self.config.iterations {
            backups += self.sweep(ctx)?;
        }
        debug!(
            owner = ?self.owner,
            sweeps = self.config.iterations,
            backups,
            norm = self.theta.dot(&self.theta).sqrt(),
            "value iteration finished"
        );
        Ok(&self.theta)
    }

    /// Greedy choice at `fv` with uniform tie breaking.
    ///
    /// Options in `exclude` and options that cannot start from `fv` are not
    /// considered. When a primitive action is among the best choices, only the
    /// tied primitives are eligible.
    pub fn get_max_action<R: Rng + ?Sized>(
        &self,
        fv: &FeatureVector,
        ctx: &PlanningContext<'_>,
        exclude: &[OptionId],
        rng: &mut R,
    ) -> Result<OptionId> {
        let mut values = Vec::new();
        let available = self
            .visible(ctx)
            .filter(|o| !exclude.contains(&o.id()) && o.can_init_from_fv(fv));
        for option in available {
            values.push((option, self.option_value(option, fv)?));
        }
        let max = values
            .iter()
            .map(|&(_, v)| v)
            .fold(f64::NEG_INFINITY, f64::max);

        let best: Vec<&Opt> = values
            .iter()
            .filter(|&&(_, v)| v == max)
            .map(|&(o, _)| o)
            .collect();
        let primitives: Vec<OptionId> = best
            .iter()
            .filter(|o| o.is_primitive())
            .map(|o| o.id())
            .collect();
        let eligible: Vec<OptionId> = if primitives.is_empty() {
            best.iter().map(|o| o.id()).collect()
        } else {
            primitives
        };

        eligible.choose(rng).copied().ok_or_else(|| {
            ImrlError::InvalidConfig(format!("planner {:?} sees no options", self.owner))
        })
    }
}

/// The main planner plus one planner per subgoal option.
#[derive(Debug, Clone)]
pub struct Planners {
    main: ValueIteration,
    options: IndexMap<OptionId, ValueIteration>,
}

impl Planners {
    /// Planner set holding only the main planner
    #[must_use]
    pub fn new(main: ValueIteration) -> Self {
        Self {
            main,
            options: IndexMap::new(),
        }
    }

    /// Planner by id
    #[must_use]
    pub fn get(&self, id: PlannerId) -> Option<&ValueIteration> {
        match id {
            PlannerId::Main => Some(&self.main),
            PlannerId::Option(o) => self.options.get(&o),
        }
    }

    /// Mutable planner by id
    pub fn get_mut(&mut self, id: PlannerId) -> Option<&mut ValueIteration> {
        match id {
            PlannerId::Main => Some(&mut self.main),
            PlannerId::Option(o) => self.options.get_mut(&o),
        }
    }

    /// The main planner
    #[must_use]
    pub fn main(&self) -> &ValueIteration {
        &self.main
    }

    /// Mutable main planner
    pub fn main_mut(&mut self) -> &mut ValueIteration {
        &mut self.main
    }

    /// Register the planner of a new subgoal option
    pub fn insert(&mut self, option: OptionId, planner: ValueIteration) {
        self.options.insert(option, planner);
    }

    /// Options with their own planner, in creation order
    pub fn option_ids(&self) -> impl Iterator<Item = OptionId> + '_ {
        self.options.keys().copied()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::policy::ChoicePolicy;
    use imrl_core::{one_hot, Initiation, Subgoal, TabularFeatures};
    use proptest::prelude::*;
    use rand::rngs::StdRng;
    use rand::SeedableRng;
    use std::sync::Arc;

    fn config(use_options: bool) -> PlannerConfig {
        PlannerConfig {
            iterations: 20,
            alpha: 0.5,
            gamma: 0.9,
            retain_theta: true,
            use_options,
        }
    }

    fn primitives(n: usize, features: &Arc<dyn FeatureSpace>) -> Vec<Opt> {
        (0..n)
            .map(|a| Opt::primitive(a, Arc::clone(features), 0.5, 0.9))
            .collect()
    }

    fn samples(n: usize) -> SampleSet {
        let mut samples = SampleSet::new(0.0);
        for s in 0..n {
            samples.insert(&State::Discrete(s));
        }
        samples
    }

    #[test]
    fn empty_samples_are_a_noop() {
        let features: Arc<dyn FeatureSpace> = Arc::new(TabularFeatures::new(4));
        let options = primitives(2, &features);
        let samples = SampleSet::new(0.0);
        let ctx = PlanningContext {
            options: &options,
            samples: &samples,
            features: &*features,
        };
        let mut vi =
            ValueIteration::new(PlannerId::Main, RewardVectors::Shared(one_hot(4, 3)), 4, config(true))
                .unwrap();
        assert_eq!(vi.sweep(&ctx).unwrap(), 0);
        assert!(vi.run(&ctx).unwrap().iter().all(|&x| x == 0.0));
    }

    #[test]
    fn empty_option_set_is_a_noop() {
        let features: Arc<dyn FeatureSpace> = Arc::new(TabularFeatures::new(4));
        let samples = samples(4);
        let ctx = PlanningContext {
            options: &[],
            samples: &samples,
            features: &*features,
        };
        let mut vi =
            ValueIteration::new(PlannerId::Main, RewardVectors::Shared(one_hot(4, 3)), 4, config(true))
                .unwrap();
        assert_eq!(vi.sweep(&ctx).unwrap(), 0);
    }

    #[test]
    fn backup_moves_toward_rewarded_state() {
        let features: Arc<dyn FeatureSpace> = Arc::new(TabularFeatures::new(3));
        let mut options = primitives(1, &features);
        // Action 0 in state s leads to state s + 1; state 2 is rewarding.
        for s in 0..2 {
            for _ in 0..200 {
                options[0].update_m(&one_hot(3, s), &one_hot(3, s + 1), 1).unwrap();
            }
        }
        for s in 0..3 {
            for _ in 0..200 {
                options[0].update_u(&one_hot(3, s), None).unwrap();
            }
        }
        let samples = samples(3);
        let ctx = PlanningContext {
            options: &options,
            samples: &samples,
            features: &*features,
        };
        let mut vi =
            ValueIteration::new(PlannerId::Main, RewardVectors::Shared(one_hot(3, 2)), 3, config(false))
                .unwrap();
        let theta = vi.run(&ctx).unwrap();
        assert!(theta[2] > theta[1]);
        assert!(theta[1] > theta[0]);
        assert!(theta[0] > 0.0);
    }

    #[test]
    fn theta_resets_unless_retained() {
        let features: Arc<dyn FeatureSpace> = Arc::new(TabularFeatures::new(2));
        let mut options = primitives(1, &features);
        options[0].update_u(&one_hot(2, 1), None).unwrap();
        let samples = samples(2);
        let ctx = PlanningContext {
            options: &options,
            samples: &samples,
            features: &*features,
        };
        let mut cfg = config(false);
        cfg.iterations = 1;

        cfg.retain_theta = true;
        let mut retained =
            ValueIteration::new(PlannerId::Main, RewardVectors::Shared(one_hot(2, 1)), 2, cfg).unwrap();
        let once = retained.run(&ctx).unwrap()[1];
        let twice = retained.run(&ctx).unwrap()[1];
        assert!(twice > once);

        cfg.retain_theta = false;
        let mut fresh =
            ValueIteration::new(PlannerId::Main, RewardVectors::Shared(one_hot(2, 1)), 2, cfg).unwrap();
        let once = fresh.run(&ctx).unwrap()[1];
        let again = fresh.run(&ctx).unwrap()[1];
        assert_eq!(once, again);
    }

    #[test]
    fn ties_prefer_primitives() {
        let features: Arc<dyn FeatureSpace> = Arc::new(TabularFeatures::new(4));
        let mut options = primitives(2, &features);
        options.push(
            Opt::with_subgoal(
                2,
                Arc::clone(&features),
                Subgoal::new(3),
                Initiation::Always,
                ChoicePolicy::ValueIteration(PlannerId::Option(2)),
                0.5,
                0.9,
            )
            .unwrap(),
        );
        let samples = samples(4);
        let ctx = PlanningContext {
            options: &options,
            samples: &samples,
            features: &*features,
        };
        let vi =
            ValueIteration::new(PlannerId::Main, RewardVectors::Shared(one_hot(4, 3)), 4, config(true))
                .unwrap();
        let mut rng = StdRng::seed_from_u64(11);
        for s in 0..4 {
            for _ in 0..50 {
                let choice = vi.get_max_action(&one_hot(4, s), &ctx, &[], &mut rng).unwrap();
                assert!(choice < 2);
            }
        }
        // With the primitives excluded from view the option is the only choice
        let flat = ValueIteration::new(
            PlannerId::Option(2),
            RewardVectors::Shared(one_hot(4, 3)),
            4,
            config(false),
        )
        .unwrap();
        assert!(flat.get_max_action(&one_hot(4, 0), &ctx, &[], &mut rng).unwrap() < 2);
    }

    #[test]
    fn options_win_when_strictly_better() {
        let features: Arc<dyn FeatureSpace> = Arc::new(TabularFeatures::new(4));
        let mut options = primitives(2, &features);
        let mut option = Opt::with_subgoal(
            2,
            Arc::clone(&features),
            Subgoal::new(3),
            Initiation::Always,
            ChoicePolicy::ValueIteration(PlannerId::Option(2)),
            1.0,
            0.9,
        )
        .unwrap();
        option.update_u(&one_hot(4, 3), None).unwrap();
        option.update_u(&one_hot(4, 0), Some(&one_hot(4, 3))).unwrap();
        options.push(option);
        let samples = samples(4);
        let ctx = PlanningContext {
            options: &options,
            samples: &samples,
            features: &*features,
        };
        let vi =
            ValueIteration::new(PlannerId::Main, RewardVectors::Shared(one_hot(4, 3)), 4, config(true))
                .unwrap();
        let mut rng = StdRng::seed_from_u64(5);
        assert_eq!(vi.get_max_action(&one_hot(4, 0), &ctx, &[], &mut rng).unwrap(), 2);
        // An active option is never re-entered
        assert!(vi.get_max_action(&one_hot(4, 0), &ctx, &[2], &mut rng).unwrap() < 2);
        // Nor is an option started at its own subgoal
        assert!(vi.get_max_action(&one_hot(4, 3), &ctx, &[], &mut rng).unwrap() < 2);
    }

    #[test]
    fn option_planner_sweeps_its_init_set() {
        let features: Arc<dyn FeatureSpace> = Arc::new(TabularFeatures::new(5));
        let mut options = primitives(1, &features);
        options.push(
            Opt::with_subgoal(
                1,
                Arc::clone(&features),
                Subgoal::new(2),
                Initiation::Precedes,
                ChoicePolicy::ValueIteration(PlannerId::Option(1)),
                0.5,
                0.9,
            )
            .unwrap(),
        );
        for s in 0..5 {
            options[0].update_u(&one_hot(5, s), None).unwrap();
        }
        let samples = samples(5);
        let ctx = PlanningContext {
            options: &options,
            samples: &samples,
            features: &*features,
        };
        let reward = FeatureVector::ones(5);
        let mut vi =
            ValueIteration::new(PlannerId::Option(1), RewardVectors::Shared(reward), 5, config(false))
                .unwrap();
        assert_eq!(vi.sweep(&ctx).unwrap(), 2);
        let theta = vi.theta();
        assert!(theta[0] > 0.0 && theta[1] > 0.0);
        assert!(theta.iter().skip(2).all(|&x| x == 0.0));
    }

    #[test]
    fn per_option_rewards_grow_on_demand() {
        let mut vi = ValueIteration::new(
            PlannerId::Main,
            RewardVectors::PerOption(vec![one_hot(3, 0)]),
            3,
            config(true),
        )
        .unwrap();
        vi.set_option_reward(2, one_hot(3, 2)).unwrap();
        let RewardVectors::PerOption(rs) = vi.reward() else {
            panic!("reward should stay per option");
        };
        assert_eq!(rs.len(), 3);
        assert_eq!(rs[1], FeatureVector::zeros(3));
        assert_eq!(vi.reward().for_option(2), Some(&one_hot(3, 2)));
        assert!(vi.set_option_reward(0, one_hot(4, 0)).is_err());
    }

    proptest! {
        #[test]
        fn zero_reward_keeps_theta_at_zero(
            transitions in proptest::collection::vec((0usize..6, 0usize..6, 0usize..2), 0..60),
            sweeps in 1usize..10,
        ) {
            let features: Arc<dyn FeatureSpace> = Arc::new(TabularFeatures::new(6));
            let mut options = primitives(2, &features);
            let mut samples = SampleSet::new(0.0);
            for &(s, t, a) in &transitions {
                options[a].update_m(&one_hot(6, s), &one_hot(6, t), 1).unwrap();
                options[a].update_u(&one_hot(6, s), None).unwrap();
                samples.insert(&State::Discrete(s));
            }
            let ctx = PlanningContext { options: &options, samples: &samples, features: &*features };
            let mut cfg = config(true);
            cfg.iterations = sweeps;
            let mut vi = ValueIteration::new(
                PlannerId::Main,
                RewardVectors::Shared(FeatureVector::zeros(6)),
                6,
                cfg,
            ).unwrap();
            let theta = vi.run(&ctx).unwrap();
            prop_assert!(theta.iter().all(|&x| x == 0.0));
        }
    }
}
