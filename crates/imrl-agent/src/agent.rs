//! The option-stack agent
//!
//! An [`Agent`] turns states into primitive actions by descending through a
//! stack of executing options, and turns observed transitions into model
//! updates for every option whose execution the transition belongs to. It
//! grows its option set whenever a registered subgoal is visited for the
//! first time.

use std::sync::Arc;

use rand::rngs::StdRng;
use rand::seq::SliceRandom;
use rand::SeedableRng;
use tracing::{debug, info, trace};

use imrl_core::{
    Environment, FeatureSpace, FeatureVector, ImrlError, Initiation, Result, State, Subgoal,
};

use crate::config::AgentConfig;
use crate::discovery::SubgoalRegistry;
use crate::option::{OptionId, Opt};
use crate::policy::ChoicePolicy;
use crate::samples::SampleSet;
use crate::value_iteration::{PlannerId, Planners, PlanningContext, RewardVectors, ValueIteration};

/// Predicted features below this total magnitude end a model rollout.
const VANISHED: f64 = 1e-12;

/// One executing option on the stack.
#[derive(Debug, Clone)]
pub struct StackFrame {
    /// The executing option
    pub option: OptionId,
    /// Features of the state the option started in
    pub start_fv: FeatureVector,
    /// Agent step at which the option started
    pub start_step: u64,
}

/// Agent executing and learning a growing set of options.
pub struct Agent {
    config: AgentConfig,
    features: Arc<dyn FeatureSpace>,
    num_actions: usize,
    options: Vec<Opt>,
    planners: Planners,
    subgoals: SubgoalRegistry,
    initiation: Initiation,
    samples: SampleSet,
    stack: Vec<StackFrame>,
    policy: ChoicePolicy,
    extrinsic_reward: FeatureVector,
    step: u64,
    rng: StdRng,
}

impl Agent {
    /// Agent with one primitive option per action and no subgoal options yet.
    ///
    /// It starts on the random top-level policy.
    pub fn new(
        config: AgentConfig,
        features: Arc<dyn FeatureSpace>,
        num_actions: usize,
        subgoals: Vec<Subgoal>,
        initiation: Initiation,
        reward: FeatureVector,
    ) -> Result<Self> {
        config.validate()?;
        if num_actions == 0 {
            return Err(ImrlError::InvalidConfig("agent needs at least one action".into()));
        }
        let num_features = features.num_features();

        let options = (0..num_actions)
            .map(|a| Opt::primitive(a, Arc::clone(&features), config.eta, config.gamma))
            .collect();
        let main_reward = if config.intrinsic_reward {
            RewardVectors::PerOption(vec![reward.clone(); num_actions])
        } else {
            RewardVectors::Shared(reward.clone())
        };
        let main = ValueIteration::new(
            PlannerId::Main,
            main_reward,
            num_features,
            config.main_planner(),
        )?;
        let rng = match config.seed {
            Some(seed) => StdRng::seed_from_u64(seed),
            None => StdRng::from_entropy(),
        };

        Ok(Self {
            samples: SampleSet::new(config.sample_epsilon),
            config,
            features,
            num_actions,
            options,
            planners: Planners::new(main),
            subgoals: SubgoalRegistry::new(subgoals),
            initiation,
            stack: Vec::new(),
            policy: ChoicePolicy::Random { num_actions },
            extrinsic_reward: reward,
            step: 0,
            rng,
        })
    }

    /// Agent wired to an environment's actions, subgoals, initiation rule and reward
    pub fn for_environment(
        config: AgentConfig,
        features: Arc<dyn FeatureSpace>,
        env: &dyn Environment,
    ) -> Result<Self> {
        let reward = env.reward_vector(&*features)?;
        Self::new(
            config,
            features,
            env.num_actions(),
            env.create_subgoals(),
            env.initiation(),
            reward,
        )
    }

    /// Choose top-level options greedily from the main planner
    pub fn use_value_iteration_policy(&mut self) {
        self.policy = ChoicePolicy::ValueIteration(PlannerId::Main);
    }

    /// Choose top-level actions uniformly at random
    pub fn use_random_policy(&mut self) {
        self.policy = ChoicePolicy::Random {
            num_actions: self.num_actions,
        };
    }

    /// Primitive action to execute in `state`.
    ///
    /// Continues the innermost executing option, or asks the top-level policy
    /// when nothing is executing, and descends through option policies until
    /// a primitive action is reached. Every option on the way is pushed.
    /// Options already executing or already at their subgoal in `state` are
    /// never chosen.
    pub fn choose_action(&mut self, state: &State) -> Result<usize> {
        let fv = self.features.evaluate(state)?;
        let ctx = PlanningContext {
            options: &self.options,
            samples: &self.samples,
            features: &*self.features,
        };
        let mut blocked: Vec<OptionId> = self.stack.iter().map(|f| f.option).collect();
        blocked.extend(
            self.options
                .iter()
                .filter(|o| !o.is_primitive() && o.is_terminal_in_state(state))
                .map(Opt::id),
        );

        let mut choice = match self.stack.last() {
            Some(top) => {
                let top = top.option;
                let option = self.options.get(top).ok_or(ImrlError::UnknownOption(top))?;
                option.policy().choose_action_from_fv(
                    &fv,
                    &self.planners,
                    &ctx,
                    &blocked,
                    &mut self.rng,
                )?
            }
            None => self
                .policy
                .choose_action_from_fv(&fv, &self.planners, &ctx, &blocked, &mut self.rng)?,
        };

        loop {
            let option = self
                .options
                .get(choice)
                .ok_or(ImrlError::UnknownOption(choice))?;
            if self.stack.iter().any(|f| f.option == choice) {
                return Err(ImrlError::OptionStack(format!(
                    "option {choice} chosen while already executing"
                )));
            }
            if !option.is_primitive() && option.is_terminal_in_state(state) {
                return Err(ImrlError::OptionStack(format!(
                    "option {choice} chosen at its own subgoal"
                )));
            }
            self.stack.push(StackFrame {
                option: choice,
                start_fv: fv.clone(),
                start_step: self.step,
            });
            blocked.push(choice);
            if option.is_primitive() {
                trace!(action = choice, depth = self.stack.len(), "chose action");
                return Ok(choice);
            }
            choice = option.policy().choose_action_from_fv(
                &fv,
                &self.planners,
                &ctx,
                &blocked,
                &mut self.rng,
            )?;
        }
    }

    /// Learn from the transition `state --action--> next`.
    ///
    /// `action` must be the primitive returned by the preceding
    /// [`choose_action`](Self::choose_action).
    pub fn update(&mut self, state: &State, action: usize, next: &State) -> Result<()> {
        match self.stack.last() {
            None => {
                return Err(ImrlError::OptionStack(
                    "update without an executing action".into(),
                ))
            }
            Some(top) if top.option != action => {
                return Err(ImrlError::OptionStack(format!(
                    "executed action {action} but option {} is innermost",
                    top.option
                )))
            }
            Some(_) => {}
        }
        let fv = self.features.evaluate(state)?;
        let fv_next = self.features.evaluate(next)?;
        self.samples.insert(state);
        self.samples.insert(next);

        while let Some(top) = self.stack.last() {
            let id = top.option;
            if !self.option(id)?.is_terminal_in_state(next) {
                break;
            }
            let Some(frame) = self.stack.pop() else { break };
            let tau = u32::try_from(self.step + 1 - frame.start_step).map_err(|_| {
                ImrlError::OptionStack(format!("option {id} ran for too many steps"))
            })?;
            let option = self.option_mut(id)?;
            option.update_m(&frame.start_fv, &fv_next, tau)?;
            option.update_u(&fv, None)?;
            if !option.is_primitive() {
                debug!(option = id, tau, step = self.step, "option terminated");
            }
        }

        for frame in &self.stack {
            self.options
                .get_mut(frame.option)
                .ok_or(ImrlError::UnknownOption(frame.option))?
                .update_u(&fv, Some(&fv_next))?;
        }

        for index in self.subgoals.newly_reached(next) {
            self.create_option(index)?;
        }
        if self.config.intrinsic_reward {
            self.update_intrinsic_reward(&fv, next)?;
        }

        self.step += 1;
        Ok(())
    }

    /// Materialize the option for registered subgoal `index`
    fn create_option(&mut self, index: usize) -> Result<OptionId> {
        let subgoal = self
            .subgoals
            .get(index)
            .cloned()
            .ok_or_else(|| ImrlError::InvalidState(format!("no subgoal {index}")))?;
        let id = self.options.len();
        let planner_id = PlannerId::Option(id);

        let label = subgoal.state.to_string();
        let subgoal_fv = self.features.evaluate(&subgoal.state)?;
        let planner = ValueIteration::new(
            planner_id,
            RewardVectors::Shared(subgoal_fv),
            self.features.num_features(),
            self.config.option_planner(),
        )?;
        let option = Opt::with_subgoal(
            id,
            Arc::clone(&self.features),
            subgoal,
            self.initiation.clone(),
            ChoicePolicy::ValueIteration(planner_id),
            self.config.eta,
            self.config.gamma,
        )?;

        info!(option = id, subgoal = %label, step = self.step, "created subgoal option");
        self.options.push(option);
        self.planners.insert(id, planner);
        self.subgoals.mark_reached(index, id);
        Ok(id)
    }

    /// Reward every subgoal option whose region contains `next` by how
    /// surprising reaching it was from `fv`.
    fn update_intrinsic_reward(&mut self, fv: &FeatureVector, next: &State) -> Result<()> {
        let mut rewards = Vec::new();
        for (_, id) in self.subgoals.reached() {
            let option = self.option(id)?;
            let (Some(subgoal), Some(subgoal_fv)) = (option.subgoal(), option.subgoal_fv()) else {
                continue;
            };
            if !subgoal.contains(next) {
                continue;
            }
            let norm = subgoal_fv.dot(subgoal_fv);
            let predicted = if norm > 0.0 {
                (subgoal_fv.dot(&option.get_next_fv(fv)?) / norm).clamp(0.0, 1.0)
            } else {
                1.0
            };
            rewards.push((id, subgoal_fv * (self.config.intrinsic_scale * (1.0 - predicted))));
        }
        for (id, reward) in rewards {
            trace!(option = id, "intrinsic reward updated");
            self.planners.main_mut().set_option_reward(id, reward)?;
        }
        Ok(())
    }

    /// Run every option's planner and model rollouts, then the main planner.
    pub fn plan(&mut self) -> Result<()> {
        let ids: Vec<OptionId> = self.planners.option_ids().collect();
        for id in ids {
            let ctx = PlanningContext {
                options: &self.options,
                samples: &self.samples,
                features: &*self.features,
            };
            self.planners
                .get_mut(PlannerId::Option(id))
                .ok_or(ImrlError::UnknownOption(id))?
                .run(&ctx)?;
            self.rollout(id)?;
        }

        let ctx = PlanningContext {
            options: &self.options,
            samples: &self.samples,
            features: &*self.features,
        };
        self.planners.main_mut().run(&ctx)?;
        debug!(
            options = self.options.len(),
            samples = self.samples.len(),
            step = self.step,
            "planning finished"
        );
        Ok(())
    }

    /// Train option `id`'s model on simulated executions of its policy.
    ///
    /// Each rollout starts from a sampled state in the option's initiation set
    /// and steps through the one-step models of the primitive actions its
    /// policy chooses. Subgoal options are never chosen inside a rollout.
    fn rollout(&mut self, id: OptionId) -> Result<()> {
        let option = self.options.get(id).ok_or(ImrlError::UnknownOption(id))?;
        let subgoal_options: Vec<OptionId> = (self.num_actions..self.options.len()).collect();
        let init = option.get_init_set(&self.samples)?;
        let starts: Vec<&State> = init
            .choose_multiple(&mut self.rng, self.config.rollout_starts)
            .collect();

        let mut u_updates: Vec<(FeatureVector, Option<FeatureVector>)> = Vec::new();
        let mut m_updates: Vec<(FeatureVector, FeatureVector, u32)> = Vec::new();
        let ctx = PlanningContext {
            options: &self.options,
            samples: &self.samples,
            features: &*self.features,
        };
        for start in starts {
            let start_fv = self.features.evaluate(start)?;
            let mut fv = start_fv.clone();
            for t in 1..=self.config.rollout_horizon {
                let choice = option.policy().choose_action_from_fv(
                    &fv,
                    &self.planners,
                    &ctx,
                    &subgoal_options,
                    &mut self.rng,
                )?;
                let chosen = self.options.get(choice).ok_or(ImrlError::UnknownOption(choice))?;
                if !chosen.is_primitive() {
                    break;
                }
                let predicted = chosen.get_next_fv(&fv)? / chosen.uom().gamma;
                if predicted.iter().map(|x| x.abs()).sum::<f64>() < VANISHED {
                    break;
                }
                if option.is_terminal_in_fv(&predicted) {
                    u_updates.push((fv, None));
                    m_updates.push((start_fv, predicted, u32::try_from(t).unwrap_or(u32::MAX)));
                    break;
                }
                u_updates.push((fv, Some(predicted.clone())));
                fv = predicted;
            }
        }

        trace!(option = id, m_updates = m_updates.len(), u_updates = u_updates.len(), "rollout");
        let option = self.option_mut(id)?;
        for (fv, fv_next, tau) in &m_updates {
            option.update_m(fv, fv_next, *tau)?;
        }
        for (fv, fv_next) in &u_updates {
            option.update_u(fv, fv_next.as_ref())?;
        }
        Ok(())
    }

    fn option(&self, id: OptionId) -> Result<&Opt> {
        self.options.get(id).ok_or(ImrlError::UnknownOption(id))
    }

    fn option_mut(&mut self, id: OptionId) -> Result<&mut Opt> {
        self.options.get_mut(id).ok_or(ImrlError::UnknownOption(id))
    }

    /// Configuration
    #[must_use]
    pub fn config(&self) -> &AgentConfig {
        &self.config
    }

    /// Number of primitive actions
    #[must_use]
    pub fn num_actions(&self) -> usize {
        self.num_actions
    }

    /// All options, primitives first
    #[must_use]
    pub fn options(&self) -> &[Opt] {
        &self.options
    }

    /// Main and option planners
    #[must_use]
    pub fn planners(&self) -> &Planners {
        &self.planners
    }

    /// Subgoal registry
    #[must_use]
    pub fn subgoals(&self) -> &SubgoalRegistry {
        &self.subgoals
    }

    /// Visited states
    #[must_use]
    pub fn samples(&self) -> &SampleSet {
        &self.samples
    }

    /// Executing options, outermost first
    #[must_use]
    pub fn stack(&self) -> &[StackFrame] {
        &self.stack
    }

    /// Current top-level policy
    #[must_use]
    pub fn policy(&self) -> &ChoicePolicy {
        &self.policy
    }

    /// Extrinsic reward vector
    #[must_use]
    pub fn extrinsic_reward(&self) -> &FeatureVector {
        &self.extrinsic_reward
    }

    /// Transitions observed so far
    #[must_use]
    pub fn step(&self) -> u64 {
        self.step
    }
}

impl std::fmt::Debug for Agent {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Agent")
            .field("num_actions", &self.num_actions)
            .field("options", &self.options.len())
            .field("samples", &self.samples.len())
            .field("stack", &self.stack)
            .field("policy", &self.policy)
            .field("step", &self.step)
            .finish_non_exhaustive()
    }
}
