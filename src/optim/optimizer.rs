//! # Optimizer Driver
//!
//! Binds parameter groups, per-parameter state and an [`UpdateRule`], and
//! walks every parameter once per `step`.

use log::{debug, trace};
use rayon::prelude::*;

use super::param_group::{GroupOptions, ParamGroup};
use super::state::{GroupRecord, OptimizerState, SlotKey, SlotState, StateDict};
use super::{OptimError, UpdateRule};
use crate::tensor::{Tensor, TensorData};

/// Gradient-based optimizer over ordered parameter groups.
///
/// Parameters are visited in group order, then in order within each group.
/// A parameter's position is its state key, so groups must keep the same
/// parameters in the same order for the optimizer's lifetime.
pub struct Optimizer<R: UpdateRule> {
    rule: R,
    param_groups: Vec<ParamGroup>,
    state: OptimizerState<R::State>,
}

impl<R: UpdateRule> Optimizer<R> {
    /// Creates an optimizer over `groups`. Every group's learning rate must be
    /// finite and non-negative. State starts empty.
    pub fn new<I>(groups: I, rule: R) -> Result<Self, OptimError>
    where
        I: IntoIterator<Item = ParamGroup>,
    {
        let mut optimizer = Optimizer {
            rule,
            param_groups: Vec::new(),
            state: OptimizerState::new(),
        };
        for group in groups {
            optimizer.push_group(group)?;
        }

        debug!(
            "{} optimizer created: {} groups, {} parameters",
            optimizer.rule.name(),
            optimizer.param_groups.len(),
            optimizer.num_params()
        );
        Ok(optimizer)
    }

    /// Single-group convenience constructor.
    pub fn with_params<I>(params: I, lr: TensorData, rule: R) -> Result<Self, OptimError>
    where
        I: IntoIterator<Item = Tensor>,
    {
        Self::new([ParamGroup::new(params, lr)], rule)
    }

    /// Appends a group. Its state slots start uninitialized.
    pub fn add_param_group(&mut self, group: ParamGroup) -> Result<(), OptimError> {
        self.push_group(group)?;
        debug!(
            "{} optimizer: added group {} ({} parameters)",
            self.rule.name(),
            self.param_groups.len() - 1,
            self.param_groups.last().map_or(0, ParamGroup::len)
        );
        Ok(())
    }

    fn push_group(&mut self, group: ParamGroup) -> Result<(), OptimError> {
        group.options().validate()?;
        self.state.push_group(group.len());
        self.param_groups.push(group);
        Ok(())
    }

    // --- Accessors ---

    pub fn rule(&self) -> &R {
        &self.rule
    }

    pub fn param_groups(&self) -> &[ParamGroup] {
        &self.param_groups
    }

    /// Mutable access to the groups, e.g. to change one group's learning rate.
    pub fn param_groups_mut(&mut self) -> &mut [ParamGroup] {
        &mut self.param_groups
    }

    pub fn state(&self) -> &OptimizerState<R::State> {
        &self.state
    }

    pub fn num_params(&self) -> usize {
        self.param_groups.iter().map(ParamGroup::len).sum()
    }

    /// Sets the learning rate of every group.
    pub fn set_lr(&mut self, lr: TensorData) -> Result<(), OptimError> {
        GroupOptions { lr }.validate()?;
        for group in &mut self.param_groups {
            group.set_lr(lr)?;
        }
        Ok(())
    }

    // --- Stepping ---

    /// Performs a single optimization step over every parameter.
    ///
    /// Fails with `MissingGradient` or `ShapeMismatch` at the first parameter
    /// that cannot be updated; that parameter is left untouched, parameters
    /// before it keep their new values.
    pub fn step(&mut self) -> Result<(), OptimError> {
        trace!(
            "{} step over {} groups",
            self.rule.name(),
            self.param_groups.len()
        );

        let rule = &self.rule;
        let groups = self.param_groups.iter().enumerate();
        for ((g, group), slots) in groups.zip(self.state.groups_mut()) {
            for ((i, param), slot) in group.params().iter().enumerate().zip(slots.iter_mut()) {
                update_param(rule, SlotKey::new(g, i), param, group.options(), slot)?;
            }
        }
        Ok(())
    }

    /// Runs `closure` (which recomputes the loss and fills in gradients), then
    /// performs a step. Returns the closure's result.
    pub fn step_with<F, L>(&mut self, closure: F) -> Result<L, OptimError>
    where
        F: FnOnce() -> L,
    {
        let loss = closure();
        self.step()?;
        Ok(loss)
    }

    /// Like [`step`](Self::step), with parameters updated concurrently.
    ///
    /// Produces the same values as `step`. If any parameter fails, which of
    /// the others were already updated is unspecified.
    pub fn par_step(&mut self) -> Result<(), OptimError>
    where
        R: Sync,
        R::State: Send,
    {
        trace!(
            "{} parallel step over {} groups",
            self.rule.name(),
            self.param_groups.len()
        );

        let rule = &self.rule;
        self.param_groups
            .par_iter()
            .zip(self.state.groups_mut().par_iter_mut())
            .enumerate()
            .try_for_each(|(g, (group, slots))| {
                group
                    .params()
                    .par_iter()
                    .zip(slots.par_iter_mut())
                    .enumerate()
                    .try_for_each(|(i, (param, slot))| {
                        update_param(rule, SlotKey::new(g, i), param, group.options(), slot)
                    })
            })
    }

    /// Zeros the gradients of all parameters managed by the optimizer.
    /// Parameters without a gradient are left without one.
    pub fn zero_grad(&mut self) {
        for param in self.param_groups.iter().flat_map(ParamGroup::params) {
            param.zero_grad();
        }
    }

    // --- State export / import ---

    /// Snapshot of group options and every initialized slot.
    pub fn state_dict(&self) -> StateDict {
        StateDict {
            optimizer_type: self.rule.name().to_string(),
            recurrence: self.rule.recurrence(),
            groups: self
                .param_groups
                .iter()
                .map(|group| GroupRecord {
                    options: *group.options(),
                    len: group.len(),
                })
                .collect(),
            slots: self
                .state
                .iter()
                .map(|(key, state)| (key, state.to_record()))
                .collect(),
        }
    }

    /// Replaces the optimizer's state and group options with `state`.
    ///
    /// The snapshot must come from the same rule and the same group layout,
    /// and every slot must match its parameter's shape. Nothing changes if
    /// any check fails.
    pub fn load_state_dict(&mut self, state: &StateDict) -> Result<(), OptimError> {
        if state.optimizer_type != self.rule.name() {
            return Err(OptimError::IncompatibleState(format!(
                "Cannot load {} state into {} optimizer",
                state.optimizer_type,
                self.rule.name()
            )));
        }
        if state.recurrence != self.rule.recurrence() {
            return Err(OptimError::IncompatibleState(format!(
                "state was built with the {:?} recurrence, optimizer uses {:?}",
                state.recurrence,
                self.rule.recurrence()
            )));
        }
        if state.groups.len() != self.param_groups.len() {
            return Err(OptimError::IncompatibleState(format!(
                "expected {} groups, state has {}",
                self.param_groups.len(),
                state.groups.len()
            )));
        }

        let mut restored = OptimizerState::new();
        for (g, (record, group)) in state.groups.iter().zip(&self.param_groups).enumerate() {
            if record.len != group.len() {
                return Err(OptimError::IncompatibleState(format!(
                    "group {g} has {} parameters, state has {}",
                    group.len(),
                    record.len
                )));
            }
            record.options.validate()?;
            restored.push_group(group.len());
        }

        for (&key, record) in &state.slots {
            let param = self
                .param_groups
                .get(key.group)
                .and_then(|group| group.params().get(key.index))
                .ok_or_else(|| {
                    OptimError::IncompatibleState(format!("slot {key} has no parameter"))
                })?;

            let slot_state = R::State::from_record(record)?;
            let expected = param.shape();
            if slot_state.shape() != expected.as_slice() {
                return Err(OptimError::ShapeMismatch {
                    group: key.group,
                    index: key.index,
                    expected,
                    got: slot_state.shape().to_vec(),
                });
            }
            restored.groups_mut()[key.group][key.index] = Some(slot_state);
        }

        for (group, record) in self.param_groups.iter_mut().zip(&state.groups) {
            group.set_lr(record.options.lr)?;
        }
        self.state = restored;

        debug!(
            "{} optimizer: loaded {} state slots",
            self.rule.name(),
            self.state.len()
        );
        Ok(())
    }
}

/// Applies `rule` to one parameter after checking its gradient and shapes.
fn update_param<R: UpdateRule>(
    rule: &R,
    key: SlotKey,
    param: &Tensor,
    options: &GroupOptions,
    slot: &mut Option<R::State>,
) -> Result<(), OptimError> {
    let grad = param.grad_guard();
    let grad = grad.as_ref().ok_or(OptimError::MissingGradient {
        group: key.group,
        index: key.index,
    })?;

    let mut value = param.data_mut();
    check_shape(key, value.shape(), grad.shape())?;
    if let Some(state) = slot.as_ref() {
        check_shape(key, state.shape(), grad.shape())?;
    }

    let fresh = slot.is_none();
    rule.apply(&mut value, grad, options, slot);
    if fresh && slot.is_some() {
        debug!("{} state initialized for slot {key}", rule.name());
    }
    Ok(())
}

fn check_shape(key: SlotKey, expected: &[usize], got: &[usize]) -> Result<(), OptimError> {
    if expected == got {
        Ok(())
    } else {
        Err(OptimError::ShapeMismatch {
            group: key.group,
            index: key.index,
            expected: expected.to_vec(),
            got: got.to_vec(),
        })
    }
}
