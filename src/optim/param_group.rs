//! # Parameter Groups
//!
//! A group is an ordered list of parameters sharing one learning rate.
//! Order matters: a parameter's position is its state key.

use serde::{Deserialize, Serialize};

use super::config::check_non_negative;
use super::OptimError;
use crate::tensor::{Tensor, TensorData};

/// Per-group hyperparameters.
#[derive(Clone, Copy, Debug, PartialEq, Serialize, Deserialize)]
pub struct GroupOptions {
    /// Learning rate.
    pub lr: TensorData,
}

impl GroupOptions {
    pub(crate) fn validate(&self) -> Result<(), OptimError> {
        check_non_negative("learning rate", self.lr)
    }
}

#[derive(Clone, Debug)]
pub struct ParamGroup {
    params: Vec<Tensor>,
    options: GroupOptions,
}

impl ParamGroup {
    /// Creates a group. The learning rate is validated when the group is
    /// handed to an optimizer.
    pub fn new<I>(params: I, lr: TensorData) -> Self
    where
        I: IntoIterator<Item = Tensor>,
    {
        ParamGroup {
            params: params.into_iter().collect(),
            options: GroupOptions { lr },
        }
    }

    pub fn params(&self) -> &[Tensor] {
        &self.params
    }

    pub fn len(&self) -> usize {
        self.params.len()
    }

    pub fn is_empty(&self) -> bool {
        self.params.is_empty()
    }

    pub fn options(&self) -> &GroupOptions {
        &self.options
    }

    pub fn lr(&self) -> TensorData {
        self.options.lr
    }

    /// Sets the learning rate (e.g. from a schedule).
    pub fn set_lr(&mut self, lr: TensorData) -> Result<(), OptimError> {
        let options = GroupOptions { lr };
        options.validate()?;
        self.options = options;
        Ok(())
    }
}
