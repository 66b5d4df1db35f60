//! # Stochastic Gradient Descent (SGD) Optimizer

use ndarray::ArrayD;

use super::state::{SlotRecord, SlotState};
use super::{GroupOptions, OptimError, UpdateRule};
use crate::tensor::{ops, TensorData};

/// Plain gradient descent: `value = value - lr * grad`.
///
/// Keeps no state between steps.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct SGD;

/// State type of rules that never create a slot. It has no values.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Stateless {}

impl SlotState for Stateless {
    fn shape(&self) -> &[usize] {
        match *self {}
    }

    fn to_record(&self) -> SlotRecord {
        match *self {}
    }

    fn from_record(_record: &SlotRecord) -> Result<Self, OptimError> {
        Err(OptimError::IncompatibleState(
            "SGD keeps no per-parameter state".into(),
        ))
    }
}

impl UpdateRule for SGD {
    type State = Stateless;

    fn name(&self) -> &'static str {
        "SGD"
    }

    fn apply(
        &self,
        value: &mut ArrayD<TensorData>,
        grad: &ArrayD<TensorData>,
        options: &GroupOptions,
        _slot: &mut Option<Stateless>,
    ) {
        ops::sub_scaled(value, options.lr, grad);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use ndarray::arr1;

    #[test]
    fn test_sgd_step() {
        let mut value = arr1(&[1.0, 2.0, 3.0]).into_dyn();
        let grad = arr1(&[0.1, 0.2, 0.3]).into_dyn();
        let mut slot = None;

        SGD.apply(&mut value, &grad, &GroupOptions { lr: 0.1 }, &mut slot);

        assert!((value[[0]] - 0.99).abs() < 1e-6);
        assert!((value[[1]] - 1.98).abs() < 1e-6);
        assert!((value[[2]] - 2.97).abs() < 1e-6);
        assert!(slot.is_none());
    }

    #[test]
    fn stateless_cannot_be_restored() {
        assert!(Stateless::from_record(&SlotRecord::default()).is_err());
    }
}
