//! # Momentum Optimizer

use log::debug;
use ndarray::ArrayD;

use super::config::{check_non_negative, check_unit_interval, Recurrence};
use super::state::{SlotRecord, SlotState};
use super::{GroupOptions, OptimError, UpdateRule};
use crate::tensor::{ops, TensorData};

/// Running gradient buffer used by [`Momentum`] and [`Nesterov`](super::Nesterov).
#[derive(Clone, Debug, PartialEq)]
pub struct RunningGrad {
    pub buffer: ArrayD<TensorData>,
}

impl SlotState for RunningGrad {
    fn shape(&self) -> &[usize] {
        self.buffer.shape()
    }

    fn to_record(&self) -> SlotRecord {
        SlotRecord::default().with_buffer("running_grad", &self.buffer)
    }

    fn from_record(record: &SlotRecord) -> Result<Self, OptimError> {
        Ok(RunningGrad {
            buffer: record.buffer("running_grad")?,
        })
    }
}

/// Gradient descent with a running gradient buffer `m`.
///
/// * first visit: `m = grad`
/// * later visits: `m = m + (m * momentum + grad * (1 - dampening))`
/// * `value = value - lr * m`
///
/// The buffer is accumulated onto, not replaced, so it keeps growing under a
/// constant gradient. [`Recurrence::Textbook`] uses
/// `m = m * momentum + grad * (1 - dampening)` instead.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct Momentum {
    momentum: TensorData,
    dampening: TensorData,
    recurrence: Recurrence,
}

impl Momentum {
    /// Creates a new Momentum rule.
    ///
    /// # Arguments
    /// * `momentum`: Momentum factor (default: 0.8).
    /// * `dampening`: Dampening applied to the incoming gradient (default: 0.2).
    pub fn new(
        momentum: Option<TensorData>,
        dampening: Option<TensorData>,
    ) -> Result<Self, OptimError> {
        let momentum = momentum.unwrap_or(0.8);
        let dampening = dampening.unwrap_or(0.2);

        check_non_negative("momentum", momentum)?;
        check_unit_interval("dampening", dampening)?;

        Ok(Momentum {
            momentum,
            dampening,
            recurrence: Recurrence::Reference,
        })
    }

    pub fn with_recurrence(mut self, recurrence: Recurrence) -> Self {
        self.recurrence = recurrence;
        self
    }

    pub fn momentum(&self) -> TensorData {
        self.momentum
    }

    pub fn dampening(&self) -> TensorData {
        self.dampening
    }
}

impl Default for Momentum {
    fn default() -> Self {
        Momentum {
            momentum: 0.8,
            dampening: 0.2,
            recurrence: Recurrence::Reference,
        }
    }
}

impl UpdateRule for Momentum {
    type State = RunningGrad;

    fn name(&self) -> &'static str {
        "Momentum"
    }

    fn recurrence(&self) -> Recurrence {
        self.recurrence
    }

    fn apply(
        &self,
        value: &mut ArrayD<TensorData>,
        grad: &ArrayD<TensorData>,
        options: &GroupOptions,
        slot: &mut Option<RunningGrad>,
    ) {
        let grad_scale = 1.0 - self.dampening;
        let state = match slot {
            Some(state) => {
                match self.recurrence {
                    Recurrence::Reference => {
                        ops::accumulate_additive(&mut state.buffer, grad, self.momentum, grad_scale)
                    }
                    Recurrence::Textbook => {
                        ops::accumulate_decaying(&mut state.buffer, grad, self.momentum, grad_scale)
                    }
                }
                state
            }
            None => {
                debug!("momentum buffer created with shape {:?}", grad.shape());
                slot.insert(RunningGrad {
                    buffer: grad.clone(),
                })
            }
        };

        ops::sub_scaled(value, options.lr, &state.buffer);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use ndarray::arr1;

    fn apply(
        rule: &Momentum,
        value: &mut ArrayD<TensorData>,
        g: TensorData,
        slot: &mut Option<RunningGrad>,
    ) {
        let grad = arr1(&[g]).into_dyn();
        rule.apply(value, &grad, &GroupOptions { lr: 0.1 }, slot);
    }

    #[test]
    fn first_visit_copies_gradient() {
        let rule = Momentum::default();
        let mut value = arr1(&[1.0]).into_dyn();
        let mut slot = None;
        apply(&rule, &mut value, 0.5, &mut slot);

        assert_eq!(slot.as_ref().unwrap().buffer[[0]], 0.5);
        assert!((value[[0]] - 0.95).abs() < 1e-6);
    }

    #[test]
    fn buffer_accumulates_additively() {
        let rule = Momentum::new(Some(0.9), Some(0.1)).unwrap();
        let mut value = arr1(&[0.0]).into_dyn();
        let mut slot = None;
        let g: TensorData = 2.0;

        apply(&rule, &mut value, g, &mut slot);
        apply(&rule, &mut value, g, &mut slot);

        let expected = g + (g * 0.9 + g * (1.0 - 0.1));
        assert!((slot.unwrap().buffer[[0]] - expected).abs() < 1e-5);
    }

    #[test]
    fn textbook_buffer_is_an_ema() {
        let rule = Momentum::new(Some(0.9), Some(0.0))
            .unwrap()
            .with_recurrence(Recurrence::Textbook);
        let mut value = arr1(&[0.0]).into_dyn();
        let mut slot = None;

        apply(&rule, &mut value, 1.0, &mut slot);
        apply(&rule, &mut value, 1.0, &mut slot);

        assert!((slot.unwrap().buffer[[0]] - 1.9).abs() < 1e-6);
    }

    #[test]
    fn rejects_invalid_hyperparameters() {
        assert!(Momentum::new(Some(-0.1), None).is_err());
        assert!(Momentum::new(None, Some(1.2)).is_err());
    }
}
