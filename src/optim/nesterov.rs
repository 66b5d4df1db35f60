//! # Nesterov Momentum Optimizer

use log::debug;
use ndarray::{ArrayD, Zip};

use super::config::{check_non_negative, Recurrence};
use super::momentum::RunningGrad;
use super::{GroupOptions, OptimError, UpdateRule};
use crate::tensor::{ops, TensorData};

/// Momentum with a Nesterov lookahead.
///
/// * first visit: `m = grad`
/// * later visits: `m = m + (m * momentum + grad)`
/// * `g_hat = momentum * m + grad`, using the updated `m`
/// * `value = value - lr * g_hat`
///
/// [`Recurrence::Textbook`] replaces the buffer update with
/// `m = m * momentum + grad`.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct Nesterov {
    momentum: TensorData,
    recurrence: Recurrence,
}

impl Nesterov {
    /// Creates a new Nesterov rule.
    ///
    /// # Arguments
    /// * `momentum`: Momentum factor (default: 0.8).
    pub fn new(momentum: Option<TensorData>) -> Result<Self, OptimError> {
        let momentum = momentum.unwrap_or(0.8);
        check_non_negative("momentum", momentum)?;

        Ok(Nesterov {
            momentum,
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
}

impl Default for Nesterov {
    fn default() -> Self {
        Nesterov {
            momentum: 0.8,
            recurrence: Recurrence::Reference,
        }
    }
}

impl UpdateRule for Nesterov {
    type State = RunningGrad;

    fn name(&self) -> &'static str {
        "Nesterov"
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
        let state = match slot {
            Some(state) => {
                match self.recurrence {
                    Recurrence::Reference => {
                        ops::accumulate_additive(&mut state.buffer, grad, self.momentum, 1.0)
                    }
                    Recurrence::Textbook => {
                        ops::accumulate_decaying(&mut state.buffer, grad, self.momentum, 1.0)
                    }
                }
                state
            }
            None => {
                debug!("nesterov buffer created with shape {:?}", grad.shape());
                slot.insert(RunningGrad {
                    buffer: grad.clone(),
                })
            }
        };

        let (lr, momentum) = (options.lr, self.momentum);
        Zip::from(value)
            .and(&state.buffer)
            .and(grad)
            .for_each(|p, &m, &g| *p -= lr * (momentum * m + g));
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use ndarray::arr1;

    #[test]
    fn lookahead_uses_updated_buffer() {
        let rule = Nesterov::new(Some(0.5)).unwrap();
        let options = GroupOptions { lr: 0.1 };
        let grad = arr1(&[1.0]).into_dyn();
        let mut value = arr1(&[0.0]).into_dyn();
        let mut slot = None;

        // m = 1, g_hat = 0.5 + 1
        rule.apply(&mut value, &grad, &options, &mut slot);
        assert!((value[[0]] + 0.15).abs() < 1e-6);

        // m = 1 + (0.5 + 1) = 2.5, g_hat = 1.25 + 1
        rule.apply(&mut value, &grad, &options, &mut slot);
        assert!((slot.as_ref().unwrap().buffer[[0]] - 2.5).abs() < 1e-6);
        assert!((value[[0]] + 0.15 + 0.225).abs() < 1e-6);
    }

    #[test]
    fn textbook_buffer_decays() {
        let rule = Nesterov::new(Some(0.5))
            .unwrap()
            .with_recurrence(Recurrence::Textbook);
        let options = GroupOptions { lr: 0.1 };
        let grad = arr1(&[1.0]).into_dyn();
        let mut value = arr1(&[0.0]).into_dyn();
        let mut slot = None;

        rule.apply(&mut value, &grad, &options, &mut slot);
        rule.apply(&mut value, &grad, &options, &mut slot);
        assert!((slot.unwrap().buffer[[0]] - 1.5).abs() < 1e-6);
    }
}
