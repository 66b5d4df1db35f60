//! # AdamW Optimizer

use ndarray::ArrayD;

use super::adam::{adaptive_update, update_moments, Moments};
use super::config::{check_non_negative, AdamConfig, Recurrence};
use super::{GroupOptions, OptimError, UpdateRule};
use crate::tensor::{ops, TensorData};

/// Adam with the parameter decayed before the moment update.
///
/// The reference decay reuses the learning rate as its coefficient,
/// `value = value - lr * value`. `weight_decay` only takes effect under
/// [`Recurrence::Textbook`], where the decay is `value - lr * weight_decay * value`.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct AdamW {
    config: AdamConfig,
    weight_decay: TensorData,
}

impl AdamW {
    /// Creates a new AdamW rule.
    ///
    /// # Arguments
    /// * `betas`: Coefficients for the running moments (default: (0.9, 0.999)).
    /// * `eps`: Term added to the denominator (default: 1e-8).
    /// * `weight_decay`: Decoupled decay coefficient for the textbook recurrence (default: 1e-2).
    pub fn new(
        betas: Option<(TensorData, TensorData)>,
        eps: Option<TensorData>,
        weight_decay: Option<TensorData>,
    ) -> Result<Self, OptimError> {
        let weight_decay = weight_decay.unwrap_or(1e-2);
        check_non_negative("weight_decay", weight_decay)?;

        Ok(AdamW {
            config: AdamConfig::new(betas, eps)?,
            weight_decay,
        })
    }

    pub fn with_recurrence(mut self, recurrence: Recurrence) -> Self {
        self.config.recurrence = recurrence;
        self
    }

    pub fn config(&self) -> &AdamConfig {
        &self.config
    }

    pub fn weight_decay(&self) -> TensorData {
        self.weight_decay
    }

    fn decay_coefficient(&self, lr: TensorData) -> TensorData {
        match self.config.recurrence {
            Recurrence::Reference => lr,
            Recurrence::Textbook => lr * self.weight_decay,
        }
    }
}

impl Default for AdamW {
    fn default() -> Self {
        AdamW {
            config: AdamConfig::default(),
            weight_decay: 1e-2,
        }
    }
}

impl UpdateRule for AdamW {
    type State = Moments;

    fn name(&self) -> &'static str {
        "AdamW"
    }

    fn recurrence(&self) -> Recurrence {
        self.config.recurrence
    }

    fn apply(
        &self,
        value: &mut ArrayD<TensorData>,
        grad: &ArrayD<TensorData>,
        options: &GroupOptions,
        slot: &mut Option<Moments>,
    ) {
        ops::decay(value, self.decay_coefficient(options.lr));

        let moments = update_moments(&self.config, grad, slot);
        adaptive_update(&self.config, value, moments, options.lr);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::optim::Adam;
    use ndarray::arr1;

    #[test]
    fn decays_with_learning_rate_before_adam_step() {
        let options = GroupOptions { lr: 0.1 };
        let grad = arr1(&[0.5]).into_dyn();

        let mut decayed = arr1(&[2.0]).into_dyn();
        let mut slot = None;
        AdamW::default().apply(&mut decayed, &grad, &options, &mut slot);

        // the same Adam step applied to 2.0 - 0.1 * 2.0
        let mut expected = arr1(&[1.8]).into_dyn();
        let mut adam_slot = None;
        Adam::default().apply(&mut expected, &grad, &options, &mut adam_slot);

        assert!((decayed[[0]] - expected[[0]]).abs() < 1e-6);
        assert_eq!(slot, adam_slot);
    }

    #[test]
    fn textbook_uses_weight_decay() {
        let rule = AdamW::new(None, None, Some(0.0))
            .unwrap()
            .with_recurrence(Recurrence::Textbook);
        assert_eq!(rule.decay_coefficient(0.1), 0.0);
        assert_eq!(AdamW::default().decay_coefficient(0.1), 0.1);
        assert!(AdamW::new(None, None, Some(-1.0)).is_err());
    }
}
