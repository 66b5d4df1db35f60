//! # Adam Optimizer
//!
//! Also home of the moment bookkeeping shared by [`Nadam`](super::Nadam) and
//! [`AdamW`](super::AdamW).

use log::debug;
use ndarray::{ArrayD, Zip};

use super::config::{AdamConfig, Recurrence};
use super::state::{SlotRecord, SlotState};
use super::{GroupOptions, OptimError, UpdateRule};
use crate::tensor::{ops, TensorData};

/// First and second moment estimates for one parameter.
#[derive(Clone, Debug, PartialEq)]
pub struct Moments {
    /// Running mean of gradients (`v1`).
    pub first: ArrayD<TensorData>,
    /// Running mean of squared gradients (`v2`). Never negative.
    pub second: ArrayD<TensorData>,
    /// Number of visits so far, including the one that created the slot.
    pub step: u64,
}

impl SlotState for Moments {
    fn shape(&self) -> &[usize] {
        self.first.shape()
    }

    fn to_record(&self) -> SlotRecord {
        let mut record = SlotRecord::default()
            .with_buffer("first_moment", &self.first)
            .with_buffer("second_moment", &self.second);
        record.step = self.step;
        record
    }

    fn from_record(record: &SlotRecord) -> Result<Self, OptimError> {
        let first = record.buffer("first_moment")?;
        let second = record.buffer("second_moment")?;
        if first.shape() != second.shape() {
            return Err(OptimError::IncompatibleState(format!(
                "moment shapes differ: {:?} vs {:?}",
                first.shape(),
                second.shape()
            )));
        }
        Ok(Moments {
            first,
            second,
            step: record.step,
        })
    }
}

/// Advances (or creates) the moments of one slot and returns them.
///
/// Reference recurrence: the first visit seeds `v1 = grad`, `v2 = grad^2`;
/// later visits mix both moments with `beta1`. Textbook recurrence: moments
/// start at zero and mix on every visit, `v2` with `beta2`.
pub(crate) fn update_moments<'a>(
    config: &AdamConfig,
    grad: &ArrayD<TensorData>,
    slot: &'a mut Option<Moments>,
) -> &'a Moments {
    let grad_sq = ops::square(grad);
    let beta1 = config.beta1();
    let beta2 = config.second_moment_beta();

    let fresh = slot.is_none();
    let moments = slot.get_or_insert_with(|| {
        debug!("adam moments created with shape {:?}", grad.shape());
        match config.recurrence {
            Recurrence::Reference => Moments {
                first: grad.clone(),
                second: grad_sq.clone(),
                step: 0,
            },
            Recurrence::Textbook => Moments {
                first: ArrayD::zeros(grad.raw_dim()),
                second: ArrayD::zeros(grad.raw_dim()),
                step: 0,
            },
        }
    });

    if !fresh || config.recurrence == Recurrence::Textbook {
        ops::mix(&mut moments.first, grad, beta1);
        ops::mix(&mut moments.second, &grad_sq, beta2);
    }
    moments.step += 1;
    moments
}

/// Adam-family parameter update, `value -= lr * m_hat / (sqrt(v_hat) + eps)`,
/// where `m_hat = first / c1` and `v_hat = second / c2`.
pub(crate) fn adaptive_update(
    config: &AdamConfig,
    value: &mut ArrayD<TensorData>,
    moments: &Moments,
    lr: TensorData,
) {
    let (c1, c2) = config.bias_corrections(moments.step);
    let eps = config.eps;
    Zip::from(value)
        .and(&moments.first)
        .and(&moments.second)
        .for_each(|p, &m, &v| {
            let m_hat = m / c1;
            let v_hat = v / c2;
            *p -= lr * (m_hat / (v_hat.sqrt() + eps));
        });
}

/// Implements the Adam algorithm.
///
/// With the default [`Recurrence::Reference`] both moments mix with `beta1`
/// and the bias correction is the constant `1 - beta1` / `1 - beta2`.
/// Reference: Adam: A Method for Stochastic Optimization - https://arxiv.org/abs/1412.6980
#[derive(Clone, Copy, Debug, Default, PartialEq)]
pub struct Adam {
    config: AdamConfig,
}

impl Adam {
    /// Creates a new Adam rule.
    ///
    /// # Arguments
    /// * `betas`: Coefficients used for computing running averages of gradient and its square
    ///   (default: (0.9, 0.999)).
    /// * `eps`: Term added to the denominator to improve numerical stability (default: 1e-8).
    pub fn new(
        betas: Option<(TensorData, TensorData)>,
        eps: Option<TensorData>,
    ) -> Result<Self, OptimError> {
        Ok(Adam {
            config: AdamConfig::new(betas, eps)?,
        })
    }

    pub fn from_config(config: AdamConfig) -> Self {
        Adam { config }
    }

    pub fn with_recurrence(mut self, recurrence: Recurrence) -> Self {
        self.config.recurrence = recurrence;
        self
    }

    pub fn config(&self) -> &AdamConfig {
        &self.config
    }
}

impl UpdateRule for Adam {
    type State = Moments;

    fn name(&self) -> &'static str {
        "Adam"
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
        let moments = update_moments(&self.config, grad, slot);
        adaptive_update(&self.config, value, moments, options.lr);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use ndarray::arr1;

    #[test]
    fn first_visit_seeds_raw_moments() {
        let rule = Adam::default();
        let grad = arr1(&[0.5, -2.0]).into_dyn();
        let mut value = arr1(&[1.0, 1.0]).into_dyn();
        let mut slot = None;

        rule.apply(&mut value, &grad, &GroupOptions { lr: 0.01 }, &mut slot);

        let moments = slot.unwrap();
        assert_eq!(moments.first, grad);
        assert_eq!(moments.second, arr1(&[0.25, 4.0]).into_dyn());
        assert_eq!(moments.step, 1);

        // m_hat = g / 0.1, v_hat = g^2 / 0.001
        let m_hat: TensorData = 0.5 / (1.0 - 0.9);
        let v_hat: TensorData = 0.25 / (1.0 - 0.999);
        let expected = 1.0 - 0.01 * (m_hat / (v_hat.sqrt() + 1e-8));
        assert!((value[[0]] - expected).abs() < 1e-5);
    }

    #[test]
    fn second_moment_mixes_with_beta1() {
        let rule = Adam::new(Some((0.5, 0.999)), None).unwrap();
        let options = GroupOptions { lr: 0.0 };
        let mut value = arr1(&[0.0]).into_dyn();
        let mut slot = None;

        rule.apply(&mut value, &arr1(&[2.0]).into_dyn(), &options, &mut slot);
        rule.apply(&mut value, &arr1(&[4.0]).into_dyn(), &options, &mut slot);

        let moments = slot.unwrap();
        // 0.5 * 2 + 0.5 * 4
        assert!((moments.first[[0]] - 3.0).abs() < 1e-6);
        // 0.5 * 4 + 0.5 * 16
        assert!((moments.second[[0]] - 10.0).abs() < 1e-6);
        assert_eq!(moments.step, 2);
    }

    #[test]
    fn textbook_first_step_moves_by_lr() {
        let rule = Adam::default().with_recurrence(Recurrence::Textbook);
        let mut value = arr1(&[1.0]).into_dyn();
        let mut slot = None;

        rule.apply(&mut value, &arr1(&[3.0]).into_dyn(), &GroupOptions { lr: 0.1 }, &mut slot);

        // bias-corrected first step is lr * sign(g)
        assert!((value[[0]] - 0.9).abs() < 1e-4);
        let moments = slot.unwrap();
        assert!((moments.second[[0]] - 0.001 * 9.0).abs() < 1e-6);
    }

    #[test]
    fn moments_record_round_trip() {
        let moments = Moments {
            first: arr1(&[1.0, 2.0]).into_dyn(),
            second: arr1(&[1.0, 4.0]).into_dyn(),
            step: 3,
        };
        let restored = Moments::from_record(&moments.to_record()).unwrap();
        assert_eq!(restored, moments);
    }
}
