//! # Nadam Optimizer

use ndarray::{ArrayD, Zip};

use super::adam::{update_moments, Moments};
use super::config::{powi, AdamConfig, Recurrence};
use super::{GroupOptions, OptimError, UpdateRule};
use crate::tensor::TensorData;

/// Adam with a Nesterov-style first moment.
///
/// Moments follow [`Adam`](super::Adam); the first-moment estimate folds in
/// the current gradient directly:
/// `m_hat = beta1 * v1 / (1 - beta1) + grad`.
#[derive(Clone, Copy, Debug, Default, PartialEq)]
pub struct Nadam {
    config: AdamConfig,
}

impl Nadam {
    /// Creates a new Nadam rule.
    ///
    /// # Arguments
    /// * `betas`: Coefficients for the running moments (default: (0.9, 0.999)).
    /// * `eps`: Term added to the denominator (default: 1e-8).
    pub fn new(
        betas: Option<(TensorData, TensorData)>,
        eps: Option<TensorData>,
    ) -> Result<Self, OptimError> {
        Ok(Nadam {
            config: AdamConfig::new(betas, eps)?,
        })
    }

    pub fn from_config(config: AdamConfig) -> Self {
        Nadam { config }
    }

    pub fn with_recurrence(mut self, recurrence: Recurrence) -> Self {
        self.config.recurrence = recurrence;
        self
    }

    pub fn config(&self) -> &AdamConfig {
        &self.config
    }

    /// Terms `(d1, scale, d2)` with
    /// `m_hat = beta1 * v1 / d1 + scale * grad / d2`.
    fn lookahead_terms(&self, step: u64) -> (TensorData, TensorData, TensorData) {
        let beta1 = self.config.beta1();
        match self.config.recurrence {
            Recurrence::Reference => (1.0 - beta1, 1.0, 1.0),
            Recurrence::Textbook => (
                1.0 - powi(beta1, step + 1),
                1.0 - beta1,
                1.0 - powi(beta1, step),
            ),
        }
    }
}

impl UpdateRule for Nadam {
    type State = Moments;

    fn name(&self) -> &'static str {
        "Nadam"
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
        let (d1, scale, d2) = self.lookahead_terms(moments.step);
        let (_, c2) = self.config.bias_corrections(moments.step);
        let (lr, beta1, eps) = (options.lr, self.config.beta1(), self.config.eps);

        Zip::from(value)
            .and(&moments.first)
            .and(&moments.second)
            .and(grad)
            .for_each(|p, &m, &v, &g| {
                let m_hat = beta1 * m / d1 + scale * g / d2;
                let v_hat = v / c2;
                *p -= lr * (m_hat / (v_hat.sqrt() + eps));
            });
    }
}
