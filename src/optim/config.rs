//! # Hyperparameter Configuration
//!
//! Shared hyperparameter records and validation helpers. Each rule fixes its
//! hyperparameters at construction; only the learning rate lives on the
//! parameter group.

use serde::{Deserialize, Serialize};

use super::OptimError;
use crate::tensor::TensorData;

/// Which form of the moment recurrences a rule uses.
///
/// `Reference` is the default and reproduces the simplified update formulas
/// this library has always shipped:
/// * momentum buffers grow additively (`m + (m * momentum + g * (1 - dampening))`),
/// * the Adam second moment mixes with `beta1`,
/// * Adam bias correction is the constant `1 - beta`,
/// * AdamW decays with the learning rate itself.
///
/// `Textbook` switches to the published algorithms: exponential moving
/// averages, `beta2` for the second moment, `1 - beta^t` bias correction and
/// an independent AdamW `weight_decay`.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub enum Recurrence {
    #[default]
    Reference,
    Textbook,
}

// --- Validation helpers ---

pub(crate) fn check_non_negative(name: &str, value: TensorData) -> Result<(), OptimError> {
    if value.is_finite() && value >= 0.0 {
        Ok(())
    } else {
        Err(OptimError::InvalidHyperparameter(format!(
            "Invalid {name} value {value}: must be finite and >= 0"
        )))
    }
}

pub(crate) fn check_unit_interval(name: &str, value: TensorData) -> Result<(), OptimError> {
    if (0.0..=1.0).contains(&value) {
        Ok(())
    } else {
        Err(OptimError::InvalidHyperparameter(format!(
            "Invalid {name} value {value}: must be in [0, 1]"
        )))
    }
}

pub(crate) fn check_beta(name: &str, value: TensorData) -> Result<(), OptimError> {
    if (0.0..1.0).contains(&value) {
        Ok(())
    } else {
        Err(OptimError::InvalidHyperparameter(format!(
            "Invalid {name} value {value}: must be in [0, 1)"
        )))
    }
}

// --- Adam family ---

/// Hyperparameters shared by [`Adam`](super::Adam), [`Nadam`](super::Nadam)
/// and [`AdamW`](super::AdamW).
#[derive(Clone, Copy, Debug, PartialEq, Serialize, Deserialize)]
pub struct AdamConfig {
    /// `(beta1, beta2)`
    pub betas: (TensorData, TensorData),
    /// Added to the denominator.
    pub eps: TensorData,
    pub recurrence: Recurrence,
}

impl AdamConfig {
    /// Validated config.
    ///
    /// # Arguments
    /// * `betas`: Coefficients for the running moments (default: (0.9, 0.999)).
    /// * `eps`: Term added to the denominator to improve numerical stability (default: 1e-8).
    pub fn new(
        betas: Option<(TensorData, TensorData)>,
        eps: Option<TensorData>,
    ) -> Result<Self, OptimError> {
        let betas = betas.unwrap_or((0.9, 0.999));
        let eps = eps.unwrap_or(1e-8);

        check_beta("beta1", betas.0)?;
        check_beta("beta2", betas.1)?;
        check_non_negative("eps", eps)?;

        Ok(AdamConfig {
            betas,
            eps,
            recurrence: Recurrence::Reference,
        })
    }

    pub fn beta1(&self) -> TensorData {
        self.betas.0
    }

    pub fn beta2(&self) -> TensorData {
        self.betas.1
    }

    /// Mixing coefficient for the second moment.
    pub(crate) fn second_moment_beta(&self) -> TensorData {
        match self.recurrence {
            Recurrence::Reference => self.betas.0,
            Recurrence::Textbook => self.betas.1,
        }
    }

    /// Bias-correction denominators `(c1, c2)` for a slot visited `step` times.
    pub(crate) fn bias_corrections(&self, step: u64) -> (TensorData, TensorData) {
        let (beta1, beta2) = self.betas;
        match self.recurrence {
            Recurrence::Reference => (1.0 - beta1, 1.0 - beta2),
            Recurrence::Textbook => (1.0 - powi(beta1, step), 1.0 - powi(beta2, step)),
        }
    }
}

impl Default for AdamConfig {
    fn default() -> Self {
        AdamConfig {
            betas: (0.9, 0.999),
            eps: 1e-8,
            recurrence: Recurrence::Reference,
        }
    }
}

pub(crate) fn powi(base: TensorData, exp: u64) -> TensorData {
    base.powi(i32::try_from(exp).unwrap_or(i32::MAX))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_validate() {
        let cfg = AdamConfig::new(None, None).unwrap();
        assert_eq!(cfg, AdamConfig::default());
        assert_eq!(cfg.recurrence, Recurrence::Reference);
    }

    #[test]
    fn rejects_bad_betas() {
        assert!(AdamConfig::new(Some((1.0, 0.999)), None).is_err());
        assert!(AdamConfig::new(Some((0.9, -0.1)), None).is_err());
        assert!(AdamConfig::new(None, Some(-1e-8)).is_err());
        assert!(check_non_negative("lr", TensorData::NAN).is_err());
        assert!(check_unit_interval("dampening", 1.5).is_err());
    }

    #[test]
    fn reference_corrections_ignore_step() {
        let cfg = AdamConfig::default();
        assert_eq!(cfg.bias_corrections(1), cfg.bias_corrections(100));
        assert_eq!(cfg.second_moment_beta(), 0.9);

        let textbook = AdamConfig {
            recurrence: Recurrence::Textbook,
            ..cfg
        };
        let (c1, _) = textbook.bias_corrections(1);
        assert!((c1 - 0.1).abs() < 1e-6);
        assert_eq!(textbook.second_moment_beta(), 0.999);
    }
}
