//! # Optimization Algorithms (`optim`)
//!
//! First-order update rules and the driver that applies them to groups of
//! parameters.
//!
//! An [`Optimizer`] owns an ordered list of [`ParamGroup`]s, one
//! [`UpdateRule`] and the per-parameter state that rule accumulates. State
//! slots are keyed by `(group index, position in group)` and created the first
//! time `step` visits the parameter.
//!
//! ```ignore
//! let w = Tensor::from_vec(&[2], vec![1.0, -1.0])?;
//! let mut opt = Optimizer::with_params([w.clone()], 1e-3, Adam::new(None, None)?)?;
//! loop {
//!     w.set_grad(compute_grad(&w))?;
//!     opt.step()?;
//! }
//! ```

use ndarray::ArrayD;

use crate::tensor::{TensorData, TensorError};

// --- Submodules ---
pub mod adam;
pub mod adamw;
pub mod config;
pub mod momentum;
pub mod nadam;
pub mod nesterov;
pub mod optimizer;
pub mod param_group;
pub mod sgd;
pub mod state;

// Re-export optimizers
pub use adam::{Adam, Moments};
pub use adamw::AdamW;
pub use config::{AdamConfig, Recurrence};
pub use momentum::{Momentum, RunningGrad};
pub use nadam::Nadam;
pub use nesterov::Nesterov;
pub use optimizer::Optimizer;
pub use param_group::{GroupOptions, ParamGroup};
pub use sgd::{Stateless, SGD};
pub use state::{
    GroupRecord, OptimizerState, SerializableTensor, SlotKey, SlotRecord, SlotState, StateDict,
};

// --- Error Handling ---
#[derive(thiserror::Error, Debug)]
pub enum OptimError {
    #[error("Parameter {index} of group {group} has no gradient")]
    MissingGradient { group: usize, index: usize },
    #[error("Shape mismatch for parameter {index} of group {group}: expected {expected:?}, got {got:?}")]
    ShapeMismatch {
        group: usize,
        index: usize,
        expected: Vec<usize>,
        got: Vec<usize>,
    },
    #[error("Invalid hyperparameter: {0}")]
    InvalidHyperparameter(String),
    #[error("Incompatible optimizer state: {0}")]
    IncompatibleState(String),
    #[error(transparent)]
    Tensor(#[from] TensorError),
}

// --- UpdateRule Trait ---

/// One optimization algorithm.
///
/// `apply` receives a parameter's value, its gradient, the options of the
/// group it belongs to, and its state slot. It mutates the value and the slot
/// in place. On the first visit the slot is `None` and the rule decides
/// whether to create state.
///
/// The driver guarantees before calling `apply` that the value, the gradient
/// and any existing state all have the same shape.
pub trait UpdateRule {
    /// Persistent per-parameter accumulators.
    type State: SlotState;

    /// Name recorded in exported state dicts and checked on load.
    fn name(&self) -> &'static str;

    /// Which formulas the rule runs. State built under one recurrence is not
    /// valid under the other, so exported state dicts record it.
    fn recurrence(&self) -> Recurrence {
        Recurrence::Reference
    }

    fn apply(
        &self,
        value: &mut ArrayD<TensorData>,
        grad: &ArrayD<TensorData>,
        options: &GroupOptions,
        slot: &mut Option<Self::State>,
    );
}
