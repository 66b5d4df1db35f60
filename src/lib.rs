//! # RTorch Optim
//!
//! First-order gradient-based optimizers for RTorch-style parameter tensors:
//! plain SGD, Momentum, Nesterov momentum, Adam, Nadam and AdamW.
//!
//! Gradients come from outside (an autograd engine or a hand-written
//! backward pass). An [`Optimizer`](optim::Optimizer) reads them and updates
//! the parameter values in place, keeping whatever per-parameter state its
//! rule needs between steps.

pub mod optim;
pub mod tensor;
pub mod utils;

pub mod prelude {
    pub use crate::optim::{
        Adam, AdamW, Momentum, Nadam, Nesterov, OptimError, Optimizer, ParamGroup, Recurrence,
        UpdateRule, SGD,
    };
    pub use crate::tensor::{Tensor, TensorData, TensorError};
}
