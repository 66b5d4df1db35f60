//! # Tensor Operations
//!
//! Elementwise array kernels used by the update rules.
//!
//! The in-place kernels require operands of identical shape and panic
//! otherwise (ndarray `Zip` semantics). Callers check with
//! [`ensure_same_shape`] before mutating anything.

use ndarray::{ArrayD, Zip};

use super::{TensorData, TensorError};

// --- Shape checks ---

/// Returns `ShapeMismatch` unless both shapes are identical.
pub fn ensure_same_shape(expected: &[usize], got: &[usize]) -> Result<(), TensorError> {
    if expected == got {
        Ok(())
    } else {
        Err(TensorError::ShapeMismatch {
            expected: expected.to_vec(),
            got: got.to_vec(),
        })
    }
}

// --- Elementwise kernels ---

/// Elementwise square, `a^2`.
pub fn square(a: &ArrayD<TensorData>) -> ArrayD<TensorData> {
    a.mapv(|x| x * x)
}

/// `dst := dst - alpha * src`.
pub fn sub_scaled(dst: &mut ArrayD<TensorData>, alpha: TensorData, src: &ArrayD<TensorData>) {
    Zip::from(dst).and(src).for_each(|d, &s| *d -= alpha * s);
}

/// `acc := keep * acc + (1 - keep) * x`
pub fn mix(acc: &mut ArrayD<TensorData>, x: &ArrayD<TensorData>, keep: TensorData) {
    let blend = 1.0 - keep;
    Zip::from(acc).and(x).for_each(|a, &x| *a = keep * *a + blend * x);
}

/// `buf := buf + (buf * momentum + grad * grad_scale)`
///
/// The running buffer grows by its own scaled copy on every call, so it is not
/// an exponential moving average.
pub fn accumulate_additive(
    buf: &mut ArrayD<TensorData>,
    grad: &ArrayD<TensorData>,
    momentum: TensorData,
    grad_scale: TensorData,
) {
    Zip::from(buf)
        .and(grad)
        .for_each(|b, &g| *b = *b + (*b * momentum + g * grad_scale));
}

/// `buf := buf * momentum + grad * grad_scale`
pub fn accumulate_decaying(
    buf: &mut ArrayD<TensorData>,
    grad: &ArrayD<TensorData>,
    momentum: TensorData,
    grad_scale: TensorData,
) {
    Zip::from(buf)
        .and(grad)
        .for_each(|b, &g| *b = *b * momentum + g * grad_scale);
}

/// `value := value - coeff * value`
pub fn decay(value: &mut ArrayD<TensorData>, coeff: TensorData) {
    value.mapv_inplace(|p| p - coeff * p);
}
