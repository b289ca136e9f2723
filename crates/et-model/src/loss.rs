//! Weighted binary cross-entropy.
//!
//! Per-event weights multiply the per-event loss and the batch loss is the
//! weighted sum divided by the batch size:
//!
//! ```text
//! L = (1/N) * sum_i w_i * -(y_i ln p_i + (1 - y_i) ln(1 - p_i))
//! ```

use burn::tensor::backend::Backend;
use burn::tensor::Tensor;

/// Probabilities are clipped to `[EPSILON, 1 - EPSILON]` before the log.
pub const EPSILON: f64 = 1e-7;

/// Batch loss over `[batch, 1]` probability, label and weight columns.
pub fn weighted_bce<B: Backend>(
    probabilities: Tensor<B, 2>,
    labels: Tensor<B, 2>,
    weights: Tensor<B, 2>,
) -> Tensor<B, 1> {
    let p = probabilities.clamp(EPSILON, 1.0 - EPSILON);
    let per_event = labels.clone().neg() * p.clone().log()
        - (labels.neg() + 1.0) * (p.neg() + 1.0).log();
    (per_event * weights).mean()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::network::column_tensor;
    use burn::backend::NdArray;
    use burn::tensor::ElementConversion;
    use ndarray::{array, Array1};

    type TestBackend = NdArray<f32>;

    fn loss(p: Array1<f32>, y: Array1<f32>, w: Array1<f32>) -> f32 {
        let device = Default::default();
        weighted_bce(
            column_tensor::<TestBackend>(&p, &device),
            column_tensor(&y, &device),
            column_tensor(&w, &device),
        )
        .into_scalar()
        .elem()
    }

    #[test]
    fn perfect_predictions_have_tiny_loss() {
        assert!(loss(array![1.0, 0.0], array![1.0, 0.0], array![1.0, 1.0]) < 1e-5);
    }

    #[test]
    fn uniform_guess_costs_ln2() {
        let l = loss(array![0.5, 0.5], array![1.0, 0.0], array![1.0, 1.0]);
        assert!((l - std::f32::consts::LN_2).abs() < 1e-6);
    }

    #[test]
    fn weights_scale_contributions() {
        let p = array![0.2, 0.9];
        let y = array![1.0, 1.0];
        let unit = loss(p.clone(), y.clone(), array![1.0, 1.0]);
        let doubled = loss(p.clone(), y.clone(), array![2.0, 2.0]);
        assert!((doubled - 2.0 * unit).abs() < 1e-5);

        // zero weight drops the event but it still counts in N
        let only_first = loss(p, y, array![1.0, 0.0]);
        assert!((only_first - (-(0.2f32.ln()) / 2.0)).abs() < 1e-5);
    }

    #[test]
    fn clipping_keeps_loss_finite() {
        let l = loss(array![0.0, 1.0], array![1.0, 0.0], array![1.0, 1.0]);
        assert!(l.is_finite());
        assert!(l > 10.0);
    }
}
