//! Dense binary classifier.
//!
//! Architecture: Input(n) → Hidden1(l1) → ReLU → Dropout
//!                        → Hidden2(l2) → ReLU → Dropout
//!                        → Output(1) → sigmoid

use burn::module::Module;
use burn::nn::{Dropout, DropoutConfig, Initializer, Linear, LinearConfig};
use burn::tensor::activation::{relu, sigmoid};
use burn::tensor::backend::Backend;
use burn::tensor::{Tensor, TensorData};
use et_types::{Hyperparameters, ModelError, TuneResult};
use ndarray::{Array1, Array2};

fn backend_error(message: impl std::fmt::Debug) -> et_types::TuneError {
    ModelError::Backend {
        message: format!("{:?}", message),
    }
    .into()
}

/// Rows of `features` as a `[rows, columns]` tensor.
pub fn matrix_tensor<B: Backend>(features: &Array2<f32>, device: &B::Device) -> Tensor<B, 2> {
    let (rows, columns) = features.dim();
    let values: Vec<f32> = features.iter().copied().collect();
    Tensor::from_data(TensorData::new(values, [rows, columns]), device)
}

/// One value per event as a `[rows, 1]` column.
pub fn column_tensor<B: Backend>(values: &Array1<f32>, device: &B::Device) -> Tensor<B, 2> {
    Tensor::from_data(TensorData::new(values.to_vec(), [values.len(), 1]), device)
}

/// Flatten a `[rows, 1]` output back into one value per event.
pub fn column_values<B: Backend>(column: Tensor<B, 2>) -> TuneResult<Array1<f32>> {
    let values = column
        .into_data()
        .convert::<f32>()
        .to_vec::<f32>()
        .map_err(backend_error)?;
    Ok(Array1::from(values))
}

/// A single hidden layer block: Linear → ReLU → Dropout
#[derive(Module, Debug)]
pub struct HiddenBlock<B: Backend> {
    linear: Linear<B>,
    dropout: Dropout,
}

impl<B: Backend> HiddenBlock<B> {
    pub fn new(device: &B::Device, in_dim: usize, out_dim: usize, dropout: f64) -> Self {
        HiddenBlock {
            linear: LinearConfig::new(in_dim, out_dim)
                .with_initializer(Initializer::XavierUniform { gain: 1.0 })
                .init(device),
            dropout: DropoutConfig::new(dropout).init(),
        }
    }

    pub fn forward(&self, x: Tensor<B, 2>) -> Tensor<B, 2> {
        let x = self.linear.forward(x);
        let x = relu(x);
        self.dropout.forward(x)
    }
}

/// Two hidden blocks and a single logit output.
///
/// Dropout is only active on autodiff backends; the inference module from
/// `valid()` scores deterministically.
#[derive(Module, Debug)]
pub struct ClassifierNetwork<B: Backend> {
    hidden1: HiddenBlock<B>,
    hidden2: HiddenBlock<B>,
    output: Linear<B>,
}

impl<B: Backend> ClassifierNetwork<B> {
    /// Untrained network drawing its weights from the backend RNG.
    pub fn new(device: &B::Device, hparams: &Hyperparameters, n_features: usize) -> Self {
        ClassifierNetwork {
            hidden1: HiddenBlock::new(device, n_features, hparams.layer1_units, hparams.dropout),
            hidden2: HiddenBlock::new(
                device,
                hparams.layer1_units,
                hparams.layer2_units,
                hparams.dropout,
            ),
            output: LinearConfig::new(hparams.layer2_units, 1)
                .with_initializer(Initializer::XavierUniform { gain: 1.0 })
                .init(device),
        }
    }

    /// Logits, shape `[batch, 1]`.
    pub fn forward(&self, x: Tensor<B, 2>) -> Tensor<B, 2> {
        let x = self.hidden1.forward(x);
        let x = self.hidden2.forward(x);
        self.output.forward(x)
    }

    /// Signal probabilities, shape `[batch, 1]`.
    pub fn probabilities(&self, x: Tensor<B, 2>) -> Tensor<B, 2> {
        sigmoid(self.forward(x))
    }

    pub fn n_features(&self) -> usize {
        self.hidden1.linear.weight.val().dims()[0]
    }

    pub fn parameter_count(&self) -> usize {
        self.num_params()
    }

    pub(crate) fn check_width(&self, columns: usize) -> TuneResult<()> {
        if columns != self.n_features() {
            return Err(ModelError::DimensionMismatch {
                expected: self.n_features(),
                actual: columns,
            }
            .into());
        }
        Ok(())
    }

    /// Signal probability per row of an already scaled feature matrix.
    pub fn predict(&self, features: &Array2<f32>) -> TuneResult<Array1<f32>> {
        self.check_width(features.ncols())?;
        let device = self.output.weight.val().device();
        column_values(self.probabilities(matrix_tensor(features, &device)))
    }
}

/// Model builder: a fresh network for the given hyperparameters.
///
/// Seeds the backend first, so the same seed and shape give the same initial
/// weights.
pub fn build_classifier<B: Backend>(
    hparams: &Hyperparameters,
    n_features: usize,
    seed: u64,
    device: &B::Device,
) -> TuneResult<ClassifierNetwork<B>> {
    hparams.validate()?;
    if n_features == 0 {
        return Err(ModelError::InvalidConfig {
            message: "classifier needs at least one input feature".to_string(),
        }
        .into());
    }

    B::seed(seed);
    let network = ClassifierNetwork::new(device, hparams, n_features);

    tracing::debug!(
        "Built classifier {} -> {} -> {} -> 1 (dropout {:.2}, {} parameters)",
        n_features,
        hparams.layer1_units,
        hparams.layer2_units,
        hparams.dropout,
        network.parameter_count()
    );
    Ok(network)
}
