//! # et-model
//!
//! The binary event classifier trained in every tuning trial: a small dense
//! `burn` network, weighted cross-entropy, Adam, an early-stopping training
//! loop, ROC AUC scoring, and the saved model artifact.

use burn::backend::{Autodiff, NdArray};

pub mod artifact;
pub mod history;
pub mod loss;
pub mod metrics;
pub mod network;
pub mod trainer;

pub use artifact::{weights_path, ModelArtifact};
pub use history::{EpochRecord, TrainingHistory, HISTORY_FILE};
pub use loss::weighted_bce;
pub use metrics::roc_auc;
pub use network::{build_classifier, ClassifierNetwork, HiddenBlock};
pub use trainer::{
    adam, evaluate_loss, ClassifierOptimizer, EarlyStopping, StopReason, Trainer,
    TrainingConfig, TrainingOutcome,
};

/// CPU backend used for scoring and for the saved model.
pub type InferenceBackend = NdArray<f32>;

/// Backend the training loop differentiates through.
pub type TrainingBackend = Autodiff<InferenceBackend>;
