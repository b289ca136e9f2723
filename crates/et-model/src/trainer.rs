//! Mini-batch training loop with early stopping.

use burn::module::AutodiffModule;
use burn::optim::adaptor::OptimizerAdaptor;
use burn::optim::{Adam, AdamConfig, GradientsParams, Optimizer};
use burn::tensor::backend::{AutodiffBackend, Backend};
use burn::tensor::ElementConversion;
use et_types::{EventTable, ModelError, TrainingSettings, TuneResult};
use rand::seq::SliceRandom;
use rand::SeedableRng;
use rand_chacha::ChaCha8Rng;

use crate::history::{EpochRecord, TrainingHistory};
use crate::loss::weighted_bce;
use crate::network::{column_tensor, matrix_tensor, ClassifierNetwork};

/// Stops training when a monitored loss plateaus.
///
/// An epoch counts as an improvement when the loss drops below the best seen
/// so far by more than `min_delta`.
#[derive(Clone, Debug)]
pub struct EarlyStopping {
    patience: usize,
    min_delta: f32,
    best_loss: f32,
    epochs_without_improvement: usize,
}

impl EarlyStopping {
    pub fn new(patience: usize, min_delta: f32) -> Self {
        Self {
            patience,
            min_delta,
            best_loss: f32::INFINITY,
            epochs_without_improvement: 0,
        }
    }

    pub fn best_loss(&self) -> f32 {
        self.best_loss
    }

    /// Record one epoch; returns `true` when training should stop.
    pub fn update(&mut self, loss: f32) -> bool {
        if loss < self.best_loss - self.min_delta {
            self.best_loss = loss;
            self.epochs_without_improvement = 0;
        } else {
            self.epochs_without_improvement += 1;
        }
        self.epochs_without_improvement >= self.patience
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct TrainingConfig {
    pub max_epochs: usize,
    pub batch_size: usize,
    pub patience: usize,
    pub min_delta: f32,
    /// Seeds weight init, batch shuffling and dropout.
    pub seed: u64,
}

impl Default for TrainingConfig {
    fn default() -> Self {
        Self::from(&TrainingSettings::default())
    }
}

impl From<&TrainingSettings> for TrainingConfig {
    fn from(settings: &TrainingSettings) -> Self {
        Self {
            max_epochs: settings.max_epochs,
            batch_size: settings.batch_size,
            patience: settings.patience,
            min_delta: settings.min_delta,
            seed: settings.seed,
        }
    }
}

/// Adam state for one classifier.
pub type ClassifierOptimizer<B> = OptimizerAdaptor<Adam, ClassifierNetwork<B>, B>;

/// Adam with beta1 0.9, beta2 0.999 and epsilon 1e-7.
pub fn adam<B: AutodiffBackend>() -> ClassifierOptimizer<B> {
    AdamConfig::new()
        .with_beta_1(0.9)
        .with_beta_2(0.999)
        .with_epsilon(1e-7)
        .init()
}

/// What one call to [`Trainer::fit`] produced.
#[derive(Debug)]
pub struct TrainingOutcome<B: Backend> {
    /// Weights after the last epoch run.
    pub network: ClassifierNetwork<B>,
    pub history: TrainingHistory,
    pub epochs_run: usize,
    /// Which monitor ended training, if any.
    pub stopped_by: Option<StopReason>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StopReason {
    TrainingLoss,
    ValidationLoss,
}

/// Weighted loss of the network over a whole table.
///
/// Pass the inference module (`valid()`) to score without dropout.
pub fn evaluate_loss<B: Backend>(
    network: &ClassifierNetwork<B>,
    table: &EventTable,
    device: &B::Device,
) -> TuneResult<f32> {
    network.check_width(table.n_features())?;
    let probabilities = network.probabilities(matrix_tensor(&table.features, device));
    let loss = weighted_bce(
        probabilities,
        column_tensor(&table.labels, device),
        column_tensor(&table.weights, device),
    );
    Ok(loss.into_scalar().elem())
}

/// Trainer for the classifier
pub struct Trainer<B: AutodiffBackend> {
    config: TrainingConfig,
    device: B::Device,
}

impl<B: AutodiffBackend> Trainer<B> {
    pub fn new(config: TrainingConfig, device: B::Device) -> Self {
        Trainer { config, device }
    }

    pub fn config(&self) -> &TrainingConfig {
        &self.config
    }

    pub fn fit<O>(
        &self,
        mut network: ClassifierNetwork<B>,
        optimizer: &mut O,
        learning_rate: f64,
        train: &EventTable,
        validation: &EventTable,
    ) -> TuneResult<TrainingOutcome<B>>
    where
        O: Optimizer<ClassifierNetwork<B>, B>,
    {
        if train.is_empty() || validation.is_empty() {
            return Err(ModelError::InvalidConfig {
                message: "training and validation sets must be non-empty".to_string(),
            }
            .into());
        }
        network.check_width(train.n_features())?;

        let mut rng = ChaCha8Rng::seed_from_u64(self.config.seed);
        let mut loss_monitor = EarlyStopping::new(self.config.patience, self.config.min_delta);
        let mut val_monitor = EarlyStopping::new(self.config.patience, self.config.min_delta);
        let mut history = TrainingHistory::new();
        let mut stopped_by = None;

        let mut order: Vec<usize> = (0..train.len()).collect();
        let batch_size = self.config.batch_size.max(1);

        for epoch in 1..=self.config.max_epochs {
            order.shuffle(&mut rng);

            let mut weighted_loss_sum = 0.0f64;
            for batch_idx in order.chunks(batch_size) {
                let batch = train.select_rows(batch_idx);
                let probabilities =
                    network.probabilities(matrix_tensor(&batch.features, &self.device));
                let loss = weighted_bce(
                    probabilities,
                    column_tensor(&batch.labels, &self.device),
                    column_tensor(&batch.weights, &self.device),
                );

                let batch_loss: f32 = loss.clone().into_scalar().elem();
                weighted_loss_sum += batch_loss as f64 * batch_idx.len() as f64;

                let grads = loss.backward();
                let grads = GradientsParams::from_grads(grads, &network);
                network = optimizer.step(learning_rate, network, grads);
            }

            let loss = (weighted_loss_sum / train.len() as f64) as f32;
            let val_loss = evaluate_loss(&network.valid(), validation, &self.device)?;

            if !loss.is_finite() || !val_loss.is_finite() {
                return Err(ModelError::Diverged { epoch, loss }.into());
            }

            tracing::debug!("epoch {:>3}: loss {:.5}, val_loss {:.5}", epoch, loss, val_loss);
            history.push(EpochRecord { epoch, loss, val_loss });

            let stop_loss = loss_monitor.update(loss);
            let stop_val = val_monitor.update(val_loss);
            if stop_loss || stop_val {
                stopped_by = Some(if stop_val {
                    StopReason::ValidationLoss
                } else {
                    StopReason::TrainingLoss
                });
                tracing::debug!(
                    "Early stopping after epoch {} (best loss {:.5}, best val_loss {:.5})",
                    epoch,
                    loss_monitor.best_loss(),
                    val_monitor.best_loss()
                );
                break;
            }
        }

        Ok(TrainingOutcome {
            epochs_run: history.epochs(),
            network,
            history,
            stopped_by,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::metrics::roc_auc;
    use crate::network::build_classifier;
    use burn::backend::{Autodiff, NdArray};
    use et_types::Hyperparameters;
    use ndarray::{Array1, Array2};
    use rand::Rng;

    type TestBackend = Autodiff<NdArray<f32>>;

    /// Two uniform blobs, one per class, separated along both features.
    fn blobs(rows: usize, seed: u64) -> EventTable {
        let mut rng = ChaCha8Rng::seed_from_u64(seed);
        let labels = Array1::from_shape_fn(rows, |i| (i % 2) as f32);
        let features = Array2::from_shape_fn((rows, 2), |(i, _)| {
            let centre = if i % 2 == 0 { -1.0 } else { 1.0 };
            centre + rng.random_range(-1.0f32..1.0)
        });
        EventTable::new(
            vec!["a".to_string(), "b".to_string()],
            features,
            labels,
            Array1::ones(rows),
        )
        .unwrap()
    }

    fn trainer(config: TrainingConfig) -> Trainer<TestBackend> {
        Trainer::new(config, Default::default())
    }

    #[test]
    fn early_stopping_patience() {
        let mut es = EarlyStopping::new(3, 0.001);
        assert!(!es.update(1.0));
        assert!(!es.update(0.9));
        // within delta: not an improvement
        assert!(!es.update(0.8995));
        assert!(!es.update(0.8995));
        assert!(es.update(0.8995));
        assert_eq!(es.best_loss(), 0.9);
    }

    #[test]
    fn early_stopping_improvement_resets() {
        let mut es = EarlyStopping::new(2, 0.01);
        es.update(1.0);
        assert!(!es.update(1.0));
        assert!(!es.update(0.5));
        assert!(!es.update(0.5));
        assert!(es.update(0.5));
    }

    #[test]
    fn learns_separable_data() {
        let train = blobs(400, 1);
        let validation = blobs(200, 2);
        let hp = Hyperparameters::new(1e-2, 16, 8, 0.0);
        let device = Default::default();
        let net = build_classifier::<TestBackend>(&hp, 2, 3, &device).unwrap();
        let mut optimizer = adam();

        let trainer = trainer(TrainingConfig {
            max_epochs: 30,
            batch_size: 32,
            patience: 5,
            min_delta: 1e-4,
            seed: 4,
        });
        let outcome = trainer
            .fit(net, &mut optimizer, hp.learning_rate, &train, &validation)
            .unwrap();

        assert!(outcome.epochs_run >= 1 && outcome.epochs_run <= 30);
        assert_eq!(outcome.history.epochs(), outcome.epochs_run);

        let first = outcome.history.records[0].loss;
        let last = outcome.history.last().unwrap().loss;
        assert!(last < first, "loss did not decrease: {} -> {}", first, last);

        let scores = outcome.network.valid().predict(&validation.features).unwrap();
        let auc = roc_auc(
            scores.as_slice().unwrap(),
            validation.labels.as_slice().unwrap(),
            validation.weights.as_slice().unwrap(),
        )
        .unwrap();
        assert!(auc > 0.9, "validation AUC too low: {}", auc);
    }

    #[test]
    fn validation_loss_matches_history() {
        let train = blobs(120, 5);
        let validation = blobs(60, 6);
        let hp = Hyperparameters::new(5e-3, 8, 4, 0.3);
        let device = Default::default();
        let net = build_classifier::<TestBackend>(&hp, 2, 1, &device).unwrap();

        let outcome = trainer(TrainingConfig {
            max_epochs: 3,
            batch_size: 16,
            patience: 10,
            min_delta: 1e-4,
            seed: 2,
        })
        .fit(net, &mut adam(), hp.learning_rate, &train, &validation)
        .unwrap();

        // val_loss is scored without dropout, so it is reproducible from the final weights
        let recomputed = evaluate_loss(&outcome.network.valid(), &validation, &device).unwrap();
        let recorded = outcome.history.last().unwrap().val_loss;
        assert!((recomputed - recorded).abs() < 1e-5);
    }

    #[test]
    fn stops_early_on_unlearnable_data() {
        // identical features for both classes: nothing to learn
        let rows = 64;
        let table = EventTable::new(
            vec!["a".to_string()],
            Array2::zeros((rows, 1)),
            Array1::from_shape_fn(rows, |i| (i % 2) as f32),
            Array1::ones(rows),
        )
        .unwrap();

        let hp = Hyperparameters::new(1e-2, 4, 4, 0.0);
        let device = Default::default();
        let net = build_classifier::<TestBackend>(&hp, 1, 0, &device).unwrap();
        let trainer = trainer(TrainingConfig {
            max_epochs: 500,
            batch_size: 64,
            patience: 3,
            min_delta: 1e-3,
            seed: 0,
        });

        let outcome = trainer
            .fit(net, &mut adam(), hp.learning_rate, &table, &table)
            .unwrap();
        assert!(outcome.epochs_run < 500);
        assert!(outcome.stopped_by.is_some());
    }

    #[test]
    fn empty_validation_is_rejected() {
        let train = blobs(10, 1);
        let empty = train.select_rows(&[]);
        let hp = Hyperparameters::default();
        let device = Default::default();
        let net = build_classifier::<TestBackend>(&hp, 2, 0, &device).unwrap();
        let trainer = trainer(TrainingConfig::default());
        assert!(trainer
            .fit(net, &mut adam(), hp.learning_rate, &train, &empty)
            .is_err());
    }

    #[test]
    fn feature_width_is_checked() {
        let train = blobs(10, 1);
        let hp = Hyperparameters::default();
        let device = Default::default();
        let net = build_classifier::<TestBackend>(&hp, 3, 0, &device).unwrap();
        let trainer = trainer(TrainingConfig::default());
        assert!(trainer
            .fit(net, &mut adam(), hp.learning_rate, &train, &train)
            .is_err());
    }
}
