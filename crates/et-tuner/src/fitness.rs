//! The objective evaluated once per optimizer call.

use std::path::PathBuf;

use burn::module::AutodiffModule;
use burn::tensor::backend::Backend;
use et_model::{
    adam, build_classifier, roc_auc, ClassifierNetwork, InferenceBackend, ModelArtifact, Trainer,
    TrainingBackend, TrainingConfig,
};
use et_optimizer::{Evaluation, ParamMap};
use et_types::{EventTable, Hyperparameters, OutputSettings, TuneResult};

use crate::params::from_params;
use crate::pipeline::PreparedData;
use crate::score_log::{ScoreEntry, ScoreLog};

/// Outcome of one trial.
#[derive(Debug, Clone, PartialEq)]
pub struct TrialOutcome {
    pub hyperparameters: Hyperparameters,
    /// Trial name, unique within the run.
    pub descriptor: String,
    pub validation_auc: f64,
    pub epochs: usize,
    pub log_dir: PathBuf,
    /// Whether this trial replaced the saved best model.
    pub improved: bool,
}

/// Trains and scores one classifier per call, keeping the best model on disk.
pub struct FitnessEvaluator<'a> {
    data: &'a PreparedData,
    training: TrainingConfig,
    output: OutputSettings,
    score_log: ScoreLog,
    best_auc: f64,
    best: Option<TrialOutcome>,
    evaluations: usize,
}

impl<'a> FitnessEvaluator<'a> {
    pub fn new(data: &'a PreparedData, training: TrainingConfig, output: OutputSettings) -> Self {
        let score_log = ScoreLog::new(&output.score_log);
        Self {
            data,
            training,
            output,
            score_log,
            best_auc: 0.0,
            best: None,
            evaluations: 0,
        }
    }

    pub fn best_auc(&self) -> f64 {
        self.best_auc
    }

    /// The trial whose model is currently saved.
    pub fn best_trial(&self) -> Option<&TrialOutcome> {
        self.best.as_ref()
    }

    pub fn evaluations(&self) -> usize {
        self.evaluations
    }

    pub fn score_log(&self) -> &ScoreLog {
        &self.score_log
    }

    pub(crate) fn auc(
        network: &ClassifierNetwork<InferenceBackend>,
        table: &EventTable,
    ) -> TuneResult<f64> {
        let scores = network.predict(&table.features)?;
        roc_auc(&scores.to_vec(), &table.labels.to_vec(), &table.weights.to_vec())
    }

    pub fn evaluate(&mut self, hp: &Hyperparameters) -> TuneResult<TrialOutcome> {
        hp.validate()?;
        self.evaluations += 1;
        let descriptor = hp.trial_name(self.evaluations);
        tracing::info!("Trial {} started: {}", self.evaluations, descriptor);

        let device = <TrainingBackend as Backend>::Device::default();
        let network = build_classifier::<TrainingBackend>(
            hp,
            self.data.train.n_features(),
            self.training.seed,
            &device,
        )?;
        let outcome = Trainer::new(self.training.clone(), device).fit(
            network,
            &mut adam(),
            hp.learning_rate,
            &self.data.train,
            &self.data.validation,
        )?;

        let network = outcome.network.valid();
        let validation_auc = Self::auc(&network, &self.data.validation)?;

        let log_dir = self.output.log_dir.join(&descriptor);
        outcome.history.write_csv(&log_dir)?;
        self.score_log.append(&ScoreEntry {
            descriptor: descriptor.clone(),
            auc: validation_auc,
            epochs: outcome.epochs_run,
        })?;

        let improved = validation_auc > self.best_auc;
        if improved {
            ModelArtifact::new(
                *hp,
                self.data.feature_names.clone(),
                self.data.scaler.clone(),
                network,
                validation_auc,
                outcome.epochs_run,
            )
            .save(&self.output.best_model)?;
            self.best_auc = validation_auc;
        }

        let trial = TrialOutcome {
            hyperparameters: *hp,
            descriptor,
            validation_auc,
            epochs: outcome.epochs_run,
            log_dir,
            improved,
        };
        if improved {
            self.best = Some(trial.clone());
        }

        tracing::info!(
            "Trial {} finished: {} AUC {:.5} after {} epochs{}",
            self.evaluations,
            trial.descriptor,
            validation_auc,
            trial.epochs,
            if improved { " (new best)" } else { "" }
        );
        Ok(trial)
    }

    /// Optimizer-facing form of [`evaluate`](Self::evaluate): negative AUC.
    pub fn objective(&mut self, params: &ParamMap) -> TuneResult<Evaluation> {
        let hp = from_params(params)?;
        let outcome = self.evaluate(&hp)?;
        Ok(Evaluation::new(-outcome.validation_auc)
            .with_metric("auc", outcome.validation_auc)
            .with_metric("epochs", outcome.epochs as f64))
    }
}
