//! End-to-end tuning run.

use std::path::PathBuf;

use chrono::{DateTime, Utc};
use et_data::{balance_classes, split_events, DataManager, StandardScaler};
use et_model::{ModelArtifact, TrainingConfig};
use et_optimizer::{Minimizer, OptimizationId};
use et_types::{
    internal_error, EventClass, EventTable, Hyperparameters, ModelError, OptimizerError,
    SplitSettings, TuneConfig, TuneResult,
};
use serde::{Deserialize, Serialize};

use crate::fitness::FitnessEvaluator;
use crate::params::optimization_config;

/// Scaled partitions plus the scaler fitted on the training rows.
#[derive(Debug, Clone)]
pub struct PreparedData {
    pub feature_names: Vec<String>,
    pub scaler: StandardScaler,
    pub train: EventTable,
    pub validation: EventTable,
    pub test: EventTable,
}

/// What a finished run reports.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TuneSummary {
    pub optimization_id: OptimizationId,
    pub trials_completed: usize,
    pub best_descriptor: String,
    pub best_hyperparameters: Hyperparameters,
    pub validation_auc: f64,
    /// AUC of the saved best model on the held-out test partition.
    pub test_auc: f64,
    pub best_model_path: PathBuf,
    pub score_log_path: PathBuf,
    pub started_at: Option<DateTime<Utc>>,
    pub finished_at: Option<DateTime<Utc>>,
}

/// Balance, split and scale already-loaded signal and background tables.
pub fn prepare_tables(
    signal: &EventTable,
    background: &EventTable,
    split: &SplitSettings,
) -> TuneResult<PreparedData> {
    let events = balance_classes(signal, background)?;
    let parts = split_events(&events, split.test_fraction, split.validation_fraction, split.seed)?;

    let scaler = StandardScaler::fit(&parts.train.features)?;
    let train = scaler.transform_table(&parts.train)?;
    let validation = scaler.transform_table(&parts.validation)?;
    let test = scaler.transform_table(&parts.test)?;

    tracing::info!(
        "Prepared {} train / {} validation / {} test events ({} signal, {} background in train)",
        train.len(),
        validation.len(),
        test.len(),
        train.class_count(EventClass::Signal),
        train.class_count(EventClass::Background)
    );

    Ok(PreparedData {
        feature_names: events.feature_names.clone(),
        scaler,
        train,
        validation,
        test,
    })
}

/// Load both input files and prepare the partitions.
pub async fn prepare_data(config: &TuneConfig) -> TuneResult<PreparedData> {
    let samples = DataManager::new(config.data.clone()).load_samples().await?;
    prepare_tables(&samples.signal, &samples.background, &config.split)
}

/// Run the search over prepared data, then score the best model on the test set.
pub fn optimize(config: &TuneConfig, data: &PreparedData) -> TuneResult<TuneSummary> {
    let mut minimizer = Minimizer::new(optimization_config(&config.search))?;
    let mut fitness = FitnessEvaluator::new(
        data,
        TrainingConfig::from(&config.training),
        config.output.clone(),
    );

    let status = minimizer.run(|params| fitness.objective(params))?;
    if status.best_trial.is_none() {
        return Err(OptimizerError::NoTrials.into());
    }

    // the saved model, not the optimizer's record, names the winner
    let Some(saved) = fitness.best_trial() else {
        return Err(ModelError::Artifact {
            message: "no trial produced a model with positive AUC".to_string(),
        }
        .into());
    };
    let best_descriptor = saved.descriptor.clone();
    let best_hyperparameters = saved.hyperparameters;
    let artifact = ModelArtifact::load(&config.output.best_model)?;
    if artifact.feature_names != data.feature_names {
        return Err(ModelError::Artifact {
            message: format!("saved model expects features {:?}", artifact.feature_names),
        }
        .into());
    }
    let test_auc = FitnessEvaluator::auc(&artifact.network, &data.test)?;

    tracing::info!(
        "Best of {} trials: {} (validation AUC {:.5}, test AUC {:.5})",
        status.trials_completed,
        best_descriptor,
        fitness.best_auc(),
        test_auc
    );

    Ok(TuneSummary {
        optimization_id: status.id,
        trials_completed: status.trials_completed,
        best_descriptor,
        best_hyperparameters,
        validation_auc: fitness.best_auc(),
        test_auc,
        best_model_path: config.output.best_model.clone(),
        score_log_path: config.output.score_log.clone(),
        started_at: status.started_at,
        finished_at: status.finished_at,
    })
}

/// Full run: load, prepare, search, report.
pub async fn run(config: TuneConfig) -> TuneResult<TuneSummary> {
    config.validate()?;
    let data = prepare_data(&config).await?;

    tokio::task::spawn_blocking(move || optimize(&config, &data))
        .await
        .map_err(|e| internal_error!("optimization task failed: {}", e))?
}
