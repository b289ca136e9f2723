//! Saved best model.
//!
//! Two files: the network record written by burn's `NamedMpkFileRecorder`
//! beside a JSON metadata file holding the hyperparameters, feature order,
//! scaler and scores. The metadata names its weights file.

use std::path::{Path, PathBuf};

use burn::module::Module;
use burn::record::{FullPrecisionSettings, NamedMpkFileRecorder, Recorder};
use burn::tensor::backend::Backend;
use chrono::{DateTime, Utc};
use et_data::StandardScaler;
use et_types::{Hyperparameters, ModelError, TuneResult};
use ndarray::{Array1, Array2};
use serde::{Deserialize, Serialize};

use crate::network::ClassifierNetwork;
use crate::InferenceBackend;

/// Extension burn gives the weights file.
pub const WEIGHTS_EXTENSION: &str = "mpk";

fn artifact_error(message: String) -> et_types::TuneError {
    ModelError::Artifact { message }.into()
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
struct ArtifactMetadata {
    hyperparameters: Hyperparameters,
    feature_names: Vec<String>,
    scaler: StandardScaler,
    validation_auc: f64,
    epochs: usize,
    saved_at: DateTime<Utc>,
    /// File name of the weights, relative to the metadata file.
    weights_file: String,
}

/// Everything needed to score new events with a trained classifier.
#[derive(Debug)]
pub struct ModelArtifact {
    pub hyperparameters: Hyperparameters,
    pub feature_names: Vec<String>,
    pub scaler: StandardScaler,
    pub network: ClassifierNetwork<InferenceBackend>,
    pub validation_auc: f64,
    pub epochs: usize,
    pub saved_at: DateTime<Utc>,
}

/// Where the weights for the metadata file at `path` live.
pub fn weights_path(path: &Path) -> PathBuf {
    path.with_extension(WEIGHTS_EXTENSION)
}

impl ModelArtifact {
    pub fn new(
        hyperparameters: Hyperparameters,
        feature_names: Vec<String>,
        scaler: StandardScaler,
        network: ClassifierNetwork<InferenceBackend>,
        validation_auc: f64,
        epochs: usize,
    ) -> Self {
        Self {
            hyperparameters,
            feature_names,
            scaler,
            network,
            validation_auc,
            epochs,
            saved_at: Utc::now(),
        }
    }

    /// Write weights then metadata, replacing any earlier model at `path`.
    pub fn save<P: AsRef<Path>>(&self, path: P) -> TuneResult<()> {
        let path = path.as_ref();
        if path.extension().is_some_and(|ext| ext == WEIGHTS_EXTENSION) {
            return Err(artifact_error(format!(
                "metadata path {} collides with the weights file",
                path.display()
            )));
        }
        if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
            std::fs::create_dir_all(parent)?;
        }

        let weights = weights_path(path);
        let recorder = NamedMpkFileRecorder::<FullPrecisionSettings>::new();
        recorder
            .record(self.network.clone().into_record(), weights.clone())
            .map_err(|e| artifact_error(format!("cannot write {}: {}", weights.display(), e)))?;

        let metadata = ArtifactMetadata {
            hyperparameters: self.hyperparameters,
            feature_names: self.feature_names.clone(),
            scaler: self.scaler.clone(),
            validation_auc: self.validation_auc,
            epochs: self.epochs,
            saved_at: self.saved_at,
            weights_file: weights
                .file_name()
                .map(|name| name.to_string_lossy().into_owned())
                .unwrap_or_default(),
        };

        // metadata last, renamed into place
        let mut tmp = path.as_os_str().to_owned();
        tmp.push(".tmp");
        let tmp = PathBuf::from(tmp);
        std::fs::write(&tmp, serde_json::to_vec_pretty(&metadata)?)?;
        std::fs::rename(&tmp, path)?;

        tracing::info!(
            "Saved model {} (validation AUC {:.5}) to {}",
            self.hyperparameters.descriptor(),
            self.validation_auc,
            path.display()
        );
        Ok(())
    }

    pub fn load<P: AsRef<Path>>(path: P) -> TuneResult<Self> {
        let path = path.as_ref();
        let raw = std::fs::read(path)
            .map_err(|e| artifact_error(format!("cannot read {}: {}", path.display(), e)))?;
        let metadata: ArtifactMetadata = serde_json::from_slice(&raw)?;
        metadata.hyperparameters.validate()?;

        let weights = path.with_file_name(&metadata.weights_file);
        let device = <InferenceBackend as Backend>::Device::default();
        let recorder = NamedMpkFileRecorder::<FullPrecisionSettings>::new();
        let record = recorder
            .load(weights.clone(), &device)
            .map_err(|e| artifact_error(format!("cannot read {}: {}", weights.display(), e)))?;

        let network = ClassifierNetwork::new(
            &device,
            &metadata.hyperparameters,
            metadata.feature_names.len(),
        )
        .load_record(record);

        Ok(Self {
            hyperparameters: metadata.hyperparameters,
            feature_names: metadata.feature_names,
            scaler: metadata.scaler,
            network,
            validation_auc: metadata.validation_auc,
            epochs: metadata.epochs,
            saved_at: metadata.saved_at,
        })
    }

    /// Score unscaled events, columns ordered as `feature_names`.
    pub fn predict(&self, raw_features: &Array2<f32>) -> TuneResult<Array1<f32>> {
        let scaled = self.scaler.transform(raw_features)?;
        self.network.predict(&scaled)
    }
}
