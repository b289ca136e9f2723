//! Experiment configuration.
//!
//! [`TuneConfig::default`] is the reference experiment. A JSON file named by
//! the `EVENTTUNE_CONFIG` environment variable may override any subset of it.

use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

use crate::config_error;
use crate::errors::TuneResult;
use crate::hyperparams::Hyperparameters;

/// Environment variable naming an optional JSON override file.
pub const CONFIG_ENV_VAR: &str = "EVENTTUNE_CONFIG";

/// Top-level configuration for a tuning run.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, Default)]
#[serde(default)]
pub struct TuneConfig {
    pub data: DataSettings,
    pub split: SplitSettings,
    pub search: SearchSettings,
    pub training: TrainingSettings,
    pub output: OutputSettings,
}

/// Input files and the columns read from them
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct DataSettings {
    pub signal_path: PathBuf,
    pub background_path: PathBuf,
    /// Engineered feature columns fed to the classifier, in order.
    pub features: Vec<String>,
    pub weight_column: String,
}

impl Default for DataSettings {
    fn default() -> Self {
        let features = [
            "lep1_pt",
            "lep1_eta",
            "lep2_pt",
            "lep2_eta",
            "met",
            "mll",
            "mt_ll_met",
            "delta_phi_ll",
            "jet1_pt",
            "jet2_pt",
            "mjj",
            "delta_eta_jj",
            "n_jets",
        ];
        Self {
            signal_path: PathBuf::from("data/signal.parquet"),
            background_path: PathBuf::from("data/background.parquet"),
            features: features.iter().map(|s| s.to_string()).collect(),
            weight_column: "weight".to_string(),
        }
    }
}

/// Train/validation/test partitioning
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct SplitSettings {
    /// Fraction of all events held out for the final test.
    pub test_fraction: f64,
    /// Fraction of the remaining events used for validation.
    pub validation_fraction: f64,
    pub seed: u64,
}

impl Default for SplitSettings {
    fn default() -> Self {
        Self {
            test_fraction: 0.2,
            validation_fraction: 0.2,
            seed: 42,
        }
    }
}

/// Search space bounds and Bayesian optimizer settings
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct SearchSettings {
    /// Log-uniform bounds.
    pub learning_rate: (f64, f64),
    pub layer1_units: (usize, usize),
    pub layer2_units: (usize, usize),
    pub dropout: (f64, f64),
    /// First point evaluated, before any random exploration.
    pub initial_point: Option<Hyperparameters>,
    /// Total number of objective evaluations.
    pub n_calls: usize,
    /// Evaluations made before the surrogate model is consulted.
    pub n_initial_points: usize,
    /// Expected-improvement exploration margin.
    pub xi: f64,
    /// Random candidates scored per acquisition step.
    pub n_candidates: usize,
    pub seed: u64,
}

impl Default for SearchSettings {
    fn default() -> Self {
        Self {
            learning_rate: (1e-5, 1e-2),
            layer1_units: (8, 256),
            layer2_units: (8, 256),
            dropout: (0.0, 0.5),
            initial_point: Some(Hyperparameters::default()),
            n_calls: 40,
            n_initial_points: 10,
            xi: 0.01,
            n_candidates: 2000,
            seed: 42,
        }
    }
}

/// Per-trial training loop settings
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct TrainingSettings {
    pub max_epochs: usize,
    pub batch_size: usize,
    /// Epochs without improvement before early stopping.
    pub patience: usize,
    pub min_delta: f32,
    pub seed: u64,
}

impl Default for TrainingSettings {
    fn default() -> Self {
        Self {
            max_epochs: 500,
            batch_size: 256,
            patience: 10,
            min_delta: 1e-4,
            seed: 7,
        }
    }
}

/// Where trial logs, the score log and the best model are written
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct OutputSettings {
    /// One sub-directory per trial, named by its descriptor.
    pub log_dir: PathBuf,
    pub score_log: PathBuf,
    pub best_model: PathBuf,
}

impl Default for OutputSettings {
    fn default() -> Self {
        Self {
            log_dir: PathBuf::from("logs"),
            score_log: PathBuf::from("scores.txt"),
            best_model: PathBuf::from("best_model.json"),
        }
    }
}

impl TuneConfig {
    /// Read a JSON config file; omitted fields keep their defaults.
    pub fn load<P: AsRef<Path>>(path: P) -> TuneResult<Self> {
        let path = path.as_ref();
        let raw = std::fs::read_to_string(path)
            .map_err(|e| config_error!("cannot read {}: {}", path.display(), e))?;
        let config: TuneConfig = serde_json::from_str(&raw)?;
        config.validate()?;
        tracing::info!("Loaded configuration from {}", path.display());
        Ok(config)
    }

    /// Use the file named by `EVENTTUNE_CONFIG`, or the defaults when unset.
    pub fn from_env() -> TuneResult<Self> {
        Self::from_override(std::env::var(CONFIG_ENV_VAR).ok().as_deref())
    }

    /// The reference defaults unless `path` names an override file.
    pub fn from_override(path: Option<&str>) -> TuneResult<Self> {
        match path {
            Some(path) if !path.trim().is_empty() => Self::load(path),
            _ => {
                let config = Self::default();
                config.validate()?;
                Ok(config)
            }
        }
    }

    pub fn validate(&self) -> TuneResult<()> {
        if self.data.features.is_empty() {
            return Err(config_error!("at least one feature column is required"));
        }
        if self.data.features.iter().any(|f| f == &self.data.weight_column) {
            return Err(config_error!(
                "weight column '{}' cannot also be a feature",
                self.data.weight_column
            ));
        }

        let fractions = [
            ("test_fraction", self.split.test_fraction),
            ("validation_fraction", self.split.validation_fraction),
        ];
        for (name, value) in fractions {
            if !(value > 0.0 && value < 1.0) {
                return Err(config_error!("{} must lie in (0, 1), got {}", name, value));
            }
        }

        let s = &self.search;
        if !(s.learning_rate.0 > 0.0 && s.learning_rate.0 < s.learning_rate.1) {
            return Err(config_error!(
                "learning rate bounds must be positive and increasing, got {:?}",
                s.learning_rate
            ));
        }
        for (name, (low, high)) in [("layer1_units", s.layer1_units), ("layer2_units", s.layer2_units)] {
            if low == 0 || low > high {
                return Err(config_error!("{} bounds invalid: ({}, {})", name, low, high));
            }
        }
        if !(s.dropout.0 >= 0.0 && s.dropout.0 <= s.dropout.1 && s.dropout.1 < 1.0) {
            return Err(config_error!("dropout bounds invalid: {:?}", s.dropout));
        }
        if s.n_calls == 0 {
            return Err(config_error!("n_calls must be positive"));
        }
        if s.n_candidates == 0 {
            return Err(config_error!("n_candidates must be positive"));
        }
        if let Some(point) = &s.initial_point {
            point.validate()?;
            let inside = point.learning_rate >= s.learning_rate.0
                && point.learning_rate <= s.learning_rate.1
                && point.layer1_units >= s.layer1_units.0
                && point.layer1_units <= s.layer1_units.1
                && point.layer2_units >= s.layer2_units.0
                && point.layer2_units <= s.layer2_units.1
                && point.dropout >= s.dropout.0
                && point.dropout <= s.dropout.1;
            if !inside {
                return Err(config_error!("initial point {} lies outside the search space", point));
            }
        }

        if self.training.max_epochs == 0 || self.training.batch_size == 0 {
            return Err(config_error!("max_epochs and batch_size must be positive"));
        }
        if self.training.patience == 0 {
            return Err(config_error!("patience must be positive"));
        }

        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    #[test]
    fn default_config_is_valid() {
        let config = TuneConfig::default();
        assert!(config.validate().is_ok());
        assert_eq!(config.training.max_epochs, 500);
        assert_eq!(config.search.n_calls, 40);
    }

    #[test]
    fn no_override_means_reference_defaults() {
        assert_eq!(TuneConfig::from_override(None).unwrap(), TuneConfig::default());
        assert_eq!(TuneConfig::from_override(Some("  ")).unwrap(), TuneConfig::default());

        let mut file = tempfile::NamedTempFile::new().unwrap();
        write!(file, r#"{{"training": {{"patience": 4}}}}"#).unwrap();
        let path = file.path().to_string_lossy().into_owned();
        let overridden = TuneConfig::from_override(Some(&path)).unwrap();
        assert_eq!(overridden.training.patience, 4);
        assert_eq!(overridden.search, TuneConfig::default().search);
    }

    #[test]
    fn partial_json_keeps_defaults() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        write!(
            file,
            r#"{{"search": {{"n_calls": 12}}, "output": {{"log_dir": "runs"}}}}"#
        )
        .unwrap();

        let config = TuneConfig::load(file.path()).unwrap();
        assert_eq!(config.search.n_calls, 12);
        assert_eq!(config.search.n_initial_points, 10);
        assert_eq!(config.output.log_dir, PathBuf::from("runs"));
        assert_eq!(config.output.score_log, PathBuf::from("scores.txt"));
        assert_eq!(config.data, DataSettings::default());
    }

    #[test]
    fn rejects_weight_as_feature() {
        let mut config = TuneConfig::default();
        config.data.features.push("weight".to_string());
        assert!(matches!(config.validate(), Err(crate::TuneError::Config(_))));
    }

    #[test]
    fn rejects_bad_fractions_and_bounds() {
        let mut config = TuneConfig::default();
        config.split.test_fraction = 1.0;
        assert!(config.validate().is_err());

        let mut config = TuneConfig::default();
        config.search.learning_rate = (0.0, 1e-2);
        assert!(config.validate().is_err());

        let mut config = TuneConfig::default();
        config.search.layer1_units = (64, 8);
        assert!(config.validate().is_err());
    }

    #[test]
    fn rejects_initial_point_outside_space() {
        let mut config = TuneConfig::default();
        config.search.initial_point = Some(Hyperparameters::new(1e-3, 512, 32, 0.2));
        assert!(config.validate().is_err());
    }

    #[test]
    fn missing_file_is_config_error() {
        let err = TuneConfig::load("/nonexistent/eventtune.json").unwrap_err();
        assert!(matches!(err, crate::TuneError::Config(_)));
    }
}
