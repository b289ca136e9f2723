use std::fmt::Write as _;
use std::path::Path;

use et_model::{weights_path, ModelArtifact, TrainingHistory, HISTORY_FILE};
use et_tuner::{ScoreLog, TuneSummary};
use et_types::{Hyperparameters, TuneConfig, TuneError};
use rand::{Rng, SeedableRng};
use rand_chacha::ChaCha8Rng;
use tempfile::TempDir;

const FEATURES: [&str; 3] = ["met", "mll", "mjj"];

/// Write `rows` events centred on `centre`, with a trailing weight column.
fn write_events(path: &Path, rows: usize, centre: f64, weight: f64, seed: u64) {
    let mut rng = ChaCha8Rng::seed_from_u64(seed);
    let mut text = format!("{},weight\n", FEATURES.join(","));
    for _ in 0..rows {
        let met = 40.0 + 15.0 * (centre + rng.random_range(-1.2..1.2));
        let mll = 90.0 + 10.0 * (centre + rng.random_range(-1.2..1.2));
        let mjj = 500.0 + 200.0 * (centre + rng.random_range(-1.2..1.2));
        writeln!(text, "{met:.4},{mll:.4},{mjj:.4},{weight}").unwrap();
    }
    std::fs::write(path, text).unwrap();
}

fn small_config(dir: &Path) -> TuneConfig {
    let mut config = TuneConfig::default();
    config.data.signal_path = dir.join("signal.csv");
    config.data.background_path = dir.join("background.csv");
    config.data.features = FEATURES.iter().map(|s| s.to_string()).collect();

    config.search.n_calls = 4;
    config.search.n_initial_points = 2;
    config.search.n_candidates = 100;

    config.training.max_epochs = 8;
    config.training.batch_size = 64;
    config.training.patience = 3;

    config.output.log_dir = dir.join("logs");
    config.output.score_log = dir.join("scores.txt");
    config.output.best_model = dir.join("best_model.json");
    config
}

async fn run_small(dir: &TempDir) -> (TuneConfig, TuneSummary) {
    write_events(&dir.path().join("signal.csv"), 150, 1.0, 0.2, 1);
    write_events(&dir.path().join("background.csv"), 450, -1.0, 3.0, 2);
    let config = small_config(dir.path());
    let summary = et_tuner::run(config.clone()).await.unwrap();
    (config, summary)
}

#[tokio::test]
async fn full_run_logs_every_trial() {
    let dir = TempDir::new().unwrap();
    let (config, summary) = run_small(&dir).await;

    assert_eq!(summary.trials_completed, 4);

    let log = ScoreLog::new(&config.output.score_log);
    let entries = log.read_entries().unwrap();
    assert_eq!(entries.len(), 4);

    // initial point is evaluated first
    assert_eq!(entries[0].descriptor, Hyperparameters::default().trial_name(1));
    for (i, entry) in entries.iter().enumerate() {
        assert!(entry.descriptor.starts_with(&format!("trial_{:03}_", i + 1)));
    }

    for entry in &entries {
        assert!(entry.epochs >= 1 && entry.epochs <= 8);
        let history_path = config.output.log_dir.join(&entry.descriptor).join(HISTORY_FILE);
        assert!(history_path.exists(), "missing {}", history_path.display());
        let history = TrainingHistory::read_csv(&history_path).unwrap();
        assert_eq!(history.epochs(), entry.epochs);
    }
}

#[tokio::test]
async fn best_model_matches_best_score_line() {
    let dir = TempDir::new().unwrap();
    let (config, summary) = run_small(&dir).await;

    let best_line = ScoreLog::new(&config.output.score_log)
        .best_entry()
        .unwrap()
        .unwrap();
    assert_eq!(best_line.auc, summary.validation_auc);
    assert_eq!(best_line.descriptor, summary.best_descriptor);

    assert!(weights_path(&config.output.best_model).exists());
    let artifact = ModelArtifact::load(&config.output.best_model).unwrap();
    assert_eq!(artifact.validation_auc, summary.validation_auc);
    assert_eq!(artifact.hyperparameters, summary.best_hyperparameters);
    assert_eq!(artifact.epochs, best_line.epochs);
    assert_eq!(artifact.feature_names, config.data.features);

    assert!(summary.validation_auc > 0.5);
    assert!(summary.test_auc > 0.5 && summary.test_auc <= 1.0);

    let json = serde_json::to_string(&summary).unwrap();
    let back: TuneSummary = serde_json::from_str(&json).unwrap();
    assert_eq!(back, summary);
}

#[tokio::test]
async fn missing_input_fails_before_any_trial() {
    let dir = TempDir::new().unwrap();
    write_events(&dir.path().join("signal.csv"), 50, 1.0, 1.0, 1);
    let config = small_config(dir.path());

    let err = et_tuner::run(config.clone()).await.unwrap_err();
    assert!(matches!(err, TuneError::Data(_)), "unexpected error: {err}");
    assert!(!config.output.score_log.exists());
    assert!(!config.output.best_model.exists());
}
