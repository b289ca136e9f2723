//! Sequential optimization loop.

use std::collections::HashMap;
use std::time::Instant;

use et_types::{OptimizerError, TuneResult};

use crate::search::{BayesianSearch, ParamMap, RandomSearch, SearchStrategy};
use crate::trial::{OptimizationConfig, OptimizationStatus, StrategyKind, Trial, TrialResult};

/// What an objective returns for one point.
#[derive(Debug, Clone, PartialEq)]
pub struct Evaluation {
    pub objective: f64,
    /// Extra values recorded on the trial (e.g. epochs trained).
    pub metrics: HashMap<String, f64>,
}

impl Evaluation {
    pub fn new(objective: f64) -> Self {
        Self {
            objective,
            metrics: HashMap::new(),
        }
    }

    pub fn with_metric(mut self, name: impl Into<String>, value: f64) -> Self {
        self.metrics.insert(name.into(), value);
        self
    }
}

/// Runs trials one after another, feeding each result back to the strategy
/// before asking for the next point.
pub struct Minimizer {
    config: OptimizationConfig,
    strategy: Box<dyn SearchStrategy>,
    status: OptimizationStatus,
}

impl Minimizer {
    pub fn new(config: OptimizationConfig) -> TuneResult<Self> {
        config.search_space.validate()?;
        if config.max_trials == 0 {
            return Err(OptimizerError::InvalidSpace {
                message: "max_trials must be at least 1".to_string(),
            }
            .into());
        }
        if let Some(point) = &config.initial_point {
            config.search_space.to_unit(point)?;
        }

        let space = config.search_space.clone();
        let strategy: Box<dyn SearchStrategy> = match config.strategy {
            StrategyKind::Random => Box::new(RandomSearch::with_seed(space, config.bayesian.seed)),
            StrategyKind::Bayesian => {
                let mut search = BayesianSearch::new(space, config.bayesian.clone());
                if let Some(point) = &config.initial_point {
                    search = search.with_initial_point(point.clone());
                }
                Box::new(search)
            }
        };

        let status = OptimizationStatus::new(config.clone());
        Ok(Self {
            config,
            strategy,
            status,
        })
    }

    pub fn config(&self) -> &OptimizationConfig {
        &self.config
    }

    /// Progress so far; after a failed run it holds the failed trial.
    pub fn status(&self) -> &OptimizationStatus {
        &self.status
    }

    /// Evaluate `max_trials` points. The first objective error aborts the run
    /// and is returned unchanged, with the trial and run marked failed.
    pub fn run<F>(&mut self, mut objective: F) -> TuneResult<OptimizationStatus>
    where
        F: FnMut(&ParamMap) -> TuneResult<Evaluation>,
    {
        let status = &mut self.status;
        status.mark_running();

        tracing::info!(
            "Starting optimization '{}': {} trials, {} strategy",
            self.config.name,
            self.config.max_trials,
            self.strategy.name()
        );

        for trial_number in 1..=self.config.max_trials {
            let Some(params) = self.strategy.suggest(1).pop() else {
                break;
            };

            let mut trial = Trial::new(status.id, trial_number, params.clone());
            trial.mark_running();
            let started = Instant::now();

            let evaluation = match objective(&params) {
                Ok(evaluation) => evaluation,
                Err(e) => {
                    tracing::error!(
                        "Trial {} failed after {} completed: {}",
                        trial_number,
                        status.trials_completed,
                        e
                    );
                    trial.mark_failed(e.to_string());
                    status.trials_failed += 1;
                    status.trials.push(trial);
                    status.mark_failed(format!("trial {} failed: {}", trial_number, e));
                    return Err(e);
                }
            };

            let result = TrialResult {
                trial_id: trial.id,
                trial_number,
                objective: evaluation.objective,
                metrics: evaluation.metrics,
                parameters: params.clone(),
                duration_seconds: Some(started.elapsed().as_secs_f64()),
            };

            self.strategy
                .report(&params, self.config.direction.to_loss(result.objective));
            status.update_best(&result);
            trial.mark_completed(result);
            status.trials_completed += 1;
            status.trials.push(trial);

            tracing::info!(
                "Trial {}/{}: {} = {:.6} (best {:.6})",
                trial_number,
                self.config.max_trials,
                self.config.objective_metric,
                evaluation.objective,
                status.best_trial.as_ref().map_or(f64::NAN, |b| b.objective)
            );
        }

        status.mark_completed();
        Ok(status.clone())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::search::{BayesianConfig, ParameterValue, SearchSpace};
    use crate::trial::{ObjectiveDirection, OptimizationState, TrialStatus};
    use et_types::TuneError;

    fn quadratic_config(strategy: StrategyKind) -> OptimizationConfig {
        let space = SearchSpace::new()
            .add_float("x", -2.0, 2.0)
            .add_int("n", 1, 9);
        OptimizationConfig::new("quadratic".into(), space, strategy)
            .with_max_trials(25)
            .with_bayesian(BayesianConfig {
                n_initial_points: 5,
                n_candidates: 300,
                seed: 11,
                ..Default::default()
            })
    }

    fn quadratic(p: &ParamMap) -> TuneResult<Evaluation> {
        let x = p["x"].as_f64();
        let n = p["n"].as_f64();
        Ok(Evaluation::new((x - 0.5).powi(2) + 0.1 * (n - 4.0).powi(2)).with_metric("x", x))
    }

    #[test]
    fn runs_every_trial_in_order() {
        let mut minimizer = Minimizer::new(quadratic_config(StrategyKind::Bayesian)).unwrap();
        let status = minimizer.run(quadratic).unwrap();
        assert_eq!(minimizer.status(), &status);

        assert_eq!(status.state, OptimizationState::Completed);
        assert_eq!(status.trials_completed, 25);
        assert_eq!(status.trials.len(), 25);
        let numbers: Vec<usize> = status.trials.iter().map(|t| t.trial_number).collect();
        assert_eq!(numbers, (1..=25).collect::<Vec<_>>());

        let best = status.best_trial.as_ref().unwrap();
        let min = status
            .objective_history()
            .into_iter()
            .fold(f64::INFINITY, f64::min);
        assert_eq!(best.objective, min);
        assert!(best.metrics.contains_key("x"));
    }

    #[test]
    fn bayesian_beats_first_random_points() {
        let status = Minimizer::new(quadratic_config(StrategyKind::Bayesian))
            .unwrap()
            .run(quadratic)
            .unwrap();
        let history = status.objective_history();
        let warmup_best = history[..5].iter().copied().fold(f64::INFINITY, f64::min);
        let overall_best = history.iter().copied().fold(f64::INFINITY, f64::min);
        assert!(overall_best <= warmup_best);
        assert!(overall_best < 0.2, "best {overall_best}");
    }

    #[test]
    fn initial_point_is_evaluated_first() {
        let mut start = ParamMap::new();
        start.insert("x".into(), ParameterValue::Float(1.5));
        start.insert("n".into(), ParameterValue::Int(2));

        let config = quadratic_config(StrategyKind::Bayesian)
            .with_max_trials(3)
            .with_initial_point(start.clone());
        let status = Minimizer::new(config).unwrap().run(quadratic).unwrap();
        assert_eq!(status.trials[0].parameters, start);
    }

    #[test]
    fn initial_point_outside_space_is_rejected() {
        let mut start = ParamMap::new();
        start.insert("x".into(), ParameterValue::Float(7.0));
        start.insert("n".into(), ParameterValue::Int(2));
        let config = quadratic_config(StrategyKind::Bayesian).with_initial_point(start);
        assert!(Minimizer::new(config).is_err());
    }

    #[test]
    fn maximize_direction_tracks_largest() {
        let config = quadratic_config(StrategyKind::Random)
            .with_max_trials(10)
            .with_objective("score", ObjectiveDirection::Maximize);
        let status = Minimizer::new(config).unwrap().run(quadratic).unwrap();
        let max = status
            .objective_history()
            .into_iter()
            .fold(f64::NEG_INFINITY, f64::max);
        assert_eq!(status.best_trial.unwrap().objective, max);
    }

    #[test]
    fn objective_error_aborts_run() {
        let mut calls = 0;
        let mut minimizer = Minimizer::new(quadratic_config(StrategyKind::Random)).unwrap();
        let result = minimizer.run(|p| {
            calls += 1;
            if calls == 3 {
                Err(TuneError::Internal("boom".into()))
            } else {
                quadratic(p)
            }
        });
        assert!(matches!(result, Err(TuneError::Internal(_))));
        assert_eq!(calls, 3);

        let status = minimizer.status();
        assert_eq!(status.state, OptimizationState::Failed);
        assert_eq!(status.trials_completed, 2);
        assert_eq!(status.trials_failed, 1);
        assert!(status.finished_at.is_some());
        assert!(status.error.as_deref().is_some_and(|e| e.contains("boom")));

        let failed = status.trials.last().unwrap();
        assert_eq!(failed.trial_number, 3);
        assert_eq!(failed.status, TrialStatus::Failed);
        assert!(failed.result.is_none());
        assert_eq!(failed.error.as_deref(), Some("Internal error: boom"));

        // failed trials carry no objective
        assert_eq!(status.objective_history().len(), 2);
    }

    #[test]
    fn zero_trials_is_rejected() {
        let config = quadratic_config(StrategyKind::Random).with_max_trials(0);
        assert!(Minimizer::new(config).is_err());
    }
}
