//! Mapping between [`Hyperparameters`] and optimizer points.

use et_optimizer::{
    AcquisitionFunction, BayesianConfig, ObjectiveDirection, OptimizationConfig, ParamMap,
    ParameterValue, SearchSpace, StrategyKind,
};
use et_types::{Hyperparameters, OptimizerError, SearchSettings, TuneResult};

/// Name of the minimized objective.
pub const OBJECTIVE_METRIC: &str = "neg_auc";

/// Four-dimensional space: log-uniform learning rate, two integer widths and
/// a uniform dropout rate.
pub fn search_space(settings: &SearchSettings) -> SearchSpace {
    SearchSpace::new()
        .add_log_uniform(
            Hyperparameters::LEARNING_RATE,
            settings.learning_rate.0,
            settings.learning_rate.1,
        )
        .add_int(
            Hyperparameters::LAYER1_UNITS,
            settings.layer1_units.0 as i64,
            settings.layer1_units.1 as i64,
        )
        .add_int(
            Hyperparameters::LAYER2_UNITS,
            settings.layer2_units.0 as i64,
            settings.layer2_units.1 as i64,
        )
        .add_float(Hyperparameters::DROPOUT, settings.dropout.0, settings.dropout.1)
}

pub fn to_params(hp: &Hyperparameters) -> ParamMap {
    let mut params = ParamMap::new();
    params.insert(
        Hyperparameters::LEARNING_RATE.to_string(),
        ParameterValue::Float(hp.learning_rate),
    );
    params.insert(
        Hyperparameters::LAYER1_UNITS.to_string(),
        ParameterValue::Int(hp.layer1_units as i64),
    );
    params.insert(
        Hyperparameters::LAYER2_UNITS.to_string(),
        ParameterValue::Int(hp.layer2_units as i64),
    );
    params.insert(Hyperparameters::DROPOUT.to_string(), ParameterValue::Float(hp.dropout));
    params
}

fn lookup<'a>(params: &'a ParamMap, name: &str) -> TuneResult<&'a ParameterValue> {
    params.get(name).ok_or_else(|| {
        OptimizerError::ParameterError {
            parameter: name.to_string(),
            message: "missing from suggested point".to_string(),
        }
        .into()
    })
}

fn units(params: &ParamMap, name: &str) -> TuneResult<usize> {
    let value = lookup(params, name)?;
    match value.as_i64() {
        Some(v) if v > 0 => Ok(v as usize),
        _ => Err(OptimizerError::ParameterError {
            parameter: name.to_string(),
            message: format!("expected a positive integer, got {value}"),
        }
        .into()),
    }
}

pub fn from_params(params: &ParamMap) -> TuneResult<Hyperparameters> {
    let hp = Hyperparameters::new(
        lookup(params, Hyperparameters::LEARNING_RATE)?.as_f64(),
        units(params, Hyperparameters::LAYER1_UNITS)?,
        units(params, Hyperparameters::LAYER2_UNITS)?,
        lookup(params, Hyperparameters::DROPOUT)?.as_f64(),
    );
    hp.validate()?;
    Ok(hp)
}

/// Bayesian run minimizing negative validation AUC.
pub fn optimization_config(settings: &SearchSettings) -> OptimizationConfig {
    let mut config = OptimizationConfig::new(
        "event-tune".to_string(),
        search_space(settings),
        StrategyKind::Bayesian,
    )
    .with_description("signal/background classifier hyperparameter search")
    .with_max_trials(settings.n_calls)
    .with_objective(OBJECTIVE_METRIC, ObjectiveDirection::Minimize)
    .with_bayesian(BayesianConfig {
        n_initial_points: settings.n_initial_points,
        acquisition: AcquisitionFunction::ExpectedImprovement { xi: settings.xi },
        n_candidates: settings.n_candidates,
        seed: settings.seed,
        ..Default::default()
    });
    if let Some(point) = &settings.initial_point {
        config = config.with_initial_point(to_params(point));
    }
    config
}
