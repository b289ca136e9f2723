//! Search space definitions and parameter sweep strategies.

use rand::{Rng, SeedableRng};
use rand_chacha::ChaCha8Rng;
use rayon::prelude::*;
use serde::{Deserialize, Serialize};
use std::collections::{HashMap, VecDeque};

use et_types::{OptimizerError, TuneResult};

use crate::acquisition::AcquisitionFunction;
use crate::gp::GaussianProcess;

/// A single parameter dimension in the search space.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ParameterDef {
    /// Human-readable parameter name (e.g. "learning_rate").
    pub name: String,
    /// The kind of search range.
    pub kind: ParameterKind,
}

/// Describes how a parameter is sampled.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum ParameterKind {
    /// Continuous uniform range [low, high].
    FloatRange { low: f64, high: f64 },
    /// Integer range [low, high] inclusive.
    IntRange { low: i64, high: i64 },
    /// Log-uniform range (sampled in log-space then exponentiated).
    LogUniform { low: f64, high: f64 },
}

/// A concrete parameter value produced by a search strategy.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum ParameterValue {
    Int(i64),
    Float(f64),
}

impl ParameterValue {
    pub fn as_f64(&self) -> f64 {
        match self {
            Self::Float(v) => *v,
            Self::Int(v) => *v as f64,
        }
    }

    pub fn as_i64(&self) -> Option<i64> {
        match self {
            Self::Int(v) => Some(*v),
            Self::Float(_) => None,
        }
    }
}

impl std::fmt::Display for ParameterValue {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Float(v) => write!(f, "{v}"),
            Self::Int(v) => write!(f, "{v}"),
        }
    }
}

/// One point of the search space, keyed by parameter name.
pub type ParamMap = HashMap<String, ParameterValue>;

impl ParameterDef {
    fn invalid(&self, message: impl Into<String>) -> et_types::TuneError {
        OptimizerError::ParameterError {
            parameter: self.name.clone(),
            message: message.into(),
        }
        .into()
    }

    pub fn validate(&self) -> TuneResult<()> {
        let ok = match self.kind {
            ParameterKind::FloatRange { low, high } => low.is_finite() && high.is_finite() && low < high,
            ParameterKind::IntRange { low, high } => low <= high,
            ParameterKind::LogUniform { low, high } => low > 0.0 && high.is_finite() && low < high,
        };
        if ok {
            Ok(())
        } else {
            Err(self.invalid(format!("invalid bounds {:?}", self.kind)))
        }
    }

    pub fn contains(&self, value: &ParameterValue) -> bool {
        match (&self.kind, value) {
            (ParameterKind::IntRange { low, high }, ParameterValue::Int(v)) => v >= low && v <= high,
            (ParameterKind::FloatRange { low, high }, ParameterValue::Float(v))
            | (ParameterKind::LogUniform { low, high }, ParameterValue::Float(v)) => {
                v >= low && v <= high
            }
            _ => false,
        }
    }

    /// Position of `value` in [0, 1]; log dimensions are linear in log-space.
    pub fn to_unit(&self, value: &ParameterValue) -> TuneResult<f64> {
        if !self.contains(value) {
            return Err(self.invalid(format!("value {} outside {:?}", value, self.kind)));
        }
        let unit = match self.kind {
            ParameterKind::FloatRange { low, high } => (value.as_f64() - low) / (high - low),
            ParameterKind::IntRange { low, high } => {
                if high == low {
                    0.5
                } else {
                    (value.as_f64() - low as f64) / (high - low) as f64
                }
            }
            ParameterKind::LogUniform { low, high } => {
                (value.as_f64().ln() - low.ln()) / (high.ln() - low.ln())
            }
        };
        Ok(unit)
    }

    /// Inverse of [`to_unit`](Self::to_unit); integers are rounded.
    pub fn from_unit(&self, unit: f64) -> ParameterValue {
        let u = unit.clamp(0.0, 1.0);
        match self.kind {
            ParameterKind::FloatRange { low, high } => {
                ParameterValue::Float((low + u * (high - low)).clamp(low, high))
            }
            ParameterKind::IntRange { low, high } => {
                let v = low as f64 + u * (high - low) as f64;
                ParameterValue::Int((v.round() as i64).clamp(low, high))
            }
            ParameterKind::LogUniform { low, high } => {
                let log_v = low.ln() + u * (high.ln() - low.ln());
                ParameterValue::Float(log_v.exp().clamp(low, high))
            }
        }
    }

    pub fn sample<R: Rng>(&self, rng: &mut R) -> ParameterValue {
        match self.kind {
            ParameterKind::FloatRange { low, high } => ParameterValue::Float(rng.random_range(low..=high)),
            ParameterKind::IntRange { low, high } => ParameterValue::Int(rng.random_range(low..=high)),
            ParameterKind::LogUniform { low, high } => {
                let log_val: f64 = rng.random_range(low.ln()..=high.ln());
                ParameterValue::Float(log_val.exp().clamp(low, high))
            }
        }
    }
}

/// The full search space: an ordered list of parameter definitions.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SearchSpace {
    pub parameters: Vec<ParameterDef>,
}

impl SearchSpace {
    pub fn new() -> Self {
        Self {
            parameters: Vec::new(),
        }
    }

    pub fn add_float(mut self, name: impl Into<String>, low: f64, high: f64) -> Self {
        self.parameters.push(ParameterDef {
            name: name.into(),
            kind: ParameterKind::FloatRange { low, high },
        });
        self
    }

    pub fn add_int(mut self, name: impl Into<String>, low: i64, high: i64) -> Self {
        self.parameters.push(ParameterDef {
            name: name.into(),
            kind: ParameterKind::IntRange { low, high },
        });
        self
    }

    pub fn add_log_uniform(mut self, name: impl Into<String>, low: f64, high: f64) -> Self {
        self.parameters.push(ParameterDef {
            name: name.into(),
            kind: ParameterKind::LogUniform { low, high },
        });
        self
    }

    pub fn dims(&self) -> usize {
        self.parameters.len()
    }

    pub fn validate(&self) -> TuneResult<()> {
        if self.parameters.is_empty() {
            return Err(OptimizerError::InvalidSpace {
                message: "search space has no parameters".to_string(),
            }
            .into());
        }
        for (i, param) in self.parameters.iter().enumerate() {
            if self.parameters[..i].iter().any(|p| p.name == param.name) {
                return Err(OptimizerError::InvalidSpace {
                    message: format!("duplicate parameter '{}'", param.name),
                }
                .into());
            }
            param.validate()?;
        }
        Ok(())
    }

    /// Encode a point as a vector in the unit hypercube, in parameter order.
    pub fn to_unit(&self, params: &ParamMap) -> TuneResult<Vec<f64>> {
        self.parameters
            .iter()
            .map(|def| {
                let value = params.get(&def.name).ok_or_else(|| OptimizerError::ParameterError {
                    parameter: def.name.clone(),
                    message: "missing from point".to_string(),
                })?;
                def.to_unit(value)
            })
            .collect()
    }

    pub fn from_unit(&self, unit: &[f64]) -> ParamMap {
        self.parameters
            .iter()
            .zip(unit)
            .map(|(def, u)| (def.name.clone(), def.from_unit(*u)))
            .collect()
    }

    pub fn sample<R: Rng>(&self, rng: &mut R) -> ParamMap {
        self.parameters
            .iter()
            .map(|def| (def.name.clone(), def.sample(rng)))
            .collect()
    }
}

impl Default for SearchSpace {
    fn default() -> Self {
        Self::new()
    }
}

// ---------------------------------------------------------------------------
// Search strategies
// ---------------------------------------------------------------------------

/// Common trait for all search strategies. Objectives are minimized.
pub trait SearchStrategy: Send {
    /// Generate the next batch of parameter combinations to evaluate.
    fn suggest(&mut self, count: usize) -> Vec<ParamMap>;

    /// Report completed trial results so adaptive strategies can learn.
    fn report(&mut self, _params: &ParamMap, _objective: f64) {}

    /// Human-readable strategy name.
    fn name(&self) -> &str;
}

// ---- Random search ----

/// Independent random sampling across the search space.
#[derive(Debug, Clone)]
pub struct RandomSearch {
    space: SearchSpace,
    rng: ChaCha8Rng,
}

impl RandomSearch {
    pub fn new(space: SearchSpace) -> Self {
        Self {
            space,
            rng: ChaCha8Rng::from_os_rng(),
        }
    }

    pub fn with_seed(space: SearchSpace, seed: u64) -> Self {
        Self {
            space,
            rng: ChaCha8Rng::seed_from_u64(seed),
        }
    }
}

impl SearchStrategy for RandomSearch {
    fn suggest(&mut self, count: usize) -> Vec<ParamMap> {
        (0..count).map(|_| self.space.sample(&mut self.rng)).collect()
    }

    fn name(&self) -> &str {
        "random"
    }
}

// ---- Bayesian search (Gaussian-process surrogate) ----

/// Settings for [`BayesianSearch`].
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BayesianConfig {
    /// Suggestions made before the surrogate is consulted (includes `initial_points`).
    pub n_initial_points: usize,
    pub acquisition: AcquisitionFunction,
    /// Random candidates scored per suggestion.
    pub n_candidates: usize,
    /// Share of candidates drawn around the best observation rather than uniformly.
    pub local_fraction: f64,
    /// Observation noise in standardized objective units.
    pub noise_variance: f64,
    pub seed: u64,
}

impl Default for BayesianConfig {
    fn default() -> Self {
        Self {
            n_initial_points: 10,
            acquisition: AcquisitionFunction::default(),
            n_candidates: 2000,
            local_fraction: 0.25,
            noise_variance: 1e-4,
            seed: 42,
        }
    }
}

/// Bayesian optimization: fit a Gaussian process to observed (point, objective)
/// pairs in the unit hypercube and pick the candidate maximizing the
/// acquisition function.
#[derive(Debug, Clone)]
pub struct BayesianSearch {
    space: SearchSpace,
    config: BayesianConfig,
    rng: ChaCha8Rng,
    initial_points: VecDeque<ParamMap>,
    observations: Vec<(Vec<f64>, f64)>,
    issued: usize,
}

impl BayesianSearch {
    pub fn new(space: SearchSpace, config: BayesianConfig) -> Self {
        let rng = ChaCha8Rng::seed_from_u64(config.seed);
        Self {
            space,
            config,
            rng,
            initial_points: VecDeque::new(),
            observations: Vec::new(),
            issued: 0,
        }
    }

    /// Evaluate `point` before any random exploration.
    pub fn with_initial_point(mut self, point: ParamMap) -> Self {
        self.initial_points.push_back(point);
        self
    }

    pub fn observations(&self) -> &[(Vec<f64>, f64)] {
        &self.observations
    }

    /// Pure exploration sample.
    fn explore(&mut self) -> ParamMap {
        self.space.sample(&mut self.rng)
    }

    fn best_observation(&self) -> Option<&(Vec<f64>, f64)> {
        self.observations
            .iter()
            .min_by(|a, b| a.1.total_cmp(&b.1))
    }

    /// Candidate set: mostly uniform, partly perturbations of the best point.
    fn candidates(&mut self) -> Vec<Vec<f64>> {
        let dims = self.space.dims();
        let n = self.config.n_candidates.max(1);
        let n_local = (n as f64 * self.config.local_fraction.clamp(0.0, 1.0)) as usize;
        let best = self.best_observation().map(|(x, _)| x.clone());

        let mut out = Vec::with_capacity(n);
        for i in 0..n {
            let point = match &best {
                Some(centre) if i < n_local => centre
                    .iter()
                    .map(|c| (c + self.rng.random_range(-0.1f64..0.1)).clamp(0.0, 1.0))
                    .collect(),
                _ => (0..dims).map(|_| self.rng.random_range(0.0..=1.0)).collect(),
            };
            out.push(point);
        }
        out
    }

    /// Model-guided suggestion; `None` when the surrogate cannot be fitted.
    fn exploit(&mut self) -> Option<ParamMap> {
        let (xs, ys): (Vec<Vec<f64>>, Vec<f64>) = self.observations.iter().cloned().unzip();
        let mut gp = GaussianProcess::new(self.config.noise_variance);
        if let Err(e) = gp.fit(&xs, &ys) {
            tracing::warn!("Surrogate fit failed, falling back to random sampling: {}", e);
            return None;
        }

        let best_y = ys.iter().copied().fold(f64::INFINITY, f64::min);
        let candidates = self.candidates();
        let acquisition = self.config.acquisition;

        let scored: Vec<f64> = candidates
            .par_iter()
            .map(|c| {
                let (mu, sigma) = gp.predict(c);
                acquisition.score(mu, sigma, best_y)
            })
            .collect();

        let (best_idx, best_score) = scored
            .iter()
            .enumerate()
            .max_by(|a, b| a.1.total_cmp(b.1))?;

        tracing::debug!(
            "GP suggestion: acquisition {:.4e}, length scale {:.3}",
            best_score,
            gp.length_scale()
        );
        Some(self.space.from_unit(&candidates[best_idx]))
    }
}

impl SearchStrategy for BayesianSearch {
    fn suggest(&mut self, count: usize) -> Vec<ParamMap> {
        (0..count)
            .map(|_| {
                let in_warmup = self.issued < self.config.n_initial_points || self.observations.len() < 2;
                self.issued += 1;
                if let Some(point) = self.initial_points.pop_front() {
                    return point;
                }
                if in_warmup {
                    return self.explore();
                }
                match self.exploit() {
                    Some(point) => point,
                    None => self.explore(),
                }
            })
            .collect()
    }

    fn report(&mut self, params: &ParamMap, objective: f64) {
        if !objective.is_finite() {
            tracing::warn!("Ignoring non-finite objective {}", objective);
            return;
        }
        match self.space.to_unit(params) {
            Ok(x) => self.observations.push((x, objective)),
            Err(e) => tracing::warn!("Ignoring observation outside the search space: {}", e),
        }
    }

    fn name(&self) -> &str {
        "bayesian"
    }
}
