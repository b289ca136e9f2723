//! # et-optimizer
//!
//! Hyperparameter search for EventTune.
//!
//! Provides search space definitions, random and Gaussian-process Bayesian
//! search strategies, trial tracking, and a sequential minimization loop.

mod acquisition;
mod gp;
mod minimize;
mod search;
mod trial;

pub use acquisition::{normal_cdf, normal_pdf, AcquisitionFunction};
pub use gp::{GaussianProcess, LENGTH_SCALES};
pub use minimize::{Evaluation, Minimizer};
pub use search::{
    BayesianConfig, BayesianSearch, ParamMap, ParameterDef, ParameterKind, ParameterValue,
    RandomSearch, SearchSpace, SearchStrategy,
};
pub use trial::{
    ObjectiveDirection, OptimizationConfig, OptimizationId, OptimizationState, OptimizationStatus,
    StrategyKind, Trial, TrialResult, TrialStatus,
};
