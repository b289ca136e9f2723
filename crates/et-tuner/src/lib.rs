// EventTune tuning pipeline
// Loads the two event classes, then searches classifier hyperparameters

pub mod fitness;
pub mod params;
pub mod pipeline;
pub mod score_log;

pub use fitness::{FitnessEvaluator, TrialOutcome};
pub use params::{from_params, optimization_config, search_space, to_params, OBJECTIVE_METRIC};
pub use pipeline::{optimize, prepare_data, prepare_tables, run, PreparedData, TuneSummary};
pub use score_log::{ScoreEntry, ScoreLog};
