//! The hyperparameter vector explored by the search.

use serde::{Deserialize, Serialize};

use crate::errors::{ModelError, TuneResult};

/// Training and architecture choices for one trial.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Hyperparameters {
    pub learning_rate: f64,
    /// Width of the first hidden layer.
    pub layer1_units: usize,
    /// Width of the second hidden layer.
    pub layer2_units: usize,
    /// Dropout rate applied after each hidden layer.
    pub dropout: f64,
}

impl Hyperparameters {
    pub const LEARNING_RATE: &'static str = "learning_rate";
    pub const LAYER1_UNITS: &'static str = "layer1_units";
    pub const LAYER2_UNITS: &'static str = "layer2_units";
    pub const DROPOUT: &'static str = "dropout";

    pub fn new(learning_rate: f64, layer1_units: usize, layer2_units: usize, dropout: f64) -> Self {
        Self {
            learning_rate,
            layer1_units,
            layer2_units,
            dropout,
        }
    }

    /// Deterministic name of the point, exact to the search resolution.
    pub fn descriptor(&self) -> String {
        format!(
            "lr_{:.4e}_l1_{}_l2_{}_do_{:.4}",
            self.learning_rate, self.layer1_units, self.layer2_units, self.dropout
        )
    }

    /// Name of one evaluation: log directory and score log descriptor.
    ///
    /// The 1-based trial number keeps repeated or near-identical points apart.
    pub fn trial_name(&self, trial_number: usize) -> String {
        format!("trial_{:03}_{}", trial_number, self.descriptor())
    }

    pub fn validate(&self) -> TuneResult<()> {
        if !(self.learning_rate.is_finite() && self.learning_rate > 0.0) {
            return Err(ModelError::InvalidConfig {
                message: format!("learning rate must be positive, got {}", self.learning_rate),
            }
            .into());
        }
        if self.layer1_units == 0 || self.layer2_units == 0 {
            return Err(ModelError::InvalidConfig {
                message: format!(
                    "layer widths must be non-zero, got {} and {}",
                    self.layer1_units, self.layer2_units
                ),
            }
            .into());
        }
        if !(0.0..1.0).contains(&self.dropout) {
            return Err(ModelError::InvalidConfig {
                message: format!("dropout must lie in [0, 1), got {}", self.dropout),
            }
            .into());
        }
        Ok(())
    }
}

impl Default for Hyperparameters {
    fn default() -> Self {
        Self::new(1e-3, 64, 32, 0.2)
    }
}

impl std::fmt::Display for Hyperparameters {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.descriptor())
    }
}
