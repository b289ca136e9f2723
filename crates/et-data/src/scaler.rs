//! Per-feature standardization.

use et_types::{DataError, EventTable, ModelError, TuneResult};
use ndarray::{Array1, Array2, Axis};
use serde::{Deserialize, Serialize};

/// Zero-mean, unit-variance scaling fitted on the training partition.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StandardScaler {
    pub mean: Array1<f32>,
    /// Population standard deviation; constant features scale by 1.
    pub scale: Array1<f32>,
}

impl StandardScaler {
    pub fn fit(features: &Array2<f32>) -> TuneResult<Self> {
        if features.nrows() == 0 {
            return Err(DataError::InsufficientData {
                message: "cannot fit a scaler on zero events".to_string(),
            }
            .into());
        }

        let as_f64 = features.mapv(|v| v as f64);
        let mean = as_f64.mean_axis(Axis(0)).ok_or_else(|| DataError::InsufficientData {
            message: "empty feature matrix".to_string(),
        })?;
        let std = as_f64.std_axis(Axis(0), 0.0);

        let scale = std.mapv(|s| if s > f64::EPSILON { s as f32 } else { 1.0 });
        Ok(Self {
            mean: mean.mapv(|m| m as f32),
            scale,
        })
    }

    pub fn transform(&self, features: &Array2<f32>) -> TuneResult<Array2<f32>> {
        if features.ncols() != self.mean.len() {
            return Err(ModelError::DimensionMismatch {
                expected: self.mean.len(),
                actual: features.ncols(),
            }
            .into());
        }
        Ok((features - &self.mean) / &self.scale)
    }

    /// Scale the features of a table in place of a copy.
    pub fn transform_table(&self, table: &EventTable) -> TuneResult<EventTable> {
        let mut scaled = table.clone();
        scaled.features = self.transform(&table.features)?;
        Ok(scaled)
    }
}
