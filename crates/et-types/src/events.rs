//! Labeled event tables.

use ndarray::{concatenate, Array1, Array2, Axis};
use serde::{Deserialize, Serialize};

use crate::errors::{DataError, TuneResult};

/// The two physics event classes the classifier separates.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum EventClass {
    Signal,
    Background,
}

impl EventClass {
    /// Binary training label: 1 for signal, 0 for background.
    pub fn label(self) -> f32 {
        match self {
            EventClass::Signal => 1.0,
            EventClass::Background => 0.0,
        }
    }

    pub fn from_label(label: f32) -> Self {
        if label >= 0.5 {
            EventClass::Signal
        } else {
            EventClass::Background
        }
    }
}

impl std::fmt::Display for EventClass {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            EventClass::Signal => write!(f, "signal"),
            EventClass::Background => write!(f, "background"),
        }
    }
}

/// Engineered features, labels and per-event weights, one row per event.
#[derive(Debug, Clone, PartialEq)]
pub struct EventTable {
    pub feature_names: Vec<String>,
    pub features: Array2<f32>,
    pub labels: Array1<f32>,
    pub weights: Array1<f32>,
}

impl EventTable {
    pub fn new(
        feature_names: Vec<String>,
        features: Array2<f32>,
        labels: Array1<f32>,
        weights: Array1<f32>,
    ) -> TuneResult<Self> {
        let rows = features.nrows();
        if labels.len() != rows || weights.len() != rows {
            return Err(DataError::ShapeMismatch {
                message: format!(
                    "{} feature rows, {} labels, {} weights",
                    rows,
                    labels.len(),
                    weights.len()
                ),
            }
            .into());
        }
        if features.ncols() != feature_names.len() {
            return Err(DataError::ShapeMismatch {
                message: format!(
                    "{} feature columns but {} feature names",
                    features.ncols(),
                    feature_names.len()
                ),
            }
            .into());
        }

        Ok(Self {
            feature_names,
            features,
            labels,
            weights,
        })
    }

    /// Build a table where every event belongs to `class`.
    pub fn with_class(
        feature_names: Vec<String>,
        features: Array2<f32>,
        weights: Array1<f32>,
        class: EventClass,
    ) -> TuneResult<Self> {
        let labels = Array1::from_elem(features.nrows(), class.label());
        Self::new(feature_names, features, labels, weights)
    }

    pub fn len(&self) -> usize {
        self.features.nrows()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    pub fn n_features(&self) -> usize {
        self.features.ncols()
    }

    /// Copy out the given rows, in the given order.
    pub fn select_rows(&self, indices: &[usize]) -> Self {
        Self {
            feature_names: self.feature_names.clone(),
            features: self.features.select(Axis(0), indices),
            labels: self.labels.select(Axis(0), indices),
            weights: self.weights.select(Axis(0), indices),
        }
    }

    /// Stack two tables sharing the same feature columns.
    pub fn concat(first: &Self, second: &Self) -> TuneResult<Self> {
        if first.feature_names != second.feature_names {
            return Err(DataError::ShapeMismatch {
                message: format!(
                    "feature columns differ: {:?} vs {:?}",
                    first.feature_names, second.feature_names
                ),
            }
            .into());
        }

        let features = concatenate(Axis(0), &[first.features.view(), second.features.view()])
            .map_err(|e| DataError::ShapeMismatch {
                message: e.to_string(),
            })?;
        let labels = concatenate(Axis(0), &[first.labels.view(), second.labels.view()])
            .map_err(|e| DataError::ShapeMismatch {
                message: e.to_string(),
            })?;
        let weights = concatenate(Axis(0), &[first.weights.view(), second.weights.view()])
            .map_err(|e| DataError::ShapeMismatch {
                message: e.to_string(),
            })?;

        Self::new(first.feature_names.clone(), features, labels, weights)
    }

    /// Sum of weights over the events of one class.
    pub fn class_weight_sum(&self, class: EventClass) -> f64 {
        let target = class.label();
        self.labels
            .iter()
            .zip(self.weights.iter())
            .filter(|(label, _)| **label == target)
            .map(|(_, w)| *w as f64)
            .sum()
    }

    pub fn class_count(&self, class: EventClass) -> usize {
        let target = class.label();
        self.labels.iter().filter(|label| **label == target).count()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use ndarray::array;

    fn names() -> Vec<String> {
        vec!["pt".to_string(), "eta".to_string()]
    }

    #[test]
    fn table_rejects_mismatched_rows() {
        let result = EventTable::new(
            names(),
            array![[1.0, 2.0], [3.0, 4.0]],
            array![1.0],
            array![1.0, 1.0],
        );
        assert!(result.is_err());
    }

    #[test]
    fn table_rejects_mismatched_names() {
        let result = EventTable::new(
            vec!["pt".to_string()],
            array![[1.0, 2.0]],
            array![1.0],
            array![1.0],
        );
        assert!(result.is_err());
    }

    #[test]
    fn with_class_sets_labels() {
        let table = EventTable::with_class(
            names(),
            array![[1.0, 2.0], [3.0, 4.0]],
            array![0.5, 0.25],
            EventClass::Signal,
        )
        .unwrap();
        assert_eq!(table.labels, array![1.0, 1.0]);
        assert_eq!(table.class_count(EventClass::Signal), 2);
        assert!((table.class_weight_sum(EventClass::Signal) - 0.75).abs() < 1e-9);
    }

    #[test]
    fn concat_and_select() {
        let sig = EventTable::with_class(
            names(),
            array![[1.0, 2.0]],
            array![2.0],
            EventClass::Signal,
        )
        .unwrap();
        let bkg = EventTable::with_class(
            names(),
            array![[3.0, 4.0], [5.0, 6.0]],
            array![1.0, 3.0],
            EventClass::Background,
        )
        .unwrap();

        let merged = EventTable::concat(&sig, &bkg).unwrap();
        assert_eq!(merged.len(), 3);
        assert_eq!(merged.class_weight_sum(EventClass::Background), 4.0);

        let picked = merged.select_rows(&[2, 0]);
        assert_eq!(picked.features, array![[5.0, 6.0], [1.0, 2.0]]);
        assert_eq!(picked.labels, array![0.0, 1.0]);
        assert_eq!(picked.weights, array![3.0, 2.0]);
    }

    #[test]
    fn concat_rejects_different_columns() {
        let a = EventTable::with_class(names(), array![[1.0, 2.0]], array![1.0], EventClass::Signal)
            .unwrap();
        let b = EventTable::with_class(
            vec!["pt".to_string(), "phi".to_string()],
            array![[1.0, 2.0]],
            array![1.0],
            EventClass::Background,
        )
        .unwrap();
        assert!(EventTable::concat(&a, &b).is_err());
    }

    #[test]
    fn label_round_trip() {
        assert_eq!(EventClass::from_label(EventClass::Signal.label()), EventClass::Signal);
        assert_eq!(
            EventClass::from_label(EventClass::Background.label()),
            EventClass::Background
        );
        assert_eq!(EventClass::Background.to_string(), "background");
    }
}
