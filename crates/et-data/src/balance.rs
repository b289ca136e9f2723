//! Class-imbalance weighting.

use et_types::{DataError, EventClass, EventTable, TuneResult};

/// Merge signal and background into one labeled table, rescaling background
/// weights so both classes carry the same total weight.
pub fn balance_classes(signal: &EventTable, background: &EventTable) -> TuneResult<EventTable> {
    let signal_sum = signal.class_weight_sum(EventClass::Signal);
    let background_sum = background.class_weight_sum(EventClass::Background);

    for (class, sum) in [
        (EventClass::Signal, signal_sum),
        (EventClass::Background, background_sum),
    ] {
        if !(sum.is_finite() && sum > 0.0) {
            return Err(DataError::InsufficientData {
                message: format!("{} weights sum to {}, expected a positive total", class, sum),
            }
            .into());
        }
    }

    let scale = (signal_sum / background_sum) as f32;
    let mut rescaled = background.clone();
    rescaled.weights.mapv_inplace(|w| w * scale);

    tracing::info!(
        "Balanced classes: signal sum {:.4}, background sum {:.4} -> {:.4} (scale {:.6})",
        signal_sum,
        background_sum,
        rescaled.class_weight_sum(EventClass::Background),
        scale
    );

    EventTable::concat(signal, &rescaled)
}

#[cfg(test)]
mod tests {
    use super::*;
    use ndarray::{array, Array1, Array2};

    fn table(rows: usize, weight: f32, class: EventClass) -> EventTable {
        EventTable::with_class(
            vec!["x".to_string()],
            Array2::from_shape_fn((rows, 1), |(i, _)| i as f32),
            Array1::from_elem(rows, weight),
            class,
        )
        .unwrap()
    }

    #[test]
    fn balanced_classes_have_equal_weight() {
        let signal = table(10, 0.3, EventClass::Signal);
        let background = table(250, 1.7, EventClass::Background);

        let merged = balance_classes(&signal, &background).unwrap();
        let sig = merged.class_weight_sum(EventClass::Signal);
        let bkg = merged.class_weight_sum(EventClass::Background);

        assert_eq!(merged.len(), 260);
        assert!((sig - bkg).abs() / sig < 1e-5, "sig {} vs bkg {}", sig, bkg);
        // signal weights are untouched
        assert!((sig - 3.0).abs() < 1e-5);
    }

    #[test]
    fn mixed_sign_weights_still_balance() {
        let signal = table(4, 1.0, EventClass::Signal);
        let background = EventTable::with_class(
            vec!["x".to_string()],
            array![[0.0], [1.0], [2.0]],
            array![2.0, -0.5, 1.5],
            EventClass::Background,
        )
        .unwrap();

        let merged = balance_classes(&signal, &background).unwrap();
        let bkg = merged.class_weight_sum(EventClass::Background);
        assert!((bkg - 4.0).abs() < 1e-5);
    }

    #[test]
    fn zero_weight_class_is_rejected() {
        let signal = table(4, 1.0, EventClass::Signal);
        let background = table(4, 0.0, EventClass::Background);
        assert!(balance_classes(&signal, &background).is_err());
    }
}
