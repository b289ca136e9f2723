//! Seeded train/validation/test partitioning.

use et_types::{validation_error, DataError, EventTable, TuneResult};
use rand::seq::SliceRandom;
use rand::SeedableRng;
use rand_chacha::ChaCha8Rng;

/// The three disjoint partitions of the event table.
#[derive(Debug, Clone)]
pub struct SplitTables {
    pub train: EventTable,
    pub validation: EventTable,
    pub test: EventTable,
}

/// Shuffle once, carve off `test_fraction` of all events, then
/// `validation_fraction` of what remains.
pub fn split_events(
    table: &EventTable,
    test_fraction: f64,
    validation_fraction: f64,
    seed: u64,
) -> TuneResult<SplitTables> {
    for (name, value) in [("test", test_fraction), ("validation", validation_fraction)] {
        if !(value > 0.0 && value < 1.0) {
            return Err(validation_error!("{} fraction must lie in (0, 1), got {}", name, value));
        }
    }

    let total = table.len();
    let n_test = (total as f64 * test_fraction).ceil() as usize;
    let remainder = total.saturating_sub(n_test);
    let n_validation = (remainder as f64 * validation_fraction).ceil() as usize;
    let n_train = remainder.saturating_sub(n_validation);

    if n_test == 0 || n_validation == 0 || n_train == 0 {
        return Err(DataError::InsufficientData {
            message: format!(
                "{} events cannot fill train/validation/test ({} / {} / {})",
                total, n_train, n_validation, n_test
            ),
        }
        .into());
    }

    let mut indices: Vec<usize> = (0..total).collect();
    let mut rng = ChaCha8Rng::seed_from_u64(seed);
    indices.shuffle(&mut rng);

    let (test_idx, rest) = indices.split_at(n_test);
    let (validation_idx, train_idx) = rest.split_at(n_validation);

    tracing::info!(
        "Split {} events: {} train, {} validation, {} test",
        total,
        train_idx.len(),
        validation_idx.len(),
        test_idx.len()
    );

    Ok(SplitTables {
        train: table.select_rows(train_idx),
        validation: table.select_rows(validation_idx),
        test: table.select_rows(test_idx),
    })
}
