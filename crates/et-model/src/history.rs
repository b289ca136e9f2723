//! Per-epoch training history, written into each trial's log directory.

use std::path::{Path, PathBuf};

use et_types::{TuneError, TuneResult};
use serde::{Deserialize, Serialize};

/// File name of the history inside a trial log directory.
pub const HISTORY_FILE: &str = "history.csv";

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct EpochRecord {
    /// 1-based epoch number.
    pub epoch: usize,
    pub loss: f32,
    pub val_loss: f32,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct TrainingHistory {
    pub records: Vec<EpochRecord>,
}

impl TrainingHistory {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn push(&mut self, record: EpochRecord) {
        self.records.push(record);
    }

    pub fn epochs(&self) -> usize {
        self.records.len()
    }

    pub fn last(&self) -> Option<&EpochRecord> {
        self.records.last()
    }

    pub fn best_val_loss(&self) -> Option<f32> {
        self.records
            .iter()
            .map(|r| r.val_loss)
            .min_by(|a, b| a.total_cmp(b))
    }

    /// Write `history.csv` under `dir`, creating the directory if needed.
    pub fn write_csv<P: AsRef<Path>>(&self, dir: P) -> TuneResult<PathBuf> {
        let dir = dir.as_ref();
        std::fs::create_dir_all(dir)?;
        let path = dir.join(HISTORY_FILE);

        let mut writer = csv::Writer::from_path(&path)
            .map_err(|e| TuneError::Csv(format!("cannot create {}: {}", path.display(), e)))?;
        for record in &self.records {
            writer
                .serialize(record)
                .map_err(|e| TuneError::Csv(e.to_string()))?;
        }
        writer.flush()?;

        tracing::debug!("Wrote {} epochs to {}", self.records.len(), path.display());
        Ok(path)
    }

    pub fn read_csv<P: AsRef<Path>>(path: P) -> TuneResult<Self> {
        let path = path.as_ref();
        let mut reader = csv::Reader::from_path(path)
            .map_err(|e| TuneError::Csv(format!("cannot open {}: {}", path.display(), e)))?;
        let records = reader
            .deserialize()
            .collect::<Result<Vec<EpochRecord>, _>>()
            .map_err(|e| TuneError::Csv(e.to_string()))?;
        Ok(Self { records })
    }
}
