//! Plain-text score log, one line per trial: `<descriptor> <auc> <epochs>`.

use std::fs::OpenOptions;
use std::io::Write;
use std::path::{Path, PathBuf};

use et_types::{DataError, TuneResult};
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ScoreEntry {
    pub descriptor: String,
    pub auc: f64,
    pub epochs: usize,
}

impl ScoreEntry {
    pub fn to_line(&self) -> String {
        format!("{} {} {}", self.descriptor, self.auc, self.epochs)
    }

    pub fn parse(line: &str) -> TuneResult<Self> {
        let parse_error = |what: &str| DataError::ParseError {
            message: format!("bad score line '{}': {}", line, what),
        };

        let mut parts = line.split_whitespace();
        let (Some(descriptor), Some(auc), Some(epochs), None) =
            (parts.next(), parts.next(), parts.next(), parts.next())
        else {
            return Err(parse_error("expected three fields").into());
        };

        Ok(Self {
            descriptor: descriptor.to_string(),
            auc: auc.parse().map_err(|_| parse_error("invalid AUC"))?,
            epochs: epochs.parse().map_err(|_| parse_error("invalid epoch count"))?,
        })
    }
}

/// Append-only log file shared by every trial of a run.
#[derive(Debug, Clone)]
pub struct ScoreLog {
    path: PathBuf,
}

impl ScoreLog {
    pub fn new<P: AsRef<Path>>(path: P) -> Self {
        Self {
            path: path.as_ref().to_path_buf(),
        }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    pub fn append(&self, entry: &ScoreEntry) -> TuneResult<()> {
        if let Some(parent) = self.path.parent().filter(|p| !p.as_os_str().is_empty()) {
            std::fs::create_dir_all(parent)?;
        }
        let mut file = OpenOptions::new()
            .create(true)
            .append(true)
            .open(&self.path)?;
        writeln!(file, "{}", entry.to_line())?;
        Ok(())
    }

    /// All entries in file order; a missing file reads as empty.
    pub fn read_entries(&self) -> TuneResult<Vec<ScoreEntry>> {
        if !self.path.exists() {
            return Ok(Vec::new());
        }
        std::fs::read_to_string(&self.path)?
            .lines()
            .filter(|line| !line.trim().is_empty())
            .map(ScoreEntry::parse)
            .collect()
    }

    /// Highest-AUC entry; the earliest wins ties.
    pub fn best_entry(&self) -> TuneResult<Option<ScoreEntry>> {
        let entries = self.read_entries()?;
        let mut best: Option<ScoreEntry> = None;
        for entry in entries {
            if best.as_ref().map_or(true, |b| entry.auc > b.auc) {
                best = Some(entry);
            }
        }
        Ok(best)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    fn entry(descriptor: &str, auc: f64, epochs: usize) -> ScoreEntry {
        ScoreEntry {
            descriptor: descriptor.to_string(),
            auc,
            epochs,
        }
    }

    #[test]
    fn line_format() {
        let e = entry("lr_1.0e-3_l1_64_l2_32_do_0.20", 0.8125, 37);
        assert_eq!(e.to_line(), "lr_1.0e-3_l1_64_l2_32_do_0.20 0.8125 37");
        assert_eq!(ScoreEntry::parse(&e.to_line()).unwrap(), e);
    }

    #[test]
    fn malformed_lines() {
        assert!(ScoreEntry::parse("only_two 0.5").is_err());
        assert!(ScoreEntry::parse("a b 3").is_err());
        assert!(ScoreEntry::parse("a 0.5 x").is_err());
        assert!(ScoreEntry::parse("a 0.5 3 extra").is_err());
    }

    #[test]
    fn append_and_best() {
        let dir = TempDir::new().unwrap();
        let log = ScoreLog::new(dir.path().join("out").join("scores.txt"));
        assert!(log.read_entries().unwrap().is_empty());
        assert!(log.best_entry().unwrap().is_none());

        log.append(&entry("a", 0.71, 12)).unwrap();
        log.append(&entry("b", 0.84, 40)).unwrap();
        log.append(&entry("c", 0.84, 9)).unwrap();
        log.append(&entry("d", 0.66, 500)).unwrap();

        let entries = log.read_entries().unwrap();
        assert_eq!(entries.len(), 4);
        assert_eq!(entries[3].epochs, 500);
        assert_eq!(log.best_entry().unwrap().unwrap().descriptor, "b");
    }
}
