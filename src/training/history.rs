//! Persisted per-epoch training metrics
//!
//! Stored as one JSON object mapping each metric name to its ordered series,
//! so the file can be loaded straight into a plotting tool.

use std::path::Path;

use serde::{Deserialize, Serialize};
use tracing::warn;

use crate::utils::error::Result;

/// Metrics of a single completed epoch
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct EpochRecord {
    /// One-based epoch number
    pub epoch: usize,
    pub train_loss: f64,
    pub val_loss: f64,
    /// Crop-head accuracy in [0, 1]
    pub train_accuracy: f64,
    pub val_accuracy: f64,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct TrainingHistory {
    pub epochs: Vec<usize>,
    pub train_loss: Vec<f64>,
    pub val_loss: Vec<f64>,
    pub train_accuracy: Vec<f64>,
    pub val_accuracy: Vec<f64>,
}

impl TrainingHistory {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn push(&mut self, record: EpochRecord) {
        self.epochs.push(record.epoch);
        self.train_loss.push(record.train_loss);
        self.val_loss.push(record.val_loss);
        self.train_accuracy.push(record.train_accuracy);
        self.val_accuracy.push(record.val_accuracy);
    }

    pub fn len(&self) -> usize {
        self.epochs.len()
    }

    pub fn is_empty(&self) -> bool {
        self.epochs.is_empty()
    }

    pub fn extend(&mut self, other: &TrainingHistory) {
        self.epochs.extend(&other.epochs);
        self.train_loss.extend(&other.train_loss);
        self.val_loss.extend(&other.val_loss);
        self.train_accuracy.extend(&other.train_accuracy);
        self.val_accuracy.extend(&other.val_accuracy);
    }

    /// Read a history file; missing or unreadable files yield an empty history
    pub fn load_or_default(path: &Path) -> Self {
        let Ok(json) = std::fs::read_to_string(path) else {
            return Self::default();
        };

        match serde_json::from_str(&json) {
            Ok(history) => history,
            Err(e) => {
                warn!("Ignoring unreadable training history {:?}: {}", path, e);
                Self::default()
            }
        }
    }

    pub fn save(&self, path: &Path) -> Result<()> {
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)?;
        }
        std::fs::write(path, serde_json::to_string_pretty(self)?)?;
        Ok(())
    }

    /// Add this run's records after whatever the file already holds
    pub fn append_to_file(&self, path: &Path) -> Result<TrainingHistory> {
        let mut combined = Self::load_or_default(path);
        combined.extend(self);
        combined.save(path)?;
        Ok(combined)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    fn record(epoch: usize, loss: f64) -> EpochRecord {
        EpochRecord {
            epoch,
            train_loss: loss,
            val_loss: loss + 0.1,
            train_accuracy: 0.5,
            val_accuracy: 0.4,
        }
    }

    #[test]
    fn test_json_layout() {
        let mut history = TrainingHistory::new();
        history.push(record(1, 2.0));

        let json = serde_json::to_value(&history).unwrap();
        for key in ["epochs", "train_loss", "val_loss", "train_accuracy", "val_accuracy"] {
            assert_eq!(json[key].as_array().unwrap().len(), 1, "{}", key);
        }
    }

    #[test]
    fn test_append_keeps_previous_runs() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("models").join("training_history.json");

        let mut first = TrainingHistory::new();
        first.push(record(1, 2.0));
        first.push(record(2, 1.5));
        first.append_to_file(&path).unwrap();

        let mut second = TrainingHistory::new();
        second.push(record(1, 1.2));
        let combined = second.append_to_file(&path).unwrap();

        assert_eq!(combined.len(), 3);
        assert_eq!(TrainingHistory::load_or_default(&path), combined);
        assert_eq!(combined.train_loss, vec![2.0, 1.5, 1.2]);
    }

    #[test]
    fn test_corrupt_file_starts_fresh() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("history.json");
        std::fs::write(&path, "{not json").unwrap();

        let mut history = TrainingHistory::new();
        history.push(record(1, 1.0));
        assert_eq!(history.append_to_file(&path).unwrap().len(), 1);
    }
}
