//! Training configuration

use std::path::Path;

use serde::{Deserialize, Serialize};

use crate::utils::error::{GreenThumbError, Result};

/// Hyperparameters for one training run
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct TrainingConfig {
    /// Number of training epochs
    pub epochs: usize,

    /// Batch size for training and validation
    pub batch_size: usize,

    /// Initial learning rate
    pub learning_rate: f64,

    /// Fraction of samples held out for validation
    pub test_split: f64,

    /// Seed for the train/validation partition and batch shuffling
    pub seed: u64,

    /// Feature-extractor tensors left trainable at the start of a run
    pub trainable_tail: usize,

    /// Zero-based epoch after which the whole feature extractor is unfrozen
    pub unfreeze_epoch: usize,

    /// Epochs without validation improvement before the LR is reduced
    pub plateau_patience: usize,

    /// Multiplier applied on each LR reduction
    pub plateau_factor: f64,

    /// Lower bound for the learning rate
    pub min_learning_rate: f64,

    /// Gradient clipping max norm
    pub gradient_clip: f32,

    /// Apply random flips/rotations/color jitter to training samples
    pub augment: bool,
}

impl Default for TrainingConfig {
    fn default() -> Self {
        Self {
            epochs: 50,
            batch_size: 16,
            learning_rate: 0.001,
            test_split: 0.2,
            seed: 42,
            trainable_tail: 20,
            unfreeze_epoch: 10,
            plateau_patience: 5,
            plateau_factor: 0.5,
            min_learning_rate: 0.0,
            gradient_clip: 1.0,
            augment: true,
        }
    }
}

impl TrainingConfig {
    /// The four knobs exposed by the training trigger
    pub fn new(epochs: usize, batch_size: usize, learning_rate: f64, test_split: f64) -> Self {
        Self {
            epochs,
            batch_size,
            learning_rate,
            test_split,
            ..Self::default()
        }
    }

    pub fn with_seed(mut self, seed: u64) -> Self {
        self.seed = seed;
        self
    }

    pub fn with_augment(mut self, augment: bool) -> Self {
        self.augment = augment;
        self
    }

    pub fn with_unfreeze_epoch(mut self, epoch: usize) -> Self {
        self.unfreeze_epoch = epoch;
        self
    }

    pub fn with_plateau_patience(mut self, patience: usize) -> Self {
        self.plateau_patience = patience;
        self
    }

    /// Validate the configuration
    pub fn validate(&self) -> Result<()> {
        if self.epochs == 0 {
            return Err(GreenThumbError::Config("epochs must be at least 1".to_string()));
        }

        if self.batch_size == 0 {
            return Err(GreenThumbError::Config(
                "batch_size must be at least 1".to_string(),
            ));
        }

        if !(self.learning_rate > 0.0) {
            return Err(GreenThumbError::Config(
                "learning_rate must be positive".to_string(),
            ));
        }

        if !(0.0..1.0).contains(&self.test_split) {
            return Err(GreenThumbError::Config(
                "test_split must be in range [0.0, 1.0)".to_string(),
            ));
        }

        if !(0.0..1.0).contains(&self.plateau_factor) || self.plateau_factor == 0.0 {
            return Err(GreenThumbError::Config(
                "plateau_factor must be in range (0.0, 1.0)".to_string(),
            ));
        }

        Ok(())
    }

    /// Save configuration to a JSON file
    pub fn save(&self, path: &Path) -> Result<()> {
        let json = serde_json::to_string_pretty(self)?;
        std::fs::write(path, json)?;
        Ok(())
    }

    /// Load configuration from a JSON file
    pub fn load(path: &Path) -> Result<Self> {
        let json = std::fs::read_to_string(path)?;
        Ok(serde_json::from_str(&json)?)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults() {
        let config = TrainingConfig::default();
        assert_eq!(config.epochs, 50);
        assert_eq!(config.batch_size, 16);
        assert_eq!(config.learning_rate, 0.001);
        assert_eq!(config.test_split, 0.2);
        assert_eq!(config.seed, 42);
        assert_eq!(config.trainable_tail, 20);
        assert_eq!(config.unfreeze_epoch, 10);
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_validation() {
        assert!(TrainingConfig::new(0, 16, 0.001, 0.2).validate().is_err());
        assert!(TrainingConfig::new(5, 0, 0.001, 0.2).validate().is_err());
        assert!(TrainingConfig::new(5, 16, 0.0, 0.2).validate().is_err());
        assert!(TrainingConfig::new(5, 16, 0.001, 1.0).validate().is_err());
        assert!(TrainingConfig::new(5, 16, 0.001, -0.1).validate().is_err());
        assert!(TrainingConfig::new(5, 16, 0.001, 0.0).validate().is_ok());
    }

    #[test]
    fn test_partial_json_uses_defaults() {
        let config: TrainingConfig =
            serde_json::from_str(r#"{"epochs": 3, "batch_size": 4}"#).unwrap();
        assert_eq!(config.epochs, 3);
        assert_eq!(config.batch_size, 4);
        assert_eq!(config.learning_rate, 0.001);
        assert!(config.augment);
    }
}
