//! Classifier configuration
//!
//! Serializable description of the dual-head architecture. Saved alongside
//! application settings as JSON.

use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};

use super::backbone::FeatureExtractorConfig;
use super::heads::SharedTrunkConfig;
use crate::utils::error::{GreenThumbError, Result};
use crate::IMAGE_SIZE;

/// Configuration for the dual-head classifier
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ClassifierConfig {
    /// Input image size (width and height)
    pub image_size: usize,

    /// Convolutional feature extractor
    pub backbone: FeatureExtractorConfig,

    /// Optional weights file used to initialize the feature extractor
    pub backbone_weights: Option<PathBuf>,

    /// Hidden width of the shared trunk
    pub trunk_hidden: usize,

    /// Output width of the shared trunk (input of both heads)
    pub trunk_output: usize,

    /// Dropout after each trunk layer
    pub dropout: f64,
}

impl Default for ClassifierConfig {
    fn default() -> Self {
        Self {
            image_size: IMAGE_SIZE,
            backbone: FeatureExtractorConfig::new(),
            backbone_weights: None,
            trunk_hidden: 512,
            trunk_output: 256,
            dropout: 0.3,
        }
    }
}

impl ClassifierConfig {
    /// Narrow extractor for CPU-only runs and quick experiments
    pub fn compact(image_size: usize) -> Self {
        Self {
            image_size,
            backbone: FeatureExtractorConfig::new()
                .with_stage_filters(vec![8, 16, 16, 16])
                .with_blocks_per_stage(2),
            ..Self::default()
        }
    }

    pub fn with_backbone_weights<P: AsRef<Path>>(mut self, path: P) -> Self {
        self.backbone_weights = Some(path.as_ref().to_path_buf());
        self
    }

    pub fn trunk(&self) -> SharedTrunkConfig {
        SharedTrunkConfig::new(self.backbone.output_dim())
            .with_hidden_dim(self.trunk_hidden)
            .with_output_dim(self.trunk_output)
            .with_dropout(self.dropout)
    }

    /// Validate the configuration
    pub fn validate(&self) -> Result<()> {
        if self.backbone.stage_filters.is_empty() || self.backbone.stage_filters.contains(&0) {
            return Err(GreenThumbError::Config(
                "stage_filters must be non-empty and positive".to_string(),
            ));
        }

        if self.backbone.blocks_per_stage == 0 {
            return Err(GreenThumbError::Config(
                "blocks_per_stage must be at least 1".to_string(),
            ));
        }

        let factor = self.backbone.downsampling();
        if self.image_size == 0 || self.image_size % factor != 0 {
            return Err(GreenThumbError::Config(format!(
                "image_size must be a positive multiple of {}",
                factor
            )));
        }

        if !(0.0..1.0).contains(&self.dropout) {
            return Err(GreenThumbError::Config(
                "dropout must be in range [0.0, 1.0)".to_string(),
            ));
        }

        if self.trunk_hidden == 0 || self.trunk_output == 0 {
            return Err(GreenThumbError::Config(
                "trunk widths must be positive".to_string(),
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
