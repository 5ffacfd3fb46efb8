//! Model module: feature extractor, shared trunk, dual heads and the
//! classifier wrapper that owns the weights

pub mod backbone;
pub mod classifier;
pub mod config;
pub mod heads;

pub use backbone::{FeatureExtractor, FeatureExtractorConfig, LayerSelector, WeightsRecorder};
pub use classifier::{DualHeadModel, DualHeadOutput, ModelInfo, PlantDiseaseClassifier};
pub use config::ClassifierConfig;
pub use heads::{CropHead, SeverityHead, SharedTrunk, SharedTrunkConfig};
