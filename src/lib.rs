//! # GreenThumb
//!
//! Plant leaf disease classification and soil analysis built on the Burn framework.
//!
//! A pretrained-style convolutional feature extractor feeds a shared dense trunk
//! and two classification heads: one for the crop (10 classes) and one for the
//! disease severity (six buckets from 0% to 100%).
//!
//! ## Modules
//!
//! - `dataset`: label sets, the `{crop}/{severity}/` image index, preprocessing and augmentation
//! - `model`: feature extractor, dual-head classifier, checkpoint persistence
//! - `training`: train/validation split, two-phase fine-tuning, plateau scheduling, history
//! - `inference`: single and batch predictions
//! - `recommend`: care advice for a predicted crop and severity
//! - `soil`: color/texture soil estimates and reference guides
//! - `app`: shared context used by the CLI and the HTTP server
//!
//! ## Quick Start
//!
//! ```rust,ignore
//! use greenthumb::{AppConfig, AppContext};
//!
//! let ctx = AppContext::new(AppConfig::with_root("."))?;
//! let analysis = ctx.analyze(&std::fs::read("leaf.jpg")?).await?;
//! println!("{}", analysis.prediction.display());
//! ```

pub mod app;
pub mod backend;
pub mod dataset;
pub mod inference;
pub mod model;
pub mod recommend;
pub mod soil;
pub mod training;
pub mod utils;

pub use app::{AppConfig, AppContext, TrainingStatus};
pub use dataset::{Crop, Dataset, DatasetStatistics, Severity};
pub use inference::{BatchReport, PredictionResult};
pub use model::{ClassifierConfig, PlantDiseaseClassifier};
pub use soil::{ColorTextureAnalyzer, SoilAnalysis, SoilAnalyzer, SoilReport};
pub use training::{Trainer, TrainingConfig, TrainingHistory};
pub use utils::error::{GreenThumbError, Result};

/// Input side length the classifier is built for
pub const IMAGE_SIZE: usize = 224;

/// Version of the library
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
