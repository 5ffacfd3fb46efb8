//! Inference module: single-image and batch prediction

pub mod predictor;

pub use predictor::{predict_batch, BatchItemResult, BatchReport, BatchStatus, PredictionResult, ProbabilityMap};
