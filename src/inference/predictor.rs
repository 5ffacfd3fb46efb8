//! Inference Predictor Module
//!
//! Runs a single forward pass on one image and maps both heads back to
//! label names. Intended for a classifier on a non-autodiff backend (see
//! [`PlantDiseaseClassifier::to_inference`]), where dropout is inactive and
//! batch-norm uses its running statistics.

use burn::tensor::{activation::softmax, backend::Backend, Tensor, TensorData};
use image::DynamicImage;
use serde::ser::{Serialize, SerializeMap, Serializer};
use tracing::debug;

use crate::dataset::labels::{Crop, Severity};
use crate::dataset::sample::{decode_bytes, to_normalized_chw};
use crate::model::PlantDiseaseClassifier;
use crate::utils::error::{GreenThumbError, Result};

/// Label -> probability, serialized as a JSON object in label order
#[derive(Debug, Clone, PartialEq)]
pub struct ProbabilityMap(pub Vec<(String, f32)>);

impl ProbabilityMap {
    pub fn get(&self, label: &str) -> Option<f32> {
        self.0.iter().find(|(name, _)| name == label).map(|(_, p)| *p)
    }

    pub fn total(&self) -> f32 {
        self.0.iter().map(|(_, p)| p).sum()
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }
}

impl Serialize for ProbabilityMap {
    fn serialize<S: Serializer>(&self, serializer: S) -> std::result::Result<S::Ok, S::Error> {
        let mut map = serializer.serialize_map(Some(self.0.len()))?;
        for (label, probability) in &self.0 {
            map.serialize_entry(label, probability)?;
        }
        map.end()
    }
}

/// Result of a single prediction
#[derive(Debug, Clone, serde::Serialize)]
pub struct PredictionResult {
    pub crop_type: Crop,
    pub severity_level: Severity,
    pub disease_status: String,
    /// max(top crop probability, top severity probability), 4 decimals
    pub confidence: f64,
    pub crop_probabilities: ProbabilityMap,
    pub severity_probabilities: ProbabilityMap,
}

fn argmax(probabilities: &[f32]) -> usize {
    probabilities
        .iter()
        .enumerate()
        .fold((0, f32::NEG_INFINITY), |best, (i, &p)| if p > best.1 { (i, p) } else { best })
        .0
}

fn round4(value: f64) -> f64 {
    (value * 10_000.0).round() / 10_000.0
}

fn head_probabilities<B: Backend>(logits: Tensor<B, 2>) -> Result<Vec<f32>> {
    softmax(logits, 1)
        .into_data()
        .convert::<f32>()
        .to_vec::<f32>()
        .map_err(|e| GreenThumbError::Inference(format!("{:?}", e)))
}

impl PredictionResult {
    /// Build a result from the two softmax distributions
    pub fn from_probabilities(crop_probs: &[f32], severity_probs: &[f32]) -> Result<Self> {
        let crop_idx = argmax(crop_probs);
        let severity_idx = argmax(severity_probs);

        let crop = Crop::from_index(crop_idx)
            .ok_or_else(|| GreenThumbError::Inference(format!("crop index {} out of range", crop_idx)))?;
        let severity = Severity::from_index(severity_idx).ok_or_else(|| {
            GreenThumbError::Inference(format!("severity index {} out of range", severity_idx))
        })?;

        let confidence = crop_probs[crop_idx].max(severity_probs[severity_idx]) as f64;

        Ok(Self {
            crop_type: crop,
            severity_level: severity,
            disease_status: severity.status().to_string(),
            confidence: round4(confidence.clamp(0.0, 1.0)),
            crop_probabilities: ProbabilityMap(
                Crop::ALL
                    .iter()
                    .zip(crop_probs)
                    .map(|(c, &p)| (c.name().to_string(), p))
                    .collect(),
            ),
            severity_probabilities: ProbabilityMap(
                Severity::ALL
                    .iter()
                    .zip(severity_probs)
                    .map(|(s, &p)| (s.level().to_string(), p))
                    .collect(),
            ),
        })
    }

    /// Pretty print the prediction result
    pub fn display(&self) -> String {
        let mut output = String::new();
        output.push_str(&format!("Crop: {}\n", self.crop_type.display_name()));
        output.push_str(&format!(
            "Severity: {} ({}%)\n",
            self.disease_status,
            self.severity_level.level()
        ));
        output.push_str(&format!("Confidence: {:.2}%\n", self.confidence * 100.0));
        output
    }
}

impl<B: Backend> PlantDiseaseClassifier<B> {
    /// Classify one decoded image
    pub fn predict(&self, image: &DynamicImage) -> Result<PredictionResult> {
        let size = self.config().image_size;
        let pixels = to_normalized_chw(image, size);
        let input = Tensor::<B, 4>::from_floats(TensorData::new(pixels, [1, 3, size, size]), self.device());

        let output = self.model().forward(input);
        let crop_probs = head_probabilities(output.crop_logits)?;
        let severity_probs = head_probabilities(output.severity_logits)?;

        let result = PredictionResult::from_probabilities(&crop_probs, &severity_probs)?;
        debug!(
            "Predicted {} / {} (confidence {:.4})",
            result.crop_type, result.severity_level, result.confidence
        );
        Ok(result)
    }

    /// Decode an encoded image (PNG/JPEG) and classify it
    pub fn predict_bytes(&self, bytes: &[u8]) -> Result<PredictionResult> {
        let image = decode_bytes(bytes)?;
        self.predict(&image)
    }
}

/// Outcome of one item in a batch analysis
#[derive(Debug, Clone, Copy, PartialEq, Eq, serde::Serialize)]
#[serde(rename_all = "lowercase")]
pub enum BatchStatus {
    Success,
    Failed,
}

#[derive(Debug, Clone, serde::Serialize)]
pub struct BatchItemResult {
    pub filename: String,
    pub status: BatchStatus,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub prediction: Option<PredictionResult>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

/// Per-item outcomes of a batch analysis
#[derive(Debug, Clone, serde::Serialize)]
pub struct BatchReport {
    pub results: Vec<BatchItemResult>,
    pub total: usize,
    pub successful: usize,
}

impl BatchReport {
    pub fn from_results(results: Vec<BatchItemResult>) -> Self {
        let successful = results
            .iter()
            .filter(|r| r.status == BatchStatus::Success)
            .count();
        Self {
            total: results.len(),
            successful,
            results,
        }
    }
}

/// Classify every `(filename, bytes)` pair; a failing item is recorded, never fatal
pub fn predict_batch<B: Backend>(
    classifier: &PlantDiseaseClassifier<B>,
    files: &[(String, Vec<u8>)],
) -> BatchReport {
    let results = files
        .iter()
        .map(|(filename, bytes)| match classifier.predict_bytes(bytes) {
            Ok(prediction) => BatchItemResult {
                filename: filename.clone(),
                status: BatchStatus::Success,
                prediction: Some(prediction),
                error: None,
            },
            Err(e) => BatchItemResult {
                filename: filename.clone(),
                status: BatchStatus::Failed,
                prediction: None,
                error: Some(e.to_string()),
            },
        })
        .collect();

    BatchReport::from_results(results)
}
