//! Soil analysis: feature extraction, property estimates and reference guides

pub mod analyzer;
pub mod features;
pub mod guide;

pub use analyzer::{
    crop_recommendations, ColorTextureAnalyzer, SoilAnalyzer, SoilReport, SoilTexture,
    TextureBreakdown,
};
pub use features::{extract_features, validate_soil_image, SoilFeatures};

use serde::Serialize;

use crate::utils::error::Result;

/// Soil report plus crop suggestions, as returned to clients
#[derive(Debug, Clone, Serialize)]
pub struct SoilAnalysis {
    #[serde(flatten)]
    pub report: SoilReport,
    pub recommendations: Vec<String>,
}

/// Validate, extract features from and analyze an uploaded soil image
pub fn analyze_soil_image(bytes: &[u8], analyzer: &dyn SoilAnalyzer) -> Result<SoilAnalysis> {
    let img = validate_soil_image(bytes)?;
    let features = extract_features(&img);
    let report = analyzer.analyze(&features);
    let recommendations = analyzer.recommend_crops(&report);

    Ok(SoilAnalysis {
        report,
        recommendations,
    })
}
