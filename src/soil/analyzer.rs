//! Soil property estimates from image features
//!
//! Heuristic mapping from color and texture to pH, moisture, NPK and a
//! texture class, plus crop suggestions for the result.

use serde::{Deserialize, Serialize};
use tracing::info;

use super::features::SoilFeatures;

/// Soil texture classes, in tie-breaking order
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum SoilTexture {
    Sandy,
    Clay,
    Loamy,
    Silty,
}

impl SoilTexture {
    pub const ALL: [SoilTexture; 4] = [
        SoilTexture::Sandy,
        SoilTexture::Clay,
        SoilTexture::Loamy,
        SoilTexture::Silty,
    ];

    pub fn name(&self) -> &'static str {
        match self {
            SoilTexture::Sandy => "Sandy",
            SoilTexture::Clay => "Clay",
            SoilTexture::Loamy => "Loamy",
            SoilTexture::Silty => "Silty",
        }
    }

    /// Typical sand/silt/clay percentages for the class
    pub fn breakdown(&self) -> TextureBreakdown {
        let (sand, silt, clay) = match self {
            SoilTexture::Sandy => (70, 15, 15),
            SoilTexture::Clay => (20, 25, 55),
            SoilTexture::Silty => (15, 70, 15),
            SoilTexture::Loamy => (40, 40, 20),
        };
        TextureBreakdown { sand, silt, clay }
    }
}

impl std::fmt::Display for SoilTexture {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.name())
    }
}

/// Sand/silt/clay percentages
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct TextureBreakdown {
    pub sand: u32,
    pub silt: u32,
    pub clay: u32,
}

/// Estimated soil properties
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SoilReport {
    #[serde(rename = "pH")]
    pub ph: f64,
    /// Percent
    pub moisture: f64,
    /// mg/kg
    pub nitrogen: f64,
    pub phosphorus: f64,
    pub potassium: f64,
    pub texture: SoilTexture,
    pub texture_breakdown: TextureBreakdown,
    /// In [0.5, 1.0]
    pub confidence: f64,
}

/// Maps extracted features to a soil report
pub trait SoilAnalyzer: Send + Sync {
    fn analyze(&self, features: &SoilFeatures) -> SoilReport;

    fn recommend_crops(&self, report: &SoilReport) -> Vec<String> {
        crop_recommendations(report)
    }
}

fn round_to(value: f64, decimals: i32) -> f64 {
    let factor = 10f64.powi(decimals);
    (value * factor).round() / factor
}

/// Color/texture heuristics
#[derive(Debug, Default, Clone, Copy)]
pub struct ColorTextureAnalyzer;

impl ColorTextureAnalyzer {
    pub fn new() -> Self {
        Self
    }

    /// Highest-scoring texture class; the earlier class wins a tie
    pub fn classify_texture(edge_density: f64, roughness: f64, brightness: f64) -> SoilTexture {
        let edge = (edge_density / 100.0).min(1.0);
        let rough = (roughness / 1000.0).min(1.0);
        let bright = brightness / 255.0;

        let scores = [
            (SoilTexture::Sandy, edge * 0.4 + rough * 0.4 + bright * 0.2),
            (
                SoilTexture::Clay,
                (1.0 - edge) * 0.5 + (1.0 - rough) * 0.3 + (1.0 - bright) * 0.2,
            ),
            (
                SoilTexture::Loamy,
                1.0 - (edge - 0.5).abs() - (rough - 0.5).abs(),
            ),
            (
                SoilTexture::Silty,
                (1.0 - rough) * 0.6 + (1.0 - (bright - 0.5).abs()) * 0.4,
            ),
        ];

        scores
            .iter()
            .fold(scores[0], |best, &candidate| {
                if candidate.1 > best.1 {
                    candidate
                } else {
                    best
                }
            })
            .0
    }

    fn confidence(features: &SoilFeatures) -> f64 {
        // color and texture features are always present in the record
        let base = 1.0;
        let penalty = features
            .edge_variance
            .map(|variance| (variance / 100.0).min(0.2))
            .unwrap_or(0.0);
        (base - penalty).clamp(0.5, 1.0)
    }
}

impl SoilAnalyzer for ColorTextureAnalyzer {
    fn analyze(&self, features: &SoilFeatures) -> SoilReport {
        let brightness = (features.r + features.g + features.b) / 3.0;

        let ph = (5.5 + brightness / 255.0 * 2.5).clamp(4.0, 9.0);
        let moisture = (100.0 - features.v / 255.0 * 80.0).clamp(10.0, 95.0);
        let nitrogen = (20.0 + (255.0 - brightness) / 255.0 * 150.0).clamp(10.0, 200.0);
        let phosphorus = (15.0 + features.r / 255.0 * 45.0).clamp(5.0, 80.0);
        let potassium = (50.0 + features.s / 255.0 * 200.0).clamp(30.0, 300.0);

        let texture = Self::classify_texture(features.edge_density, features.roughness, brightness);

        let report = SoilReport {
            ph: round_to(ph, 2),
            moisture: round_to(moisture, 1),
            nitrogen: round_to(nitrogen, 1),
            phosphorus: round_to(phosphorus, 1),
            potassium: round_to(potassium, 1),
            texture,
            texture_breakdown: texture.breakdown(),
            confidence: round_to(Self::confidence(features), 2),
        };

        info!(
            "Soil analysis complete: pH={}, texture={}",
            report.ph, report.texture
        );
        report
    }
}

/// Crops suited to the estimated soil: pH, then NPK, then texture rules,
/// de-duplicated in order and capped at six
pub fn crop_recommendations(report: &SoilReport) -> Vec<String> {
    let mut crops: Vec<&str> = Vec::new();

    if (6.0..=7.5).contains(&report.ph) {
        crops.extend(["Wheat", "Corn", "Soybeans"]);
    } else if report.ph < 6.0 {
        crops.extend(["Potatoes", "Blueberries", "Sweet Potatoes"]);
    } else {
        crops.extend(["Asparagus", "Cabbage", "Beets"]);
    }

    if report.nitrogen > 100.0 {
        crops.extend(["Leafy Greens", "Spinach", "Lettuce"]);
    }
    if report.phosphorus > 30.0 {
        crops.extend(["Tomatoes", "Peppers", "Root vegetables"]);
    }
    if report.potassium > 150.0 {
        crops.extend(["Fruits", "Carrots", "Onions"]);
    }

    crops.extend(match report.texture {
        SoilTexture::Sandy => ["Carrots", "Radishes", "Peanuts"],
        SoilTexture::Clay => ["Broccoli", "Brussels sprouts", "Kale"],
        SoilTexture::Loamy => ["Most vegetables", "Flowers", "Herbs"],
        SoilTexture::Silty => ["Most crops", "Perennials", "Shrubs"],
    });

    let mut unique: Vec<String> = Vec::new();
    for crop in crops {
        if !unique.iter().any(|c| c == crop) {
            unique.push(crop.to_string());
        }
    }
    unique.truncate(6);
    unique
}

#[cfg(test)]
mod tests {
    use super::*;

    fn report(ph: f64, n: f64, p: f64, k: f64, texture: SoilTexture) -> SoilReport {
        SoilReport {
            ph,
            moisture: 50.0,
            nitrogen: n,
            phosphorus: p,
            potassium: k,
            texture,
            texture_breakdown: texture.breakdown(),
            confidence: 1.0,
        }
    }

    #[test]
    fn test_default_features() {
        let report = ColorTextureAnalyzer.analyze(&SoilFeatures::default());

        assert_eq!(report.ph, 6.51);
        assert_eq!(report.moisture, 68.6);
        assert_eq!(report.nitrogen, 109.6);
        assert_eq!(report.phosphorus, 37.6);
        assert_eq!(report.potassium, 89.2);
        assert_eq!(report.texture, SoilTexture::Clay);
        assert_eq!(
            report.texture_breakdown,
            TextureBreakdown {
                sand: 20,
                silt: 25,
                clay: 55
            }
        );
        assert_eq!(report.confidence, 1.0);
    }

    #[test]
    fn test_outputs_stay_in_range() {
        let extremes = [
            SoilFeatures {
                r: 0.0,
                g: 0.0,
                b: 0.0,
                s: 0.0,
                v: 0.0,
                ..SoilFeatures::default()
            },
            SoilFeatures {
                r: 255.0,
                g: 255.0,
                b: 255.0,
                s: 255.0,
                v: 255.0,
                edge_variance: Some(500.0),
                ..SoilFeatures::default()
            },
        ];

        for features in extremes {
            let report = ColorTextureAnalyzer.analyze(&features);
            assert!((4.0..=9.0).contains(&report.ph));
            assert!((10.0..=95.0).contains(&report.moisture));
            assert!((10.0..=200.0).contains(&report.nitrogen));
            assert!((5.0..=80.0).contains(&report.phosphorus));
            assert!((30.0..=300.0).contains(&report.potassium));
            assert!((0.5..=1.0).contains(&report.confidence));
        }
    }

    #[test]
    fn test_edge_variance_penalty() {
        let features = SoilFeatures {
            edge_variance: Some(10.0),
            ..SoilFeatures::default()
        };
        assert_eq!(ColorTextureAnalyzer.analyze(&features).confidence, 0.9);

        let features = SoilFeatures {
            edge_variance: Some(90.0),
            ..SoilFeatures::default()
        };
        assert_eq!(ColorTextureAnalyzer.analyze(&features).confidence, 0.8);
    }

    #[test]
    fn test_texture_classes() {
        assert_eq!(
            ColorTextureAnalyzer::classify_texture(100.0, 1000.0, 255.0),
            SoilTexture::Sandy
        );
        assert_eq!(
            ColorTextureAnalyzer::classify_texture(0.0, 0.0, 0.0),
            SoilTexture::Clay
        );
        assert_eq!(
            ColorTextureAnalyzer::classify_texture(50.0, 500.0, 0.0),
            SoilTexture::Loamy
        );
        assert_eq!(
            ColorTextureAnalyzer::classify_texture(0.0, 0.0, 128.0),
            SoilTexture::Silty
        );
    }

    #[test]
    fn test_crop_recommendations() {
        let crops = crop_recommendations(&report(6.5, 120.0, 40.0, 200.0, SoilTexture::Sandy));
        assert_eq!(
            crops,
            vec!["Wheat", "Corn", "Soybeans", "Leafy Greens", "Spinach", "Lettuce"]
        );

        let crops = crop_recommendations(&report(5.0, 50.0, 20.0, 160.0, SoilTexture::Sandy));
        assert_eq!(
            crops,
            vec!["Potatoes", "Blueberries", "Sweet Potatoes", "Fruits", "Carrots", "Onions"]
        );

        let crops = crop_recommendations(&report(8.0, 50.0, 20.0, 100.0, SoilTexture::Silty));
        assert_eq!(
            crops,
            vec!["Asparagus", "Cabbage", "Beets", "Most crops", "Perennials", "Shrubs"]
        );
    }

    #[test]
    fn test_recommendations_deduplicate() {
        let crops = crop_recommendations(&report(5.0, 50.0, 20.0, 200.0, SoilTexture::Sandy));
        assert_eq!(crops.iter().filter(|c| c.as_str() == "Carrots").count(), 1);
        assert!(crops.len() <= 6);
    }

    #[test]
    fn test_report_json_uses_ph_key() {
        let json = serde_json::to_value(ColorTextureAnalyzer.analyze(&SoilFeatures::default())).unwrap();
        assert!(json["pH"].is_number());
        assert_eq!(json["texture"], "Clay");
        assert_eq!(json["texture_breakdown"]["clay"], 55);
    }
}
