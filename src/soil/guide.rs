//! Static reference material served next to soil analysis

use serde::Serialize;

use super::analyzer::SoilTexture;

#[derive(Debug, Clone, Serialize)]
pub struct TextureInfo {
    pub name: &'static str,
    pub description: &'static str,
    pub ideal_for: Vec<&'static str>,
}

#[derive(Debug, Clone, Serialize)]
pub struct PhRangeInfo {
    pub range: &'static str,
    pub crops: Vec<&'static str>,
}

/// Nutrient band: range plus either symptoms, a status or suitable crops
#[derive(Debug, Clone, Serialize)]
pub struct NutrientLevel {
    pub range: &'static str,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub symptoms: Option<Vec<&'static str>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub status: Option<&'static str>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub ideal_for: Option<Vec<&'static str>>,
}

#[derive(Debug, Clone, Serialize)]
pub struct NutrientGuide {
    pub description: &'static str,
    pub low: NutrientLevel,
    pub medium: NutrientLevel,
    pub high: NutrientLevel,
}

#[derive(Debug, Clone, Serialize)]
pub struct NpkGuide {
    pub nitrogen: NutrientGuide,
    pub phosphorus: NutrientGuide,
    pub potassium: NutrientGuide,
}

#[derive(Debug, Clone, Serialize)]
pub struct AnalysisInfo {
    pub description: &'static str,
    pub parameters_analyzed: Vec<&'static str>,
    pub tips: Vec<&'static str>,
    pub limitations: Vec<&'static str>,
}

pub fn texture_info(texture: SoilTexture) -> TextureInfo {
    let (description, ideal_for) = match texture {
        SoilTexture::Sandy => (
            "Large particles, excellent drainage, low nutrient retention",
            vec!["Carrots", "Potatoes", "Radishes", "Peanuts"],
        ),
        SoilTexture::Clay => (
            "Small particles, poor drainage, high nutrient retention",
            vec!["Cabbage", "Broccoli", "Brussels sprouts", "Kale"],
        ),
        SoilTexture::Loamy => (
            "Balanced mixture of sand, silt, and clay - ideal for most plants",
            vec!["Most vegetables", "Flowers", "Shrubs", "Herbs"],
        ),
        SoilTexture::Silty => (
            "Medium particles, good fertility and moisture retention",
            vec!["Most crops", "Perennials", "Shrubs"],
        ),
    };

    TextureInfo {
        name: texture.name(),
        description,
        ideal_for,
    }
}

pub fn texture_types() -> Vec<TextureInfo> {
    SoilTexture::ALL.iter().copied().map(texture_info).collect()
}

/// pH bands keyed by name, in increasing pH
pub fn ph_guide() -> Vec<(&'static str, PhRangeInfo)> {
    vec![
        (
            "highly_acidic",
            PhRangeInfo {
                range: "4.0-5.5",
                crops: vec!["Blueberries", "Azaleas", "Rhododendrons", "Cranberries"],
            },
        ),
        (
            "slightly_acidic",
            PhRangeInfo {
                range: "5.5-6.5",
                crops: vec!["Potatoes", "Strawberries", "Tomatoes", "Sweet Potatoes"],
            },
        ),
        (
            "neutral",
            PhRangeInfo {
                range: "6.5-7.5",
                crops: vec!["Most vegetables", "Wheat", "Corn", "Soybeans", "Lettuce"],
            },
        ),
        (
            "alkaline",
            PhRangeInfo {
                range: "7.5-9.0",
                crops: vec!["Asparagus", "Cabbage", "Cauliflower", "Beets"],
            },
        ),
    ]
}

fn low(range: &'static str, symptoms: Vec<&'static str>) -> NutrientLevel {
    NutrientLevel {
        range,
        symptoms: Some(symptoms),
        status: None,
        ideal_for: None,
    }
}

fn medium(range: &'static str) -> NutrientLevel {
    NutrientLevel {
        range,
        symptoms: None,
        status: Some("Adequate for most crops"),
        ideal_for: None,
    }
}

fn high(range: &'static str, ideal_for: Vec<&'static str>) -> NutrientLevel {
    NutrientLevel {
        range,
        symptoms: None,
        status: None,
        ideal_for: Some(ideal_for),
    }
}

pub fn npk_guide() -> NpkGuide {
    NpkGuide {
        nitrogen: NutrientGuide {
            description: "Essential for leaf and stem growth",
            low: low("0-50 mg/kg", vec!["Yellowing leaves", "Stunted growth"]),
            medium: medium("50-100 mg/kg"),
            high: high("100-200 mg/kg", vec!["Leafy greens", "Corn", "Grass"]),
        },
        phosphorus: NutrientGuide {
            description: "Essential for root development and flowering",
            low: low("0-20 mg/kg", vec!["Purple leaves", "Poor flowering"]),
            medium: medium("20-40 mg/kg"),
            high: high("40-80 mg/kg", vec!["Tomatoes", "Peppers", "Flowers"]),
        },
        potassium: NutrientGuide {
            description: "Essential for overall plant health and disease resistance",
            low: low("0-100 mg/kg", vec!["Brown leaf edges", "Weak stems"]),
            medium: medium("100-200 mg/kg"),
            high: high("200-300 mg/kg", vec!["Fruits", "Root vegetables"]),
        },
    }
}

pub fn analysis_info() -> AnalysisInfo {
    AnalysisInfo {
        description: "Soil analysis using computer vision and color analysis",
        parameters_analyzed: vec![
            "pH level (4.0-9.0)",
            "Moisture content (0-100%)",
            "Nitrogen content (mg/kg)",
            "Phosphorus content (mg/kg)",
            "Potassium content (mg/kg)",
            "Soil texture (Sandy/Clay/Loamy/Silty)",
        ],
        tips: vec![
            "Use clear, well-lit images of soil samples",
            "Take photos from directly above the soil",
            "Ensure the soil surface is visible and in focus",
            "Remove any debris or vegetation from the sample",
            "Use images of dry or slightly moist soil for best results",
        ],
        limitations: vec![
            "Predictions are estimates based on visual features",
            "For precise measurements, use laboratory soil testing",
            "Results may vary based on image quality and lighting",
        ],
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_texture_types() {
        let textures = texture_types();
        let names: Vec<&str> = textures.iter().map(|t| t.name).collect();
        assert_eq!(names, vec!["Sandy", "Clay", "Loamy", "Silty"]);
        assert_eq!(textures[3].ideal_for.len(), 3);
    }

    #[test]
    fn test_ph_guide_covers_range() {
        let guide = ph_guide();
        assert_eq!(guide.len(), 4);
        assert_eq!(guide[0].1.range, "4.0-5.5");
        assert_eq!(guide[3].1.range, "7.5-9.0");
    }

    #[test]
    fn test_npk_guide_json() {
        let json = serde_json::to_value(npk_guide()).unwrap();
        assert_eq!(json["nitrogen"]["medium"]["status"], "Adequate for most crops");
        assert!(json["nitrogen"]["medium"].get("symptoms").is_none());
        assert_eq!(json["potassium"]["high"]["ideal_for"][0], "Fruits");
    }
}
