//! Care recommendations for a classified leaf
//!
//! Severity-tier advice first, then one crop-specific tip. Pure and
//! deterministic.

use crate::dataset::labels::{Crop, Severity};

fn severity_advice(severity: Severity) -> &'static [&'static str] {
    match severity {
        Severity::Healthy => &[
            "Plant is healthy. Continue regular maintenance.",
            "Maintain proper irrigation and fertilization schedule.",
        ],
        Severity::Minimal => &[
            "Early signs of disease detected.",
            "Monitor closely and isolate affected plant if possible.",
            "Consider preventive fungicide/pesticide spray.",
        ],
        Severity::Moderate | Severity::Severe => &[
            "Moderate to severe disease progression detected.",
            "Apply appropriate fungicide/pesticide immediately.",
            "Remove affected leaves and improve air circulation.",
            "Increase monitoring frequency.",
        ],
        Severity::VerySevere | Severity::Dead => &[
            "Plant is heavily affected or dead.",
            "Consider removing the plant to prevent spread.",
            "Disinfect nearby plants and garden tools.",
            "Review environmental conditions and adjust growing practices.",
        ],
    }
}

/// Cultivation tip for one crop
pub fn crop_tip(crop: Crop) -> &'static str {
    match crop {
        Crop::Tomato => "Ensure proper spacing and ventilation to prevent fungal diseases.",
        Crop::Potato => "Maintain soil moisture balance to prevent late blight.",
        Crop::Rice => "Manage water levels to reduce fungal pressure.",
        Crop::Wheat => "Rotate crops annually to break disease cycles.",
        Crop::Maize => "Use disease-resistant varieties when available.",
        Crop::Chili => "Avoid overhead watering to reduce fungal issues.",
        Crop::Banana => "Monitor for Panama disease and use resistant rootstocks.",
        Crop::Cotton => "Regular scouting for pest-related diseases.",
        Crop::Apple => "Prune affected branches and improve tree structure.",
        Crop::Grapes => "Use fungicide programs during high-risk seasons.",
    }
}

/// Ordered advice for a crop at a severity level
pub fn recommend(crop: Crop, severity: Severity) -> Vec<String> {
    let mut recommendations: Vec<String> = severity_advice(severity)
        .iter()
        .map(|s| s.to_string())
        .collect();

    recommendations.push(format!(
        "{}-specific tip: {}",
        crop.display_name(),
        crop_tip(crop)
    ));
    recommendations
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_tomato_moderate() {
        let recs = recommend(Crop::Tomato, Severity::Moderate);

        assert_eq!(recs.len(), 5);
        assert_eq!(recs[0], "Moderate to severe disease progression detected.");
        assert_eq!(
            recs[4],
            "Tomato-specific tip: Ensure proper spacing and ventilation to prevent fungal diseases."
        );
    }

    #[test]
    fn test_tiers() {
        assert_eq!(recommend(Crop::Rice, Severity::Healthy).len(), 3);
        assert_eq!(recommend(Crop::Rice, Severity::Minimal).len(), 4);
        assert_eq!(
            recommend(Crop::Apple, Severity::Severe),
            recommend(Crop::Apple, Severity::Moderate)
        );
        assert_eq!(
            recommend(Crop::Apple, Severity::Dead)[0],
            "Plant is heavily affected or dead."
        );
        assert_eq!(
            recommend(Crop::Apple, Severity::VerySevere),
            recommend(Crop::Apple, Severity::Dead)
        );
    }

    #[test]
    fn test_crop_tip_is_last_for_every_crop() {
        for crop in Crop::ALL {
            let recs = recommend(crop, Severity::Healthy);
            let last = recs.last().unwrap();
            assert!(last.starts_with(&format!("{}-specific tip:", crop.display_name())));
            assert!(last.ends_with(crop_tip(crop)));
        }
    }
}
