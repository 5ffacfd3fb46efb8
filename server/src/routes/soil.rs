//! Soil analysis endpoints

use axum::{
    extract::{Multipart, State},
    Json,
};
use serde::ser::{SerializeMap, Serializer};
use serde::Serialize;
use tracing::info;

use greenthumb::soil::guide::{self, AnalysisInfo, NpkGuide, PhRangeInfo, TextureInfo};
use greenthumb::soil::SoilAnalysis;

use crate::error::ApiResult;
use crate::routes::read_single_file;
use crate::state::SharedState;

/// pH ranges keyed by name, in guide order
pub struct PhRanges(Vec<(&'static str, PhRangeInfo)>);

impl Serialize for PhRanges {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        let mut map = serializer.serialize_map(Some(self.0.len()))?;
        for (name, info) in &self.0 {
            map.serialize_entry(name, info)?;
        }
        map.end()
    }
}

#[derive(Serialize)]
pub struct TextureTypesResponse {
    pub textures: Vec<TextureInfo>,
}

#[derive(Serialize)]
pub struct PhGuideResponse {
    pub ph_ranges: PhRanges,
}

/// POST /soil/analyze - Estimate soil properties from a photo
pub async fn analyze_soil(
    State(state): State<SharedState>,
    multipart: Multipart,
) -> ApiResult<Json<SoilAnalysis>> {
    let file = read_single_file(multipart).await?;
    info!("Processing soil image: {}", file.filename);
    Ok(Json(state.analyze_soil(&file.bytes)?))
}

/// GET /soil/texture-types
pub async fn texture_types() -> Json<TextureTypesResponse> {
    Json(TextureTypesResponse {
        textures: guide::texture_types(),
    })
}

/// GET /soil/ph-guide
pub async fn ph_guide() -> Json<PhGuideResponse> {
    Json(PhGuideResponse {
        ph_ranges: PhRanges(guide::ph_guide()),
    })
}

/// GET /soil/npk-guide
pub async fn npk_guide() -> Json<NpkGuide> {
    Json(guide::npk_guide())
}

/// GET /soil/info
pub async fn info() -> Json<AnalysisInfo> {
    Json(guide::analysis_info())
}

#[cfg(test)]
mod tests {
    use crate::routes::test_support::*;
    use axum::http::StatusCode;
    use tempfile::TempDir;

    #[tokio::test]
    async fn test_soil_analysis() {
        let dir = TempDir::new().unwrap();
        let body = multipart(&[("file", "soil.png", &png(80, 120))]);
        let (status, json) =
            send(app(&dir), multipart_request("POST", "/soil/analyze", body)).await;

        assert_eq!(status, StatusCode::OK);
        assert!(json["pH"].is_number());
        assert!(json["texture"].is_string());
        assert!(json["recommendations"].as_array().unwrap().len() <= 6);
    }

    #[tokio::test]
    async fn test_soil_rejects_small_image() {
        let dir = TempDir::new().unwrap();
        let body = multipart(&[("file", "soil.png", &png(30, 120))]);
        let (status, json) =
            send(app(&dir), multipart_request("POST", "/soil/analyze", body)).await;

        assert_eq!(status, StatusCode::BAD_REQUEST);
        assert!(json["detail"].as_str().unwrap().starts_with("Invalid image"));
    }

    #[tokio::test]
    async fn test_guides() {
        let dir = TempDir::new().unwrap();
        let app = app(&dir);

        let (_, json) = send(app.clone(), empty_request("GET", "/soil/texture-types")).await;
        assert_eq!(json["textures"].as_array().unwrap().len(), 4);

        let (_, json) = send(app, empty_request("GET", "/soil/ph-guide")).await;
        assert_eq!(json["ph_ranges"]["neutral"]["range"], "6.5-7.5");
    }
}
