//! Dataset management endpoints

use axum::{
    extract::{Multipart, Query, State},
    Json,
};
use serde::{Deserialize, Serialize};

use greenthumb::app::UploadReceipt;
use greenthumb::dataset::DatasetStatistics;

use crate::error::ApiResult;
use crate::routes::read_single_file;
use crate::state::SharedState;

#[derive(Debug, Deserialize)]
pub struct UploadParams {
    pub crop_type: String,
    pub severity: i64,
}

#[derive(Serialize)]
pub struct UploadResponse {
    pub status: &'static str,
    #[serde(flatten)]
    pub receipt: UploadReceipt,
}

/// POST /upload-training-data?crop_type=&severity= - Store one labeled image
pub async fn upload_training_data(
    State(state): State<SharedState>,
    Query(params): Query<UploadParams>,
    multipart: Multipart,
) -> ApiResult<Json<UploadResponse>> {
    let file = read_single_file(multipart).await?;
    let receipt =
        state.upload_training_data(&params.crop_type, params.severity, &file.filename, &file.bytes)?;
    Ok(Json(UploadResponse {
        status: "success",
        receipt,
    }))
}

/// GET /dataset-stats - Per-crop, per-severity image counts
pub async fn dataset_stats(State(state): State<SharedState>) -> Json<DatasetStatistics> {
    Json(state.dataset_stats())
}
