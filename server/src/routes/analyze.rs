//! Leaf analysis endpoints

use axum::{
    extract::{Multipart, State},
    Json,
};
use tracing::info;

use greenthumb::app::Analysis;
use greenthumb::inference::BatchReport;

use crate::error::ApiResult;
use crate::routes::{read_files, read_single_file};
use crate::state::SharedState;

/// POST /analyze - Classify one leaf image
pub async fn analyze_plant(
    State(state): State<SharedState>,
    multipart: Multipart,
) -> ApiResult<Json<Analysis>> {
    let file = read_single_file(multipart).await?;
    info!("Analyzing {}", file.filename);
    Ok(Json(state.analyze(&file.bytes).await?))
}

/// POST /batch-analyze - Classify several leaf images
pub async fn batch_analyze(
    State(state): State<SharedState>,
    multipart: Multipart,
) -> ApiResult<Json<BatchReport>> {
    let files: Vec<(String, Vec<u8>)> = read_files(multipart)
        .await?
        .into_iter()
        .map(|f| (f.filename, f.bytes))
        .collect();
    info!("Batch analysis of {} images", files.len());
    Ok(Json(state.batch_analyze(files).await?))
}
