//! Model information and reset endpoints

use axum::{extract::State, Json};
use serde::Serialize;

use greenthumb::model::ModelInfo;

use crate::error::ApiResult;
use crate::state::SharedState;

#[derive(Serialize)]
pub struct ResetResponse {
    pub status: &'static str,
    pub message: &'static str,
}

/// GET /model-info - Architecture and label sets of the serving model
pub async fn model_info(State(state): State<SharedState>) -> Json<ModelInfo> {
    Json(state.model_info().await)
}

/// DELETE /reset-model - Return the serving model to its initial weights
pub async fn reset_model(State(state): State<SharedState>) -> ApiResult<Json<ResetResponse>> {
    state.reset_model().await?;
    Ok(Json(ResetResponse {
        status: "success",
        message: "Model reset to initial state",
    }))
}

#[cfg(test)]
mod tests {
    use crate::routes::test_support::*;
    use axum::http::StatusCode;
    use tempfile::TempDir;

    #[tokio::test]
    async fn test_model_info_and_reset() {
        let dir = TempDir::new().unwrap();
        let app = app(&dir);

        let (status, json) = send(app.clone(), empty_request("GET", "/model-info")).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(json["crops_supported"].as_array().unwrap().len(), 10);
        assert_eq!(json["severity_levels"][5], 100);

        let (status, json) = send(app, empty_request("DELETE", "/reset-model")).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(json["status"], "success");
    }
}
