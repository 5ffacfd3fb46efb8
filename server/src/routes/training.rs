//! Training control endpoints

use axum::{extract::State, Json};
use serde::Serialize;

use greenthumb::app::TrainingStatus;
use greenthumb::training::TrainingConfig;

use crate::error::ApiResult;
use crate::state::SharedState;

#[derive(Serialize)]
pub struct TrainingStartedResponse {
    pub status: &'static str,
    pub run_id: String,
    pub config: TrainingConfig,
    pub message: String,
}

/// POST /train - Start a background training run
pub async fn start_training(
    State(state): State<SharedState>,
    Json(config): Json<TrainingConfig>,
) -> ApiResult<Json<TrainingStartedResponse>> {
    let started = state.start_training(config).await?;
    Ok(Json(TrainingStartedResponse {
        status: "training_started",
        run_id: started.run_id,
        config: started.config,
        message: format!(
            "Model training started in background on {} images",
            started.train_candidates
        ),
    }))
}

/// GET /train/status - Current state of the training slot
pub async fn training_status(State(state): State<SharedState>) -> Json<TrainingStatus> {
    Json(state.training_status().await)
}

#[cfg(test)]
mod tests {
    use crate::routes::test_support::*;
    use axum::body::Body;
    use axum::http::{Request, StatusCode};
    use tempfile::TempDir;

    fn train_request(json: &str) -> Request<Body> {
        Request::builder()
            .method("POST")
            .uri("/train")
            .header("content-type", "application/json")
            .body(Body::from(json.to_string()))
            .unwrap()
    }

    #[tokio::test]
    async fn test_train_without_data() {
        let dir = TempDir::new().unwrap();
        let (status, json) = send(app(&dir), train_request(r#"{"epochs": 1}"#)).await;
        assert_eq!(status, StatusCode::BAD_REQUEST);
        assert!(json["detail"].as_str().unwrap().contains("empty"));
    }

    #[tokio::test]
    async fn test_train_invalid_config() {
        let dir = TempDir::new().unwrap();
        let (status, _) = send(app(&dir), train_request(r#"{"test_split": 1.5}"#)).await;
        assert_eq!(status, StatusCode::BAD_REQUEST);
    }

    #[tokio::test]
    async fn test_status_idle() {
        let dir = TempDir::new().unwrap();
        let (status, json) = send(app(&dir), empty_request("GET", "/train/status")).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(json["status"], "idle");
    }
}
