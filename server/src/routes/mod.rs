//! Route table and shared multipart helpers

pub mod analyze;
pub mod dataset;
pub mod health;
pub mod model;
pub mod soil;
pub mod training;

use axum::{
    extract::{DefaultBodyLimit, Multipart},
    routing::{delete, get, post},
    Router,
};
use tower_http::cors::{Any, CorsLayer};
use tower_http::trace::TraceLayer;

use crate::error::{ApiError, ApiResult};
use crate::state::SharedState;

/// Largest accepted request body
const MAX_UPLOAD_BYTES: usize = 32 * 1024 * 1024;

/// A file part of a multipart upload
pub struct UploadedFile {
    pub filename: String,
    pub bytes: Vec<u8>,
}

/// Collect every file part of a multipart body, in order
pub async fn read_files(mut multipart: Multipart) -> ApiResult<Vec<UploadedFile>> {
    let mut files = Vec::new();
    while let Some(field) = multipart.next_field().await? {
        let Some(filename) = field.file_name().map(str::to_string) else {
            continue;
        };
        let bytes = field.bytes().await?.to_vec();
        files.push(UploadedFile { filename, bytes });
    }
    Ok(files)
}

/// The first file part of a multipart body
pub async fn read_single_file(multipart: Multipart) -> ApiResult<UploadedFile> {
    read_files(multipart)
        .await?
        .into_iter()
        .next()
        .ok_or_else(|| ApiError::bad_request("No file uploaded"))
}

pub fn router(state: SharedState) -> Router {
    Router::new()
        .route("/health", get(health::health_check))
        // Leaf analysis
        .route("/analyze", post(analyze::analyze_plant))
        .route("/batch-analyze", post(analyze::batch_analyze))
        // Training
        .route("/train", post(training::start_training))
        .route("/train/status", get(training::training_status))
        // Dataset
        .route("/upload-training-data", post(dataset::upload_training_data))
        .route("/dataset-stats", get(dataset::dataset_stats))
        // Model
        .route("/model-info", get(model::model_info))
        .route("/reset-model", delete(model::reset_model))
        // Soil
        .route("/soil/analyze", post(soil::analyze_soil))
        .route("/soil/texture-types", get(soil::texture_types))
        .route("/soil/ph-guide", get(soil::ph_guide))
        .route("/soil/npk-guide", get(soil::npk_guide))
        .route("/soil/info", get(soil::info))
        .with_state(state)
        .layer(DefaultBodyLimit::max(MAX_UPLOAD_BYTES))
        .layer(TraceLayer::new_for_http())
        .layer(
            CorsLayer::new()
                .allow_origin(Any)
                .allow_methods(Any)
                .allow_headers(Any),
        )
}

#[cfg(test)]
pub(crate) mod test_support {
    use std::io::Cursor;
    use std::sync::Arc;

    use axum::body::Body;
    use axum::http::{Request, StatusCode};
    use axum::Router;
    use greenthumb::app::{AppConfig, AppContext};
    use greenthumb::model::ClassifierConfig;
    use http_body_util::BodyExt;
    use image::{DynamicImage, ImageBuffer, Rgb};
    use tempfile::TempDir;
    use tower::ServiceExt;

    pub const BOUNDARY: &str = "greenthumb-test-boundary";

    pub fn app(dir: &TempDir) -> Router {
        let config = AppConfig::with_root(dir.path()).with_classifier(ClassifierConfig::compact(16));
        super::router(Arc::new(AppContext::new(config).unwrap()))
    }

    pub fn png(side: u32, shade: u8) -> Vec<u8> {
        let img = DynamicImage::ImageRgb8(ImageBuffer::from_fn(side, side, |x, y| {
            Rgb([shade, (x % 256) as u8, (y % 256) as u8])
        }));
        let mut bytes = Vec::new();
        img.write_to(&mut Cursor::new(&mut bytes), image::ImageFormat::Png)
            .unwrap();
        bytes
    }

    /// Build a multipart body with one part per `(field, filename, bytes)`
    pub fn multipart(parts: &[(&str, &str, &[u8])]) -> Vec<u8> {
        let mut body = Vec::new();
        for (field, filename, bytes) in parts {
            body.extend_from_slice(
                format!(
                    "--{BOUNDARY}\r\nContent-Disposition: form-data; name=\"{field}\"; filename=\"{filename}\"\r\nContent-Type: image/png\r\n\r\n"
                )
                .as_bytes(),
            );
            body.extend_from_slice(bytes);
            body.extend_from_slice(b"\r\n");
        }
        body.extend_from_slice(format!("--{BOUNDARY}--\r\n").as_bytes());
        body
    }

    pub fn multipart_request(method: &str, uri: &str, body: Vec<u8>) -> Request<Body> {
        Request::builder()
            .method(method)
            .uri(uri)
            .header(
                "content-type",
                format!("multipart/form-data; boundary={BOUNDARY}"),
            )
            .body(Body::from(body))
            .unwrap()
    }

    pub fn empty_request(method: &str, uri: &str) -> Request<Body> {
        Request::builder()
            .method(method)
            .uri(uri)
            .body(Body::empty())
            .unwrap()
    }

    pub async fn send(app: Router, request: Request<Body>) -> (StatusCode, serde_json::Value) {
        let response = app.oneshot(request).await.unwrap();
        let status = response.status();
        let bytes = response.into_body().collect().await.unwrap().to_bytes();
        let json = serde_json::from_slice(&bytes).unwrap_or(serde_json::Value::Null);
        (status, json)
    }
}
