//! HTTP handlers for the analysis and learning API

use axum::{
    extract::{Multipart, State},
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use serde::{Deserialize, Serialize};
use serde_json::json;

use crate::error::MlError;
use crate::samples::{LabelCorrections, SampleMetadata};
use crate::server::ServerState;

/// Hard cap on images per batch request
pub const MAX_BATCH_IMAGES: usize = 10;

/// Feedback submission body
#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct FeedbackRequest {
    pub tire_id: String,
    pub sample_id: String,
    pub rating: u8,
    #[serde(default)]
    pub corrections: Option<LabelCorrections>,
}

/// Health response
#[derive(Debug, Serialize)]
pub struct HealthResponse {
    pub status: String,
    pub version: String,
    pub models: Vec<String>,
    pub timestamp: chrono::DateTime<chrono::Utc>,
}

fn error_body(error: &MlError) -> Response {
    let label = match error.status_code() {
        StatusCode::BAD_REQUEST => "Invalid request",
        StatusCode::NOT_FOUND => "Not found",
        StatusCode::PAYLOAD_TOO_LARGE => "Payload too large",
        StatusCode::SERVICE_UNAVAILABLE => "Model endpoint unavailable",
        _ => "Internal error",
    };
    (
        error.status_code(),
        Json(json!({
            "error": label,
            "details": error.to_string()
        })),
    )
        .into_response()
}

/// Health handler
pub async fn health_handler(State(state): State<ServerState>) -> impl IntoResponse {
    let response = HealthResponse {
        status: "ok".to_string(),
        version: env!("CARGO_PKG_VERSION").to_string(),
        models: state.inference.loaded_model_names().await,
        timestamp: chrono::Utc::now(),
    };
    (StatusCode::OK, Json(response)).into_response()
}

/// Single-image analysis handler
pub async fn analyze_handler(
    State(state): State<ServerState>,
    mut multipart: Multipart,
) -> impl IntoResponse {
    let image = match read_image_field(&mut multipart).await {
        Ok(Some(image)) => image,
        Ok(None) => {
            return (
                StatusCode::BAD_REQUEST,
                Json(json!({ "error": "Missing 'image' field in multipart body" })),
            )
                .into_response();
        }
        Err(response) => return response,
    };

    match state.inference.analyze(&image.0, &image.1).await {
        Ok(analysis) => (
            StatusCode::OK,
            Json(json!({
                "success": true,
                "analysis": analysis,
                "timestamp": chrono::Utc::now()
            })),
        )
            .into_response(),
        Err(e) => error_body(&e),
    }
}

/// Batch analysis handler, up to [`MAX_BATCH_IMAGES`] images per request
pub async fn batch_analyze_handler(
    State(state): State<ServerState>,
    mut multipart: Multipart,
) -> impl IntoResponse {
    let mut images: Vec<(String, Vec<u8>)> = Vec::new();
    loop {
        match read_image_field(&mut multipart).await {
            Ok(Some(image)) => images.push(image),
            Ok(None) => break,
            Err(response) => return response,
        }
        if images.len() > MAX_BATCH_IMAGES {
            return (
                StatusCode::BAD_REQUEST,
                Json(json!({
                    "error": "Too many images",
                    "details": format!("batch limit is {MAX_BATCH_IMAGES} images")
                })),
            )
                .into_response();
        }
    }
    if images.is_empty() {
        return (
            StatusCode::BAD_REQUEST,
            Json(json!({ "error": "No image fields in multipart body" })),
        )
            .into_response();
    }

    match state.inference.batch_analyze(&images).await {
        Ok(results) => (
            StatusCode::OK,
            Json(json!({
                "success": true,
                "count": results.len(),
                "results": results,
                "timestamp": chrono::Utc::now()
            })),
        )
            .into_response(),
        Err(e) => error_body(&e),
    }
}

/// Model registry handler
pub async fn models_handler(State(state): State<ServerState>) -> impl IntoResponse {
    let models = state.inference.model_statuses().await;
    (StatusCode::OK, Json(json!({ "models": models }))).into_response()
}

/// Learning stats handler
pub async fn stats_handler(State(state): State<ServerState>) -> impl IntoResponse {
    match state.coordinator.get_learning_stats() {
        Ok(stats) => (StatusCode::OK, Json(stats)).into_response(),
        Err(e) => error_body(&e),
    }
}

/// Photo capture handler: multipart with an image plus text fields
/// (`tireId` required; `vehicleId` and capture context optional)
pub async fn capture_handler(
    State(state): State<ServerState>,
    mut multipart: Multipart,
) -> impl IntoResponse {
    let mut image: Option<(String, Vec<u8>)> = None;
    let mut tire_id: Option<String> = None;
    let mut vehicle_id: Option<String> = None;
    let mut metadata = SampleMetadata::default();

    loop {
        let field = match multipart.next_field().await {
            Ok(Some(field)) => field,
            Ok(None) => break,
            Err(e) => {
                return (
                    StatusCode::BAD_REQUEST,
                    Json(json!({
                        "error": "Malformed multipart body",
                        "details": e.to_string()
                    })),
                )
                    .into_response();
            }
        };
        let name = field.name().unwrap_or_default().to_string();
        match name.as_str() {
            "image" => {
                let filename = field.file_name().unwrap_or("capture.jpg").to_string();
                match field.bytes().await {
                    Ok(bytes) => image = Some((filename, bytes.to_vec())),
                    Err(e) => {
                        return (
                            StatusCode::BAD_REQUEST,
                            Json(json!({
                                "error": "Failed to read image field",
                                "details": e.to_string()
                            })),
                        )
                            .into_response();
                    }
                }
            }
            other => {
                let value = match field.text().await {
                    Ok(text) => text,
                    Err(_) => continue,
                };
                match other {
                    "tireId" => tire_id = Some(value),
                    "vehicleId" => vehicle_id = Some(value),
                    "deviceInfo" => metadata.device_info = Some(value),
                    "lighting" => metadata.lighting = Some(value),
                    "cameraAngle" => metadata.camera_angle = Some(value),
                    "userId" => metadata.user_id = Some(value),
                    _ => {}
                }
            }
        }
    }

    let Some(tire_id) = tire_id else {
        return (
            StatusCode::BAD_REQUEST,
            Json(json!({ "error": "Missing required field 'tireId'" })),
        )
            .into_response();
    };
    let Some((_, raw)) = image else {
        return (
            StatusCode::BAD_REQUEST,
            Json(json!({ "error": "Missing 'image' field in multipart body" })),
        )
            .into_response();
    };

    match state
        .coordinator
        .on_photo_captured(&tire_id, vehicle_id.as_deref(), &raw, metadata)
        .await
    {
        Ok(sample) => (
            StatusCode::OK,
            Json(json!({
                "success": true,
                "sampleId": sample.id,
                "labels": sample.labels
            })),
        )
            .into_response(),
        Err(e) => error_body(&e),
    }
}

/// User feedback handler
pub async fn feedback_handler(
    State(state): State<ServerState>,
    Json(req): Json<FeedbackRequest>,
) -> impl IntoResponse {
    match state
        .coordinator
        .on_user_feedback(&req.tire_id, &req.sample_id, req.rating, req.corrections)
        .await
    {
        Ok(sample) => (
            StatusCode::OK,
            Json(json!({
                "success": true,
                "sampleId": sample.id,
                "expertValidation": sample.expert_validation,
                "labels": sample.labels
            })),
        )
            .into_response(),
        Err(e) => error_body(&e),
    }
}

/// Pull the next image field out of a multipart stream. Returns `Ok(None)`
/// when the stream is exhausted; non-image fields are skipped.
async fn read_image_field(
    multipart: &mut Multipart,
) -> Result<Option<(String, Vec<u8>)>, Response> {
    loop {
        let field = match multipart.next_field().await {
            Ok(Some(field)) => field,
            Ok(None) => return Ok(None),
            Err(e) => {
                return Err((
                    StatusCode::BAD_REQUEST,
                    Json(json!({
                        "error": "Malformed multipart body",
                        "details": e.to_string()
                    })),
                )
                    .into_response());
            }
        };
        let name = field.name().unwrap_or_default();
        if name != "image" && name != "images" {
            continue;
        }
        let filename = field.file_name().unwrap_or("image.jpg").to_string();
        match field.bytes().await {
            Ok(bytes) => return Ok(Some((filename, bytes.to_vec()))),
            Err(e) => {
                return Err((
                    StatusCode::BAD_REQUEST,
                    Json(json!({
                        "error": "Failed to read image field",
                        "details": e.to_string()
                    })),
                )
                    .into_response());
            }
        }
    }
}
