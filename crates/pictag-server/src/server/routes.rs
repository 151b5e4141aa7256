use crate::server::error::ApiError;
use crate::state::AppState;
use axum::{
    body::Bytes,
    extract::{multipart::MultipartRejection, Multipart, State},
    http::header,
    response::{IntoResponse, Response},
    Json,
};
use pictag_core::{ClassificationResult, Error};
use pictag_vision::decode_rgb;
use std::time::Instant;
use tracing::debug;

/// Content types accepted for the `file` field
pub const SUPPORTED_CONTENT_TYPES: [&str; 3] = ["image/jpeg", "image/png", "image/webp"];

const FILE_FIELD: &str = "file";

// ============================================================================
// Health endpoints
// ============================================================================

pub async fn health(State(state): State<AppState>) -> impl IntoResponse {
    Json(serde_json::json!({
        "status": "ok",
        "model_id": state.model_id(),
        "classes": state.classifier.num_classes(),
    }))
}

pub async fn metrics(State(state): State<AppState>) -> Result<Response, ApiError> {
    let handle = state.metrics.as_ref().ok_or(ApiError::NotFound)?;
    Ok((
        [(header::CONTENT_TYPE, "text/plain; version=0.0.4")],
        handle.render(),
    )
        .into_response())
}

// ============================================================================
// Classification
// ============================================================================

/// Uploaded `file` field
#[derive(Debug)]
struct Upload {
    filename: String,
    content_type: Option<String>,
    bytes: Bytes,
}

pub async fn classify(
    State(state): State<AppState>,
    multipart: Result<Multipart, MultipartRejection>,
) -> Result<Json<ClassificationResult>, ApiError> {
    let start = Instant::now();
    let result = classify_upload(&state, multipart).await;
    let latency_us = start.elapsed().as_micros() as u64;

    let outcome = match &result {
        Ok(_) => "ok",
        Err(err) => err.outcome(),
    };
    metrics::counter!("pictag_requests_total", "outcome" => outcome).increment(1);

    if let Ok(response) = &result {
        metrics::histogram!("pictag_inference_latency_us").record(latency_us as f64);
        debug!(
            filename = %response.filename,
            label = %response.label,
            confidence = response.confidence,
            latency_us,
            "Classified upload"
        );
    }

    result.map(Json)
}

async fn classify_upload(
    state: &AppState,
    multipart: Result<Multipart, MultipartRejection>,
) -> Result<ClassificationResult, ApiError> {
    let upload = read_upload(multipart?).await?;
    debug!(
        filename = %upload.filename,
        content_type = upload.content_type.as_deref().unwrap_or(""),
        size = upload.bytes.len(),
        "Received upload"
    );

    // Decoding and the forward pass are CPU/GPU bound; keep them off the async workers.
    let classifier = state.classifier.clone();
    let bytes = upload.bytes;
    let prediction = tokio::task::spawn_blocking(move || {
        let image = decode_rgb(&bytes)?;
        classifier.classify(&image)
    })
    .await??;

    Ok(ClassificationResult::from_prediction(
        upload.filename,
        state.model_id(),
        prediction,
    ))
}

/// Find the `file` field, check its declared type, then read its bytes
async fn read_upload(mut multipart: Multipart) -> Result<Upload, ApiError> {
    while let Some(field) = multipart.next_field().await? {
        if field.name() != Some(FILE_FIELD) {
            continue;
        }

        let filename = field.file_name().unwrap_or_default().to_string();
        let content_type = field.content_type().map(str::to_string);
        check_content_type(content_type.as_deref())?;

        let bytes = field.bytes().await?;
        return Ok(Upload {
            filename,
            content_type,
            bytes,
        });
    }

    Err(ApiError::InvalidForm(format!(
        "Field '{}' is required.",
        FILE_FIELD
    )))
}

fn check_content_type(content_type: Option<&str>) -> Result<(), Error> {
    match content_type {
        Some(ct) if SUPPORTED_CONTENT_TYPES.contains(&ct) => Ok(()),
        other => Err(Error::unsupported_media_type(other.unwrap_or("none"))),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_check_content_type() {
        for ct in SUPPORTED_CONTENT_TYPES {
            assert!(check_content_type(Some(ct)).is_ok());
        }
        assert!(check_content_type(Some("text/plain")).is_err());
        assert!(check_content_type(Some("image/gif")).is_err());
        assert!(check_content_type(Some("IMAGE/PNG")).is_err());
        assert!(check_content_type(None).is_err());
    }
}
