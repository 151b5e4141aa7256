//! HTTP error responses

use axum::{
    extract::multipart::{MultipartError, MultipartRejection},
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use serde_json::json;
use tracing::{debug, error};

pub const UNSUPPORTED_MEDIA_TYPE_DETAIL: &str = "Only JPEG/PNG/WEBP images are supported.";
pub const INVALID_IMAGE_DETAIL: &str = "Invalid image file.";

/// Errors a handler can return; every variant renders as `{"detail": ...}`
#[derive(Debug)]
pub enum ApiError {
    UnsupportedMediaType,
    InvalidImage,
    InvalidForm(String),
    Multipart { status: StatusCode, detail: String },
    NotFound,
    Internal(String),
}

impl ApiError {
    /// Label for the request outcome metric
    pub fn outcome(&self) -> &'static str {
        match self {
            Self::UnsupportedMediaType => "unsupported_media_type",
            Self::InvalidImage => "invalid_image",
            Self::InvalidForm(_) | Self::Multipart { .. } => "invalid_form",
            Self::NotFound => "not_found",
            Self::Internal(_) => "internal_error",
        }
    }
}

impl From<pictag_core::Error> for ApiError {
    fn from(err: pictag_core::Error) -> Self {
        match err {
            pictag_core::Error::UnsupportedMediaType(_) => ApiError::UnsupportedMediaType,
            pictag_core::Error::InvalidImage { kind, detail } => {
                debug!(kind = %kind, "Rejected upload: {}", detail);
                ApiError::InvalidImage
            }
            other => ApiError::Internal(other.to_string()),
        }
    }
}

impl From<MultipartError> for ApiError {
    fn from(err: MultipartError) -> Self {
        ApiError::Multipart {
            status: err.status(),
            detail: err.body_text(),
        }
    }
}

impl From<MultipartRejection> for ApiError {
    fn from(rejection: MultipartRejection) -> Self {
        ApiError::InvalidForm(rejection.body_text())
    }
}

impl From<tokio::task::JoinError> for ApiError {
    fn from(err: tokio::task::JoinError) -> Self {
        ApiError::Internal(format!("inference task failed: {}", err))
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let (status, detail) = match self {
            ApiError::UnsupportedMediaType => (
                StatusCode::UNSUPPORTED_MEDIA_TYPE,
                UNSUPPORTED_MEDIA_TYPE_DETAIL.to_string(),
            ),
            ApiError::InvalidImage => (StatusCode::BAD_REQUEST, INVALID_IMAGE_DETAIL.to_string()),
            ApiError::InvalidForm(detail) => (StatusCode::UNPROCESSABLE_ENTITY, detail),
            ApiError::Multipart { status, detail } => (status, detail),
            ApiError::NotFound => (StatusCode::NOT_FOUND, "Not Found".to_string()),
            ApiError::Internal(msg) => {
                error!("Request failed: {}", msg);
                (
                    StatusCode::INTERNAL_SERVER_ERROR,
                    "Internal Server Error".to_string(),
                )
            }
        };

        (status, Json(json!({ "detail": detail }))).into_response()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pictag_core::{DecodeErrorKind, Error};

    #[test]
    fn test_core_error_mapping() {
        assert!(matches!(
            ApiError::from(Error::unsupported_media_type("text/plain")),
            ApiError::UnsupportedMediaType
        ));
        assert!(matches!(
            ApiError::from(Error::invalid_image(DecodeErrorKind::Corrupt, "bad header")),
            ApiError::InvalidImage
        ));
        assert!(matches!(
            ApiError::from(Error::inference("forward failed")),
            ApiError::Internal(_)
        ));
    }

    #[test]
    fn test_status_codes() {
        let cases = [
            (ApiError::UnsupportedMediaType, StatusCode::UNSUPPORTED_MEDIA_TYPE),
            (ApiError::InvalidImage, StatusCode::BAD_REQUEST),
            (ApiError::InvalidForm("missing".into()), StatusCode::UNPROCESSABLE_ENTITY),
            (ApiError::NotFound, StatusCode::NOT_FOUND),
            (ApiError::Internal("boom".into()), StatusCode::INTERNAL_SERVER_ERROR),
        ];
        for (err, status) in cases {
            assert_eq!(err.into_response().status(), status);
        }
    }
}
