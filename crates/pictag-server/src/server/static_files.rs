use crate::server::error::ApiError;
use axum::{
    http::{header, StatusCode, Uri},
    response::{Html, IntoResponse, Response},
};
use rust_embed::Embed;

#[derive(Embed)]
#[folder = "web"]
struct WebAssets;

const INDEX: &str = "index.html";

/// Serve the upload page
pub async fn index() -> Response {
    match <WebAssets as Embed>::get(INDEX) {
        Some(content) => Html(String::from_utf8_lossy(&content.data).into_owned()).into_response(),
        None => ApiError::Internal(format!("{} is not embedded", INDEX)).into_response(),
    }
}

/// Serve other embedded assets by path, JSON 404 otherwise
pub async fn serve_static(uri: Uri) -> Response {
    let path = uri.path().trim_start_matches('/');

    if let Some(content) = <WebAssets as Embed>::get(path) {
        let mime = mime_guess::from_path(path).first_or_octet_stream();
        return (
            StatusCode::OK,
            [(header::CONTENT_TYPE, mime.as_ref())],
            content.data.into_owned(),
        )
            .into_response();
    }

    ApiError::NotFound.into_response()
}
