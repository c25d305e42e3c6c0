//! HTTP surface: `POST /convert-pdf` and `GET /health`.
//!
//! A thin axum layer over [`Converter`]. Handlers do no work of their own
//! beyond decoding the request and choosing response headers; every
//! failure is a [`Pdf2ImgError`] rendered as `{"detail": "..."}` with the
//! status from [`Pdf2ImgError::status_code`].

use crate::convert::Converter;
use crate::error::Pdf2ImgError;
use crate::output::ConversionResult;
use axum::{
    extract::{rejection::JsonRejection, State},
    http::{header, StatusCode},
    response::{IntoResponse, Response},
    routing::{get, post},
    Json, Router,
};
use serde::{Deserialize, Serialize};
use serde_json::json;
use std::time::Duration;
use tower_http::timeout::TimeoutLayer;
use tower_http::trace::TraceLayer;

/// Archive download filename.
pub const ARCHIVE_FILENAME: &str = "converted_pages.zip";

/// Shared state handed to every handler.
#[derive(Clone)]
pub struct AppState {
    pub converter: Converter,
}

/// Body of `POST /convert-pdf`.
#[derive(Debug, Deserialize, Serialize)]
pub struct ConvertRequest {
    pub url: String,
}

/// Build the service router.
pub fn router(converter: Converter) -> Router {
    Router::new()
        .route("/health", get(health))
        .route("/convert-pdf", post(convert_pdf))
        .layer(TraceLayer::new_for_http())
        .with_state(AppState { converter })
}

/// [`router`] with a whole-request deadline; expired requests get 408.
pub fn router_with_timeout(converter: Converter, timeout: Duration) -> Router {
    router(converter).layer(TimeoutLayer::with_status_code(
        StatusCode::REQUEST_TIMEOUT,
        timeout,
    ))
}

/// Liveness probe; independent of the pipeline.
pub async fn health() -> Json<serde_json::Value> {
    Json(json!({ "status": "ok" }))
}

/// Convert the PDF at the requested URL.
pub async fn convert_pdf(
    State(state): State<AppState>,
    payload: Result<Json<ConvertRequest>, JsonRejection>,
) -> Result<Response, Pdf2ImgError> {
    let Json(req) = payload.map_err(|e| Pdf2ImgError::InvalidRequest(e.body_text()))?;
    tracing::info!("Conversion request for '{}'", req.url);

    let conversion = state.converter.convert_default(&req.url).await?;

    let response = match conversion.result {
        ConversionResult::Archive(bytes) => (
            StatusCode::OK,
            [
                (header::CONTENT_TYPE, "application/zip".to_string()),
                (
                    header::CONTENT_DISPOSITION,
                    format!("attachment; filename={ARCHIVE_FILENAME}"),
                ),
            ],
            bytes,
        )
            .into_response(),
        ConversionResult::Inline(list) => (StatusCode::OK, Json(list)).into_response(),
    };

    Ok(response)
}

impl IntoResponse for Pdf2ImgError {
    fn into_response(self) -> Response {
        let status =
            StatusCode::from_u16(self.status_code()).unwrap_or(StatusCode::INTERNAL_SERVER_ERROR);

        let detail = match self {
            Self::Internal(_) | Self::InvalidConfig(_) => {
                tracing::error!("Internal error: {}", self);
                "An internal error occurred".to_string()
            }
            _ => self.to_string(),
        };

        (status, Json(json!({ "detail": detail }))).into_response()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::body::to_bytes;

    async fn body_json(resp: Response) -> serde_json::Value {
        let bytes = to_bytes(resp.into_body(), usize::MAX).await.unwrap();
        serde_json::from_slice(&bytes).unwrap()
    }

    #[tokio::test]
    async fn error_response_carries_status_and_detail() {
        let resp = Pdf2ImgError::RemoteFetch {
            url: "https://example.com/a.pdf".into(),
            status: 404,
        }
        .into_response();
        assert_eq!(resp.status(), StatusCode::BAD_REQUEST);
        let json = body_json(resp).await;
        assert!(json["detail"].as_str().unwrap().contains("404"));
    }

    #[tokio::test]
    async fn internal_error_detail_is_generic() {
        let resp = Pdf2ImgError::Internal("join error: secret path".into()).into_response();
        assert_eq!(resp.status(), StatusCode::INTERNAL_SERVER_ERROR);
        let json = body_json(resp).await;
        assert_eq!(json["detail"], "An internal error occurred");
    }

    #[tokio::test]
    async fn overload_maps_to_service_unavailable() {
        let resp = Pdf2ImgError::Overloaded { queued: 8 }.into_response();
        assert_eq!(resp.status(), StatusCode::SERVICE_UNAVAILABLE);
    }

    #[tokio::test]
    async fn health_is_ok() {
        let Json(v) = health().await;
        assert_eq!(v, json!({ "status": "ok" }));
    }
}
