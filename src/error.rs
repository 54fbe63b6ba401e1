use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::Json;
use serde_json::json;

/// Convenience alias used throughout the crate.
pub type Result<T> = std::result::Result<T, GatewayError>;

/// Errors produced by the gateway.
#[derive(Debug, thiserror::Error)]
pub enum GatewayError {
    /// The caller's request is missing or malformed input.
    #[error("{0}")]
    BadRequest(String),

    /// An upstream provider answered with a non-success status.
    ///
    /// The status is mirrored back to the caller and the provider body is
    /// captured as text for diagnostics.
    #[error("upstream returned HTTP {status}")]
    Upstream { status: u16, body: String },

    /// Outbound HTTP transport failure.
    #[error("request failed: {0}")]
    Request(#[from] reqwest::Error),

    /// URL parsing failure.
    #[error("invalid URL: {0}")]
    Url(#[from] url::ParseError),

    /// JSON (de)serialization failure.
    #[error("invalid JSON: {0}")]
    Json(#[from] serde_json::Error),

    /// Invalid or incomplete startup configuration.
    #[error("configuration error: {0}")]
    Config(String),

    /// The listener could not be started or the server failed.
    #[error("server error: {0}")]
    Server(String),

    /// Anything else unexpected inside a handler.
    #[error("{0}")]
    Internal(String),
}

impl IntoResponse for GatewayError {
    fn into_response(self) -> Response {
        match self {
            GatewayError::BadRequest(msg) => {
                (StatusCode::BAD_REQUEST, Json(json!({ "error": msg }))).into_response()
            }
            GatewayError::Upstream { status, body } => {
                let status = StatusCode::from_u16(status).unwrap_or(StatusCode::BAD_GATEWAY);
                (
                    status,
                    Json(json!({ "error": "upstream error", "details": body })),
                )
                    .into_response()
            }
            other => {
                tracing::error!(error = %other, "request failed");
                (
                    StatusCode::INTERNAL_SERVER_ERROR,
                    Json(json!({ "error": "internal error" })),
                )
                    .into_response()
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn bad_request_maps_to_400() {
        let response = GatewayError::BadRequest("missing required field: code".into())
            .into_response();
        assert_eq!(response.status(), StatusCode::BAD_REQUEST);
    }

    #[test]
    fn upstream_status_is_mirrored() {
        let response = GatewayError::Upstream {
            status: 401,
            body: "{\"error\":\"invalid_grant\"}".into(),
        }
        .into_response();
        assert_eq!(response.status(), StatusCode::UNAUTHORIZED);
    }

    #[test]
    fn unexpected_errors_collapse_to_500() {
        let response = GatewayError::Internal("boom".into()).into_response();
        assert_eq!(response.status(), StatusCode::INTERNAL_SERVER_ERROR);
    }
}
