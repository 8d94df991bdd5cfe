use axum::{
    Json,
    extract::rejection::JsonRejection,
    http::StatusCode,
    response::{IntoResponse, Response},
};
use thiserror::Error;

/// Everything a handler can fail with. Client mistakes map to 400, anything
/// involving the media tool maps to 500.
#[derive(Debug, Error)]
pub enum ApiError {
    #[error("{0}")]
    Validation(String),
    #[error("Failed to fetch video info")]
    FetchFailed { details: String },
    #[error("Failed to parse video info")]
    ParseFailed { details: String },
    /// Only reachable before the first byte was sent. Once streaming has
    /// started a failure can only abort the body.
    #[error("Download failed")]
    StreamFailure,
}

impl ApiError {
    pub fn status(&self) -> StatusCode {
        match self {
            ApiError::Validation(_) => StatusCode::BAD_REQUEST,
            ApiError::FetchFailed { .. } | ApiError::ParseFailed { .. } | ApiError::StreamFailure => {
                StatusCode::INTERNAL_SERVER_ERROR
            }
        }
    }
}

impl From<JsonRejection> for ApiError {
    fn from(rejection: JsonRejection) -> Self {
        ApiError::Validation(format!("Invalid request body: {}", rejection.body_text()))
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let body = match &self {
            ApiError::FetchFailed { details } | ApiError::ParseFailed { details } => {
                serde_json::json!({ "error": self.to_string(), "details": details })
            }
            _ => serde_json::json!({ "error": self.to_string() }),
        };
        (self.status(), Json(body)).into_response()
    }
}
