//! Caller-visible API errors and their JSON bodies.

use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::Json;
use serde_json::{json, Value};

const BLOCKED_SUGGESTION: &str =
    "YouTube is rejecting this server's address. Retry in a few minutes; a fresh set of relays may succeed.";

/// API error type that converts to the appropriate HTTP response.
///
/// Every body carries `success: false` and an `error` message; variants tied
/// to a video also carry its id.
#[derive(Debug, thiserror::Error)]
pub enum ApiError {
    #[error("Missing video_id parameter")]
    MissingParameter,

    /// Direct fetch was blocked and every relay attempt failed
    #[error("YouTube is blocking requests and no relay could get through")]
    Blocked {
        video_id: String,
        proxies_tried: usize,
        pool_size: usize,
        details: String,
    },

    /// Captions are disabled or absent for the video
    #[error("{message}")]
    Unavailable { video_id: String, message: String },

    /// Uncategorized upstream failure
    #[error("{message}")]
    Fetch { video_id: String, message: String },

    /// Unexpected failure while shaping the response
    #[error("Internal error: {message}")]
    Internal { video_id: String, message: String },
}

impl ApiError {
    pub fn status(&self) -> StatusCode {
        match self {
            Self::MissingParameter => StatusCode::BAD_REQUEST,
            Self::Blocked { .. } => StatusCode::SERVICE_UNAVAILABLE,
            Self::Unavailable { .. } => StatusCode::NOT_FOUND,
            Self::Fetch { .. } | Self::Internal { .. } => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }

    /// JSON error body
    pub fn body(&self) -> Value {
        let error = self.to_string();
        match self {
            Self::MissingParameter => json!({
                "success": false,
                "error": error,
            }),
            Self::Blocked {
                video_id,
                proxies_tried,
                pool_size,
                details,
            } => json!({
                "success": false,
                "error": error,
                "video_id": video_id,
                "proxies_tried": proxies_tried,
                "pool_size": pool_size,
                "details": details,
                "suggestion": BLOCKED_SUGGESTION,
            }),
            Self::Unavailable { video_id, .. }
            | Self::Fetch { video_id, .. }
            | Self::Internal { video_id, .. } => json!({
                "success": false,
                "error": error,
                "video_id": video_id,
            }),
        }
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let status = self.status();
        if status.is_server_error() {
            tracing::error!(error = %self, status = status.as_u16(), "request failed");
        } else {
            tracing::info!(error = %self, status = status.as_u16(), "request rejected");
        }

        (status, Json(self.body())).into_response()
    }
}
