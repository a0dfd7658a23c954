//! Error types for the read endpoint.
//!
//! [`ApiError`] converts into an Axum response with a JSON body of the form
//! `{"error": "...", "status": 500}`.

use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use massbot_indexer::IndexerError;
use massbot_types::TokenId;

/// Errors that can occur in the API layer.
#[derive(Debug, thiserror::Error)]
pub enum ApiError {
    /// The store has no record for the requested token.
    #[error("no record for token {0}")]
    MissingRecord(TokenId),

    /// The path did not contain a valid token identifier.
    #[error("invalid token id: {0}")]
    InvalidId(String),

    /// The ledger could not be reached while resolving the owner.
    #[error("ledger unavailable: {0}")]
    Upstream(String),

    /// The store failed.
    #[error("internal error: {0}")]
    Internal(String),
}

impl From<IndexerError> for ApiError {
    fn from(err: IndexerError) -> Self {
        match err {
            IndexerError::Chain(e) => Self::Upstream(e.to_string()),
            other => Self::Internal(other.to_string()),
        }
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let status = match &self {
            Self::MissingRecord(_) | Self::Internal(_) => StatusCode::INTERNAL_SERVER_ERROR,
            Self::InvalidId(_) => StatusCode::BAD_REQUEST,
            Self::Upstream(_) => StatusCode::BAD_GATEWAY,
        };
        if status.is_server_error() {
            tracing::warn!(error = %self, "rank request failed");
        }

        let body = serde_json::json!({
            "error": self.to_string(),
            "status": status.as_u16(),
        });

        (status, axum::Json(body)).into_response()
    }
}
