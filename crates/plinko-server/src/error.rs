//! Query API errors and their JSON rendering

use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::Json;
use serde::Serialize;
use thiserror::Error;

/// Body of every non-2xx response: `{"error": "...", "code": "..."}`
#[derive(Debug, Serialize)]
pub struct ErrorBody {
    pub error: String,
    pub code: &'static str,
}

#[derive(Error, Debug)]
pub enum ServerError {
    /// Request body or query string could not be decoded
    #[error("Invalid query: {0}")]
    InvalidQuery(String),

    #[error("Invalid PRF key: {0}")]
    InvalidPrfKey(String),

    #[error("Snapshot error: {0}")]
    Snapshot(#[from] plinko_core::Error),

    #[error("I/O failure: {0}")]
    Io(#[from] std::io::Error),

    #[error("Internal failure: {0}")]
    Internal(String),
}

impl ServerError {
    /// HTTP status and machine-readable code
    fn classify(&self) -> (StatusCode, &'static str) {
        match self {
            Self::InvalidQuery(_) => (StatusCode::BAD_REQUEST, "INVALID_QUERY"),
            Self::InvalidPrfKey(_) => (StatusCode::BAD_REQUEST, "INVALID_PRF_KEY"),
            Self::Snapshot(_) => (StatusCode::INTERNAL_SERVER_ERROR, "SNAPSHOT_ERROR"),
            Self::Io(_) => (StatusCode::INTERNAL_SERVER_ERROR, "IO_ERROR"),
            Self::Internal(_) => (StatusCode::INTERNAL_SERVER_ERROR, "INTERNAL_ERROR"),
        }
    }
}

impl IntoResponse for ServerError {
    fn into_response(self) -> Response {
        let (status, code) = self.classify();
        let body = Json(ErrorBody {
            error: self.to_string(),
            code,
        });
        (status, body).into_response()
    }
}

pub type Result<T> = std::result::Result<T, ServerError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_client_errors_are_400() {
        assert_eq!(
            ServerError::InvalidQuery("x".into()).classify(),
            (StatusCode::BAD_REQUEST, "INVALID_QUERY")
        );
        assert_eq!(
            ServerError::InvalidPrfKey("x".into()).classify().1,
            "INVALID_PRF_KEY"
        );
    }

    #[test]
    fn test_io_error_is_500() {
        let err: ServerError = std::io::Error::other("disk").into();
        assert_eq!(err.classify(), (StatusCode::INTERNAL_SERVER_ERROR, "IO_ERROR"));
    }

    #[tokio::test]
    async fn test_rendered_body() {
        let response = ServerError::InvalidPrfKey("15 bytes".into()).into_response();
        assert_eq!(response.status(), StatusCode::BAD_REQUEST);

        let body = axum::body::to_bytes(response.into_body(), usize::MAX)
            .await
            .unwrap();
        let json: serde_json::Value = serde_json::from_slice(&body).unwrap();
        assert_eq!(json["code"], "INVALID_PRF_KEY");
        assert_eq!(json["error"], "Invalid PRF key: 15 bytes");
    }
}
