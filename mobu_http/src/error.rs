//! Error types for the HTTP front end

use axum::{
    Json,
    extract::rejection::JsonRejection,
    http::StatusCode,
    response::{IntoResponse, Response},
};
use mobu_core::MonkeyError;
use serde_json::json;
use thiserror::Error;
use tracing::error;

#[derive(Error, Debug)]
pub enum ServerError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("HTTP server error: {0}")]
    HttpServer(String),
}

pub type Result<T> = std::result::Result<T, ServerError>;

/// A monkey operation failure on its way to the client as `{"error": ...}`.
#[derive(Debug)]
pub struct ApiError(pub MonkeyError);

impl From<MonkeyError> for ApiError {
    fn from(e: MonkeyError) -> Self {
        Self(e)
    }
}

/// A body that is not a valid create request is a client error like any
/// other failed validation.
impl From<JsonRejection> for ApiError {
    fn from(rejection: JsonRejection) -> Self {
        Self(MonkeyError::InvalidRequest(rejection.body_text()))
    }
}

impl ApiError {
    pub fn status(&self) -> StatusCode {
        match &self.0 {
            MonkeyError::InvalidRequest(_) | MonkeyError::UnknownBusiness(_) => {
                StatusCode::BAD_REQUEST
            }
            MonkeyError::NotFound(_) => StatusCode::NOT_FOUND,
            MonkeyError::AlreadyExists(_) | MonkeyError::AlreadyStarted(_) => StatusCode::CONFLICT,
            MonkeyError::Credential(_) | MonkeyError::Config(_) | MonkeyError::Jupyter(_) => {
                StatusCode::INTERNAL_SERVER_ERROR
            }
        }
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let status = self.status();
        if status.is_server_error() {
            error!(error = %self.0, "Request failed");
        }
        (status, Json(json!({ "error": self.0.to_string() }))).into_response()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn maps_errors_to_status_codes() {
        let cases = [
            (MonkeyError::InvalidRequest("x".into()), StatusCode::BAD_REQUEST),
            (MonkeyError::UnknownBusiness("x".into()), StatusCode::BAD_REQUEST),
            (MonkeyError::NotFound("x".into()), StatusCode::NOT_FOUND),
            (MonkeyError::AlreadyExists("x".into()), StatusCode::CONFLICT),
            (MonkeyError::Credential("x".into()), StatusCode::INTERNAL_SERVER_ERROR),
        ];
        for (error, status) in cases {
            assert_eq!(ApiError(error).status(), status);
        }
    }
}
