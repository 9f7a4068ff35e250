use axum::{http::StatusCode, response::IntoResponse};
use thiserror::Error;

use super::problem::Problem;
use crate::services::{ChatServiceError, HubError};

pub type AppResult<T> = Result<T, ApiError>;

#[derive(Debug, Error)]
#[error("{code}: {message}")]
pub struct ApiError {
    status: StatusCode,
    code: &'static str,
    message: String,
    details: Option<serde_json::Value>,
}

impl ApiError {
    pub fn new(status: StatusCode, code: &'static str, message: impl Into<String>) -> Self {
        Self {
            status,
            code,
            message: message.into(),
            details: None,
        }
    }

    pub fn bad_request(message: impl Into<String>) -> Self {
        Self::new(StatusCode::BAD_REQUEST, "validation_failed", message)
    }

    pub fn unauthorized(message: impl Into<String>) -> Self {
        Self::new(StatusCode::UNAUTHORIZED, "unauthenticated", message)
    }

    pub fn forbidden(message: impl Into<String>) -> Self {
        Self::new(StatusCode::FORBIDDEN, "forbidden", message)
    }

    pub fn not_found(message: impl Into<String>) -> Self {
        Self::new(StatusCode::NOT_FOUND, "not_found", message)
    }

    pub fn service_unavailable(code: &'static str, message: impl Into<String>) -> Self {
        Self::new(StatusCode::SERVICE_UNAVAILABLE, code, message)
    }

    pub fn with_details(mut self, details: serde_json::Value) -> Self {
        self.details = Some(details);
        self
    }

    pub fn status(&self) -> StatusCode {
        self.status
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> axum::response::Response {
        Problem::new(self.status, self.code, self.message)
            .with_details(self.details)
            .into_response()
    }
}

impl From<ChatServiceError> for ApiError {
    fn from(err: ChatServiceError) -> Self {
        match err {
            ChatServiceError::Validation(message) => Self::bad_request(message),
            ChatServiceError::NotFound(message) => Self::not_found(message),
            ChatServiceError::Forbidden(message) => Self::forbidden(message),
            ChatServiceError::SendFailed(message) => {
                Self::service_unavailable("send_failed", message)
            }
            ChatServiceError::Store(store_err) => {
                tracing::error!(error = %store_err, "store request failed");
                Self::service_unavailable("store_unavailable", "message store is unavailable")
            }
        }
    }
}

impl From<HubError> for ApiError {
    fn from(err: HubError) -> Self {
        match err {
            HubError::UnknownConnection(id) => Self::not_found(err.to_string())
                .with_details(serde_json::json!({ "connection_id": id })),
        }
    }
}
