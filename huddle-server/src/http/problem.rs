use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
};
use http::header::{CACHE_CONTROL, CONTENT_TYPE, HeaderValue};
use serde_json::Value;
use shared::models::ProblemBody;

const PROBLEM_TYPE_BASE: &str = "https://huddle.chat/problems/";

/// A failed call rendered as `application/problem+json`. Clients decode the same [`ProblemBody`].
#[derive(Debug)]
pub struct Problem(pub ProblemBody);

impl Problem {
    pub fn new(status: StatusCode, code: &str, message: impl Into<String>) -> Self {
        Self(ProblemBody {
            problem_type: format!("{PROBLEM_TYPE_BASE}{code}"),
            title: status.canonical_reason().unwrap_or("Error").to_string(),
            status: status.as_u16(),
            code: code.to_string(),
            message: message.into(),
            details: None,
        })
    }

    pub fn with_details(mut self, details: Option<Value>) -> Self {
        self.0.details = details;
        self
    }
}

impl IntoResponse for Problem {
    fn into_response(self) -> Response {
        let status =
            StatusCode::from_u16(self.0.status).unwrap_or(StatusCode::INTERNAL_SERVER_ERROR);
        let mut response = (status, axum::Json(self.0)).into_response();
        let headers = response.headers_mut();
        headers.insert(
            CONTENT_TYPE,
            HeaderValue::from_static("application/problem+json"),
        );
        // Failures must never be replayed from an intermediary cache.
        headers.insert(CACHE_CONTROL, HeaderValue::from_static("no-store"));
        response
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use shared::client::FetchError;

    #[test]
    fn title_and_type_follow_status_and_code() {
        let Problem(body) = Problem::new(StatusCode::SERVICE_UNAVAILABLE, "send_failed", "down");
        assert_eq!(body.title, "Service Unavailable");
        assert_eq!(body.problem_type, "https://huddle.chat/problems/send_failed");
        assert_eq!(body.status, 503);
        assert!(FetchError::from(body).is_transient());
    }

    #[test]
    fn response_is_problem_json_and_uncached() {
        let response =
            Problem::new(StatusCode::BAD_REQUEST, "validation_failed", "no").into_response();
        assert_eq!(response.status(), StatusCode::BAD_REQUEST);
        assert_eq!(
            response.headers().get(CONTENT_TYPE).unwrap(),
            "application/problem+json"
        );
        assert_eq!(response.headers().get(CACHE_CONTROL).unwrap(), "no-store");
    }
}
