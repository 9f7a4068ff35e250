use serde::{Deserialize, Serialize};
use utoipa::ToSchema;

/// RFC 7807 problem body returned by every failing API call.
#[derive(Debug, Clone, Deserialize, Serialize, PartialEq, Eq, ToSchema)]
pub struct ProblemBody {
    #[serde(rename = "type", default)]
    pub problem_type: String,
    #[serde(default)]
    pub title: String,
    pub status: u16,
    /// Stable machine-readable code, e.g. `validation_failed`.
    pub code: String,
    pub message: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub details: Option<serde_json::Value>,
}

impl ProblemBody {
    /// Whether the failed call is worth repeating unchanged.
    #[must_use]
    pub fn is_transient(&self) -> bool {
        self.status == 429 || self.status >= 500
    }
}

impl std::fmt::Display for ProblemBody {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{} ({}): {}", self.code, self.status, self.message)
    }
}

impl std::error::Error for ProblemBody {}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_server_problem() {
        let json = r#"{
            "type": "https://huddle.chat/problems/validation_failed",
            "title": "Bad Request",
            "status": 400,
            "code": "validation_failed",
            "message": "message content must not be empty"
        }"#;
        let problem: ProblemBody = serde_json::from_str(json).unwrap();
        assert_eq!(problem.code, "validation_failed");
        assert!(!problem.is_transient());
        assert_eq!(
            problem.to_string(),
            "validation_failed (400): message content must not be empty"
        );
    }

    #[test]
    fn server_and_throttle_statuses_are_transient() {
        let mut problem = ProblemBody {
            problem_type: String::new(),
            title: String::new(),
            status: 503,
            code: "store_unavailable".into(),
            message: "try later".into(),
            details: None,
        };
        assert!(problem.is_transient());
        problem.status = 429;
        assert!(problem.is_transient());
        problem.status = 404;
        assert!(!problem.is_transient());
    }
}
