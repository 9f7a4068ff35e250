use serde::{Deserialize, Serialize};
use utoipa::ToSchema;
use uuid::Uuid;

/// Display name used when the directory has no record for a sender.
pub const UNKNOWN_USER_NAME: &str = "Unknown user";

/// Public profile attached to messages, resolved from the user directory.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq, ToSchema)]
pub struct SenderProfile {
    pub id: Uuid,
    pub display_name: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub avatar_url: Option<String>,
}

impl SenderProfile {
    /// Placeholder for a sender the directory could not resolve.
    #[must_use]
    pub fn unknown(id: Uuid) -> Self {
        Self {
            id,
            display_name: UNKNOWN_USER_NAME.to_string(),
            avatar_url: None,
        }
    }
}

/// Response for `GET /api/me`.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq, ToSchema)]
pub struct MeResponse {
    pub profile: SenderProfile,
}
