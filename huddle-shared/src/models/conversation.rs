use serde::{Deserialize, Serialize};
use utoipa::ToSchema;
use uuid::Uuid;

use super::Timestamp;

/// A chat between two people or a named group.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq, ToSchema)]
pub struct Conversation {
    pub id: Uuid,
    /// Participants in join order. Immutable once created.
    pub participants: Vec<Uuid>,
    pub is_group: bool,
    /// Display name, only set for groups.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,
    pub created_at: Timestamp,
    /// Time of the latest message, used to sort conversation lists.
    pub last_activity_at: Timestamp,
}

impl Conversation {
    #[must_use]
    pub fn has_participant(&self, user_id: Uuid) -> bool {
        self.participants.contains(&user_id)
    }

    /// The other member of a personal conversation.
    #[must_use]
    pub fn peer_of(&self, user_id: Uuid) -> Option<Uuid> {
        if self.is_group {
            return None;
        }
        self.participants.iter().copied().find(|id| *id != user_id)
    }
}

/// Canonical key for the personal conversation between two users, independent of argument order.
#[must_use]
pub fn pair_key(a: Uuid, b: Uuid) -> String {
    let (low, high) = if a <= b { (a, b) } else { (b, a) };
    format!("{low}:{high}")
}

/// Body of `POST /api/conversations`.
///
/// Without `is_group` the caller plus exactly one other participant open (or reuse) their
/// personal conversation.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq, ToSchema)]
pub struct CreateConversationRequest {
    /// Other participants. The caller is always added.
    pub participant_ids: Vec<Uuid>,
    #[serde(default)]
    pub is_group: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,
}

impl CreateConversationRequest {
    #[must_use]
    pub fn personal(peer: Uuid) -> Self {
        Self {
            participant_ids: vec![peer],
            is_group: false,
            name: None,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq, ToSchema)]
pub struct ConversationResponse {
    pub conversation: Conversation,
}

/// Conversations for the caller, most recently active first.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq, ToSchema)]
pub struct ConversationListResponse {
    pub conversations: Vec<Conversation>,
}
