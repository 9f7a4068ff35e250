use serde::{Deserialize, Serialize};
use utoipa::ToSchema;
use uuid::Uuid;

use super::message::MessageView;

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq, ToSchema)]
pub struct ConnectionReadyEvent {
    /// Handle used to join and leave conversation groups for this stream.
    pub connection_id: Uuid,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq, ToSchema)]
pub struct MessageNewEvent {
    pub message: MessageView,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq, ToSchema)]
pub struct StreamErrorEvent {
    pub code: String,
    pub message: String,
}

/// Events written to a realtime connection.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq, ToSchema)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum ChatStreamEvent {
    #[serde(rename = "connection.ready")]
    ConnectionReady { payload: ConnectionReadyEvent },
    #[serde(rename = "message.new")]
    MessageNew { payload: MessageNewEvent },
    #[serde(rename = "error")]
    Error { payload: StreamErrorEvent },
}

impl ChatStreamEvent {
    #[must_use]
    pub fn message_new(message: MessageView) -> Self {
        Self::MessageNew {
            payload: MessageNewEvent { message },
        }
    }

    /// SSE `event:` field for this variant; matches the serialized `type` tag.
    #[must_use]
    pub const fn event_name(&self) -> &'static str {
        match self {
            Self::ConnectionReady { .. } => "connection.ready",
            Self::MessageNew { .. } => "message.new",
            Self::Error { .. } => "error",
        }
    }

    /// Conversation the event belongs to, if any.
    #[must_use]
    pub fn conversation_id(&self) -> Option<Uuid> {
        match self {
            Self::MessageNew { payload } => Some(payload.message.conversation_id),
            _ => None,
        }
    }
}

/// Acknowledgement for joining or leaving a conversation group.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq, ToSchema)]
pub struct MembershipResponse {
    pub connection_id: Uuid,
    pub conversation_id: Uuid,
    /// Whether the connection is a member after the call.
    pub joined: bool,
    /// False when the call was a no-op (already joined, or not joined on leave).
    pub changed: bool,
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::{MessageKind, SenderProfile, Timestamp};

    #[test]
    fn event_name_matches_type_tag() {
        let events = [
            ChatStreamEvent::ConnectionReady {
                payload: ConnectionReadyEvent {
                    connection_id: Uuid::new_v4(),
                },
            },
            ChatStreamEvent::message_new(MessageView {
                id: Uuid::new_v4(),
                conversation_id: Uuid::new_v4(),
                sender: SenderProfile::unknown(Uuid::new_v4()),
                kind: MessageKind::Text,
                content: "hello".into(),
                created_at: Timestamp::now(),
            }),
            ChatStreamEvent::Error {
                payload: StreamErrorEvent {
                    code: "lagged".into(),
                    message: "events dropped".into(),
                },
            },
        ];

        for event in events {
            let value = serde_json::to_value(&event).unwrap();
            assert_eq!(value["type"], event.event_name());
        }
    }

    #[test]
    fn only_message_events_carry_a_conversation() {
        let ready = ChatStreamEvent::ConnectionReady {
            payload: ConnectionReadyEvent {
                connection_id: Uuid::nil(),
            },
        };
        assert_eq!(ready.conversation_id(), None);
    }
}
