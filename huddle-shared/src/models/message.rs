use serde::{Deserialize, Serialize};
use thiserror::Error;
use utoipa::{IntoParams, ToSchema};
use uuid::Uuid;

use super::{Timestamp, user::SenderProfile};

/// Default number of messages returned by a history page.
pub const DEFAULT_PAGE_SIZE: u32 = 30;

/// Default cap for text payloads, in characters.
pub const DEFAULT_MAX_TEXT_LENGTH: usize = 4000;

/// Payload kind carried by a chat message.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash, ToSchema)]
#[serde(rename_all = "snake_case")]
pub enum MessageKind {
    Text,
    Image,
    Video,
    /// Call lifecycle marker such as "started" or "ended".
    Call,
}

impl MessageKind {
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Text => "text",
            Self::Image => "image",
            Self::Video => "video",
            Self::Call => "call",
        }
    }

    /// Media kinds carry an uploaded URL instead of text.
    #[must_use]
    pub const fn is_media(self) -> bool {
        matches!(self, Self::Image | Self::Video)
    }
}

impl TryFrom<&str> for MessageKind {
    type Error = &'static str;

    fn try_from(value: &str) -> Result<Self, Self::Error> {
        match value {
            "text" => Ok(Self::Text),
            "image" => Ok(Self::Image),
            "video" => Ok(Self::Video),
            "call" => Ok(Self::Call),
            _ => Err("invalid message kind"),
        }
    }
}

/// Reasons a message payload is rejected before it is stored.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ContentError {
    #[error("message content must not be empty")]
    Empty,
    #[error("message content exceeds {max} characters")]
    TooLong { max: usize },
    #[error("media content must be an absolute http(s) URL: {0}")]
    InvalidUrl(String),
}

/// Checks a payload against its kind.
///
/// Text and call markers must be non-blank and at most `max_text_length` characters. Image and
/// video payloads must be absolute `http`/`https` URLs.
///
/// # Errors
/// Returns the first [`ContentError`] that applies.
pub fn validate_content(
    kind: MessageKind,
    content: &str,
    max_text_length: usize,
) -> Result<(), ContentError> {
    let trimmed = content.trim();
    if trimmed.is_empty() {
        return Err(ContentError::Empty);
    }

    if kind.is_media() {
        let parsed =
            url::Url::parse(trimmed).map_err(|err| ContentError::InvalidUrl(err.to_string()))?;
        if !matches!(parsed.scheme(), "http" | "https") {
            return Err(ContentError::InvalidUrl(format!(
                "unsupported scheme `{}`",
                parsed.scheme()
            )));
        }
        return Ok(());
    }

    if content.chars().count() > max_text_length {
        return Err(ContentError::TooLong {
            max: max_text_length,
        });
    }

    Ok(())
}

/// A persisted message with its sender resolved through the user directory.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq, ToSchema)]
pub struct MessageView {
    pub id: Uuid,
    pub conversation_id: Uuid,
    pub sender: SenderProfile,
    pub kind: MessageKind,
    pub content: String,
    pub created_at: Timestamp,
}

impl MessageView {
    /// Position in the conversation's total order.
    #[must_use]
    pub fn order_key(&self) -> (Timestamp, Uuid) {
        (self.created_at, self.id)
    }
}

/// Query string accepted by the history endpoint.
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq, Eq, ToSchema, IntoParams)]
#[into_params(parameter_in = Query)]
pub struct HistoryQuery {
    /// Maximum number of messages to return. Defaults to 30.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub limit: Option<u32>,
    /// Exclusive upper bound: creation time of the oldest message already held.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub before: Option<Timestamp>,
    /// Id of that oldest message; breaks ties between messages sharing `before`.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub before_id: Option<Uuid>,
}

impl HistoryQuery {
    #[must_use]
    pub fn latest(limit: u32) -> Self {
        Self {
            limit: Some(limit),
            ..Self::default()
        }
    }

    /// Query for the page strictly older than `oldest`.
    #[must_use]
    pub fn older_than(oldest: &MessageView, limit: u32) -> Self {
        Self {
            limit: Some(limit),
            before: Some(oldest.created_at),
            before_id: Some(oldest.id),
        }
    }
}

/// One page of history, oldest first.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq, ToSchema)]
pub struct HistoryResponse {
    pub messages: Vec<MessageView>,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq, ToSchema)]
pub struct SendMessageRequest {
    pub kind: MessageKind,
    pub content: String,
    /// Client-proposed id. Resending the same id returns the stored message.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub message_id: Option<Uuid>,
}

impl SendMessageRequest {
    #[must_use]
    pub fn text(content: impl Into<String>) -> Self {
        Self {
            kind: MessageKind::Text,
            content: content.into(),
            message_id: None,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq, ToSchema)]
pub struct SendMessageResponse {
    pub message: MessageView,
}
