//! The send path: validate, persist, bump activity, resolve the sender, publish.

use std::{fmt, sync::Arc};

use shared::{
    config::server::ChatConfig,
    models::{ChatStreamEvent, MessageView, SendMessageRequest, SenderProfile, validate_content},
};
use tracing::{info, instrument, warn};
use uuid::Uuid;

use super::{
    error::{ChatServiceError, ChatServiceResult},
    fanout_hub::SharedHub,
    profiles::resolve_one,
};
use crate::store::{
    ConversationRegistry, InsertOutcome, MessageStore, NewMessage, StoreError, StoredMessage,
    UserDirectory,
};

#[derive(Clone)]
pub struct MessageService {
    messages: Arc<dyn MessageStore>,
    conversations: Arc<dyn ConversationRegistry>,
    directory: Arc<dyn UserDirectory>,
    hub: SharedHub,
    max_text_length: usize,
}

impl fmt::Debug for MessageService {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("MessageService")
            .field("max_text_length", &self.max_text_length)
            .finish_non_exhaustive()
    }
}

impl MessageService {
    pub fn new(
        messages: Arc<dyn MessageStore>,
        conversations: Arc<dyn ConversationRegistry>,
        directory: Arc<dyn UserDirectory>,
        hub: SharedHub,
        chat: &ChatConfig,
    ) -> Self {
        Self {
            messages,
            conversations,
            directory,
            hub,
            max_text_length: chat.max_text_length,
        }
    }

    /// Persists a message and publishes it to everyone joined to the conversation.
    ///
    /// Publishing happens only after the store accepted the write. A failed last-activity
    /// update is logged and otherwise ignored. Resending a known `message_id` returns the stored
    /// copy without publishing again.
    ///
    /// # Errors
    /// [`ChatServiceError::Validation`] for rejected content or a reused id,
    /// [`ChatServiceError::NotFound`] for an unknown conversation, and
    /// [`ChatServiceError::SendFailed`] when the message could not be persisted.
    #[instrument(name = "chat.send", skip(self, request), fields(kind = request.kind.as_str()), err)]
    pub async fn send(
        &self,
        conversation_id: Uuid,
        sender_id: Uuid,
        request: SendMessageRequest,
    ) -> ChatServiceResult<MessageView> {
        validate_content(request.kind, &request.content, self.max_text_length)?;

        if self.conversations.find(conversation_id).await?.is_none() {
            return Err(ChatServiceError::NotFound(format!(
                "conversation {conversation_id}"
            )));
        }

        let content = if request.kind.is_media() {
            request.content.trim().to_string()
        } else {
            request.content
        };
        let draft = NewMessage {
            id: request.message_id.unwrap_or_else(Uuid::new_v4),
            conversation_id,
            sender_id,
            kind: request.kind,
            content,
        };

        let stored = match self.messages.insert(draft).await {
            Ok(InsertOutcome::Created(stored)) => stored,
            Ok(InsertOutcome::Existing(stored)) => {
                info!(message_id = %stored.id, "duplicate send; returning stored message");
                let sender = resolve_one(self.directory.as_ref(), sender_id).await;
                return Ok(view(stored, sender));
            }
            Err(StoreError::Conflict(message)) => {
                return Err(ChatServiceError::Validation(message));
            }
            Err(err) => {
                metrics::counter!("huddle_send_failures_total").increment(1);
                return Err(ChatServiceError::SendFailed(err.to_string()));
            }
        };

        if let Err(err) = self
            .conversations
            .touch(conversation_id, stored.created_at)
            .await
        {
            warn!(error = %err, %conversation_id, "failed to bump last activity");
        }

        let sender = resolve_one(self.directory.as_ref(), sender_id).await;
        let message = view(stored, sender);

        let report = self
            .hub
            .publish(conversation_id, &ChatStreamEvent::message_new(message.clone()))
            .await;
        metrics::counter!("huddle_messages_sent_total").increment(1);
        info!(
            message_id = %message.id,
            delivered = report.delivered,
            dropped = report.dropped,
            "message sent"
        );

        Ok(message)
    }
}

fn view(stored: StoredMessage, sender: SenderProfile) -> MessageView {
    MessageView {
        id: stored.id,
        conversation_id: stored.conversation_id,
        sender,
        kind: stored.kind,
        content: stored.content,
        created_at: stored.created_at,
    }
}
