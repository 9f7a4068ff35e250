use std::{fmt, sync::Arc};

use shared::{
    config::server::ChatConfig,
    models::{HistoryQuery, MessageView},
};
use tracing::instrument;
use uuid::Uuid;

use super::{
    error::{ChatServiceError, ChatServiceResult},
    profiles::{resolve_senders, to_view},
};
use crate::store::{ConversationRegistry, MessageStore, PageCursor, UserDirectory};

/// Serves conversation history one page at a time, oldest-first within each page.
#[derive(Clone)]
pub struct PaginationService {
    messages: Arc<dyn MessageStore>,
    conversations: Arc<dyn ConversationRegistry>,
    directory: Arc<dyn UserDirectory>,
    default_limit: u32,
    max_limit: u32,
}

impl fmt::Debug for PaginationService {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("PaginationService")
            .field("default_limit", &self.default_limit)
            .field("max_limit", &self.max_limit)
            .finish_non_exhaustive()
    }
}

impl PaginationService {
    pub fn new(
        messages: Arc<dyn MessageStore>,
        conversations: Arc<dyn ConversationRegistry>,
        directory: Arc<dyn UserDirectory>,
        chat: &ChatConfig,
    ) -> Self {
        Self {
            messages,
            conversations,
            directory,
            default_limit: chat.default_page_size,
            max_limit: chat.max_page_size,
        }
    }

    /// Resolves the effective page size. Zero is rejected; anything above the cap is clamped.
    fn effective_limit(&self, requested: Option<u32>) -> ChatServiceResult<u32> {
        match requested {
            None => Ok(self.default_limit.min(self.max_limit)),
            Some(0) => Err(ChatServiceError::Validation(
                "limit must be at least 1".into(),
            )),
            Some(limit) => Ok(limit.min(self.max_limit)),
        }
    }

    /// Returns up to `limit` messages older than the cursor, in ascending order.
    ///
    /// A page shorter than the effective limit means there is no older history.
    ///
    /// # Errors
    /// [`ChatServiceError::Validation`] for a zero limit or a `before_id` without `before`,
    /// [`ChatServiceError::NotFound`] for an unknown conversation, and
    /// [`ChatServiceError::Store`] when the store cannot be read.
    #[instrument(name = "chat.fetch_page", skip(self), err)]
    pub async fn fetch_page(
        &self,
        conversation_id: Uuid,
        query: HistoryQuery,
    ) -> ChatServiceResult<Vec<MessageView>> {
        let limit = self.effective_limit(query.limit)?;
        let cursor = match (query.before, query.before_id) {
            (Some(before), before_id) => Some(PageCursor { before, before_id }),
            (None, Some(_)) => {
                return Err(ChatServiceError::Validation(
                    "before_id requires before".into(),
                ));
            }
            (None, None) => None,
        };

        if self.conversations.find(conversation_id).await?.is_none() {
            return Err(ChatServiceError::NotFound(format!(
                "conversation {conversation_id}"
            )));
        }

        let mut page = self
            .messages
            .page_desc(conversation_id, cursor, limit)
            .await?;
        page.reverse();

        let profiles = resolve_senders(self.directory.as_ref(), &page).await;
        metrics::counter!("huddle_history_pages_total").increment(1);

        Ok(page
            .into_iter()
            .map(|message| to_view(message, &profiles))
            .collect())
    }
}
