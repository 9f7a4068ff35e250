use std::sync::Arc;

use shared::config::server::{ChatConfig, Config};
use sqlx::PgPool;

use crate::{
    services::{ConversationService, FanoutHub, MessageService, PaginationService, SharedHub},
    store::{ConversationRegistry, MemoryStore, MessageStore, PgStore, UserDirectory},
};

/// Handles shared by every route. Collaborators are passed in explicitly.
#[derive(Clone)]
pub struct AppState {
    pub(crate) pool: Option<PgPool>,
    pub(crate) messages: Arc<dyn MessageStore>,
    pub(crate) conversations: Arc<dyn ConversationRegistry>,
    pub(crate) directory: Arc<dyn UserDirectory>,
    pub(crate) hub: SharedHub,
    pub(crate) chat: ChatConfig,
    pub(crate) heartbeat_seconds: u64,
}

impl std::fmt::Debug for AppState {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("AppState")
            .field("database", &self.pool.is_some())
            .field("chat", &self.chat)
            .finish_non_exhaustive()
    }
}

impl AppState {
    pub fn new(
        pool: Option<PgPool>,
        messages: Arc<dyn MessageStore>,
        conversations: Arc<dyn ConversationRegistry>,
        directory: Arc<dyn UserDirectory>,
        config: &Config,
    ) -> Self {
        Self {
            pool,
            messages,
            conversations,
            directory,
            hub: Arc::new(FanoutHub::new(config.realtime.channel_capacity)),
            chat: config.chat.clone(),
            heartbeat_seconds: config.realtime.heartbeat_seconds,
        }
    }

    pub fn with_postgres(pool: PgPool, config: &Config) -> Self {
        let store = Arc::new(PgStore::new(pool.clone()));
        Self::new(Some(pool), store.clone(), store.clone(), store, config)
    }

    pub fn in_memory(store: Arc<MemoryStore>, config: &Config) -> Self {
        Self::new(None, store.clone(), store.clone(), store, config)
    }

    /// Realtime fan-out shared by the stream handlers and the send path.
    pub fn hub(&self) -> &SharedHub {
        &self.hub
    }

    pub fn pagination(&self) -> PaginationService {
        PaginationService::new(
            self.messages.clone(),
            self.conversations.clone(),
            self.directory.clone(),
            &self.chat,
        )
    }

    pub fn message_service(&self) -> MessageService {
        MessageService::new(
            self.messages.clone(),
            self.conversations.clone(),
            self.directory.clone(),
            self.hub.clone(),
            &self.chat,
        )
    }

    pub fn conversation_service(&self) -> ConversationService {
        ConversationService::new(self.conversations.clone())
    }
}
