//! Persistence seams for the chat core.
//!
//! Each trait has a PostgreSQL implementation for deployments and an in-memory one for
//! development and tests.

use std::collections::HashMap;

use async_trait::async_trait;
use shared::models::{Conversation, MessageKind, SenderProfile, Timestamp};
use thiserror::Error;
use uuid::Uuid;

pub mod memory;
pub mod postgres;

pub use memory::MemoryStore;
pub use postgres::PgStore;

#[derive(Debug, Error)]
pub enum StoreError {
    #[error(transparent)]
    Database(#[from] sqlx::Error),
    /// A write collided with an existing record that has different content.
    #[error("conflict: {0}")]
    Conflict(String),
    #[error("corrupt row: {0}")]
    Decode(String),
    #[error("store unavailable: {0}")]
    Unavailable(String),
}

/// A message as persisted: the sender is only an id.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StoredMessage {
    pub id: Uuid,
    pub conversation_id: Uuid,
    pub sender_id: Uuid,
    pub kind: MessageKind,
    pub content: String,
    pub created_at: Timestamp,
}

impl StoredMessage {
    #[must_use]
    pub fn order_key(&self) -> (Timestamp, Uuid) {
        (self.created_at, self.id)
    }
}

/// A validated message about to be appended. The store assigns `created_at`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NewMessage {
    pub id: Uuid,
    pub conversation_id: Uuid,
    pub sender_id: Uuid,
    pub kind: MessageKind,
    pub content: String,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum InsertOutcome {
    Created(StoredMessage),
    /// Same id, sender and conversation were already stored.
    Existing(StoredMessage),
}

impl InsertOutcome {
    #[must_use]
    pub fn into_message(self) -> StoredMessage {
        match self {
            Self::Created(message) | Self::Existing(message) => message,
        }
    }
}

/// Exclusive upper bound for a history query.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PageCursor {
    pub before: Timestamp,
    /// When set, messages created exactly at `before` with a smaller id are still returned.
    pub before_id: Option<Uuid>,
}

impl PageCursor {
    #[must_use]
    pub fn admits(&self, message: &StoredMessage) -> bool {
        match self.before_id {
            Some(id) => message.order_key() < (self.before, id),
            None => message.created_at < self.before,
        }
    }
}

#[async_trait]
pub trait MessageStore: Send + Sync {
    /// Appends a message. Re-inserting a known id for the same sender and conversation returns
    /// the stored copy; any other reuse of the id is a [`StoreError::Conflict`].
    async fn insert(&self, message: NewMessage) -> Result<InsertOutcome, StoreError>;

    /// Up to `limit` messages of a conversation, newest first, bounded by `cursor`.
    async fn page_desc(
        &self,
        conversation_id: Uuid,
        cursor: Option<PageCursor>,
        limit: u32,
    ) -> Result<Vec<StoredMessage>, StoreError>;
}

#[async_trait]
pub trait ConversationRegistry: Send + Sync {
    async fn find(&self, conversation_id: Uuid) -> Result<Option<Conversation>, StoreError>;

    /// Returns the personal conversation between `a` and `b`, creating it on first use.
    async fn find_or_create_personal(&self, a: Uuid, b: Uuid) -> Result<Conversation, StoreError>;

    async fn create_group(
        &self,
        participants: Vec<Uuid>,
        name: Option<String>,
    ) -> Result<Conversation, StoreError>;

    /// Conversations `user_id` takes part in, most recently active first.
    async fn list_for_user(&self, user_id: Uuid) -> Result<Vec<Conversation>, StoreError>;

    /// Moves the last-activity marker forward to `at`. Never moves it back.
    async fn touch(&self, conversation_id: Uuid, at: Timestamp) -> Result<(), StoreError>;

    /// Repairs markers that lag behind the newest stored message. Returns how many were fixed.
    async fn reconcile_activity(&self) -> Result<u64, StoreError>;
}

#[async_trait]
pub trait UserDirectory: Send + Sync {
    /// Profiles for the ids the directory knows. Unknown ids are absent from the map.
    async fn profiles(&self, ids: &[Uuid]) -> Result<HashMap<Uuid, SenderProfile>, StoreError>;
}
