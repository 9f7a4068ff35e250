use std::{
    collections::HashMap,
    sync::atomic::{AtomicBool, Ordering},
};

use async_trait::async_trait;
use chrono::{Duration, Utc};
use shared::models::{Conversation, SenderProfile, Timestamp, pair_key};
use tokio::sync::RwLock;
use uuid::Uuid;

use super::{
    ConversationRegistry, InsertOutcome, MessageStore, NewMessage, PageCursor, StoreError,
    StoredMessage, UserDirectory,
};

#[derive(Default)]
struct MemoryInner {
    conversations: HashMap<Uuid, Conversation>,
    personal: HashMap<String, Uuid>,
    /// Per conversation, ascending by `(created_at, id)`.
    messages: HashMap<Uuid, Vec<StoredMessage>>,
    message_index: HashMap<Uuid, Uuid>,
    users: HashMap<Uuid, SenderProfile>,
}

/// Process-local store backing all three persistence traits.
#[derive(Default)]
pub struct MemoryStore {
    inner: RwLock<MemoryInner>,
    fail_message_writes: AtomicBool,
    fail_activity_writes: AtomicBool,
}

impl std::fmt::Debug for MemoryStore {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("MemoryStore").finish_non_exhaustive()
    }
}

impl MemoryStore {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    pub async fn upsert_user(&self, profile: SenderProfile) {
        self.inner.write().await.users.insert(profile.id, profile);
    }

    /// Makes message inserts fail, simulating an unreachable database.
    pub fn fail_message_writes(&self, fail: bool) {
        self.fail_message_writes.store(fail, Ordering::SeqCst);
    }

    /// Makes last-activity updates fail.
    pub fn fail_activity_writes(&self, fail: bool) {
        self.fail_activity_writes.store(fail, Ordering::SeqCst);
    }

    /// Rewinds a conversation's activity marker, standing in for a lost best-effort update.
    pub async fn set_last_activity(&self, conversation_id: Uuid, at: Timestamp) {
        if let Some(conversation) = self
            .inner
            .write()
            .await
            .conversations
            .get_mut(&conversation_id)
        {
            conversation.last_activity_at = at;
        }
    }

    fn new_conversation(participants: Vec<Uuid>, is_group: bool, name: Option<String>) -> Conversation {
        let now = Timestamp::now();
        Conversation {
            id: Uuid::new_v4(),
            participants,
            is_group,
            name,
            created_at: now,
            last_activity_at: now,
        }
    }
}

#[async_trait]
impl MessageStore for MemoryStore {
    async fn insert(&self, message: NewMessage) -> Result<InsertOutcome, StoreError> {
        if self.fail_message_writes.load(Ordering::SeqCst) {
            return Err(StoreError::Unavailable("message log is not accepting writes".into()));
        }

        let mut inner = self.inner.write().await;

        if let Some(existing_conversation) = inner.message_index.get(&message.id).copied() {
            let existing = inner
                .messages
                .get(&existing_conversation)
                .and_then(|log| log.iter().find(|stored| stored.id == message.id))
                .cloned()
                .ok_or_else(|| StoreError::Decode(format!("dangling message {}", message.id)))?;
            if existing.sender_id == message.sender_id
                && existing.conversation_id == message.conversation_id
            {
                return Ok(InsertOutcome::Existing(existing));
            }
            return Err(StoreError::Conflict(format!(
                "message id {} already used",
                message.id
            )));
        }

        let log = inner.messages.entry(message.conversation_id).or_default();
        let mut created_at = Utc::now();
        if let Some(last) = log.last() {
            if created_at <= last.created_at.0 {
                created_at = last.created_at.0 + Duration::microseconds(1);
            }
        }

        let stored = StoredMessage {
            id: message.id,
            conversation_id: message.conversation_id,
            sender_id: message.sender_id,
            kind: message.kind,
            content: message.content,
            created_at: Timestamp(created_at),
        };
        log.push(stored.clone());
        inner
            .message_index
            .insert(stored.id, stored.conversation_id);
        Ok(InsertOutcome::Created(stored))
    }

    async fn page_desc(
        &self,
        conversation_id: Uuid,
        cursor: Option<PageCursor>,
        limit: u32,
    ) -> Result<Vec<StoredMessage>, StoreError> {
        let inner = self.inner.read().await;
        let Some(log) = inner.messages.get(&conversation_id) else {
            return Ok(Vec::new());
        };

        Ok(log
            .iter()
            .rev()
            .filter(|message| cursor.is_none_or(|cursor| cursor.admits(message)))
            .take(limit as usize)
            .cloned()
            .collect())
    }
}

#[async_trait]
impl ConversationRegistry for MemoryStore {
    async fn find(&self, conversation_id: Uuid) -> Result<Option<Conversation>, StoreError> {
        Ok(self
            .inner
            .read()
            .await
            .conversations
            .get(&conversation_id)
            .cloned())
    }

    async fn find_or_create_personal(&self, a: Uuid, b: Uuid) -> Result<Conversation, StoreError> {
        let key = pair_key(a, b);
        let mut inner = self.inner.write().await;

        if let Some(existing) = inner
            .personal
            .get(&key)
            .and_then(|id| inner.conversations.get(id))
        {
            return Ok(existing.clone());
        }

        let conversation = Self::new_conversation(vec![a, b], false, None);
        inner.personal.insert(key, conversation.id);
        inner
            .conversations
            .insert(conversation.id, conversation.clone());
        Ok(conversation)
    }

    async fn create_group(
        &self,
        participants: Vec<Uuid>,
        name: Option<String>,
    ) -> Result<Conversation, StoreError> {
        let conversation = Self::new_conversation(participants, true, name);
        self.inner
            .write()
            .await
            .conversations
            .insert(conversation.id, conversation.clone());
        Ok(conversation)
    }

    async fn list_for_user(&self, user_id: Uuid) -> Result<Vec<Conversation>, StoreError> {
        let inner = self.inner.read().await;
        let mut conversations: Vec<Conversation> = inner
            .conversations
            .values()
            .filter(|conversation| conversation.has_participant(user_id))
            .cloned()
            .collect();
        conversations.sort_by(|a, b| {
            b.last_activity_at
                .cmp(&a.last_activity_at)
                .then_with(|| a.id.cmp(&b.id))
        });
        Ok(conversations)
    }

    async fn touch(&self, conversation_id: Uuid, at: Timestamp) -> Result<(), StoreError> {
        if self.fail_activity_writes.load(Ordering::SeqCst) {
            return Err(StoreError::Unavailable("activity marker is read-only".into()));
        }
        if let Some(conversation) = self
            .inner
            .write()
            .await
            .conversations
            .get_mut(&conversation_id)
        {
            conversation.last_activity_at = conversation.last_activity_at.max(at);
        }
        Ok(())
    }

    async fn reconcile_activity(&self) -> Result<u64, StoreError> {
        let mut guard = self.inner.write().await;
        let inner = &mut *guard;
        let mut repaired = 0;
        for (conversation_id, log) in &inner.messages {
            let Some(latest) = log.last().map(|message| message.created_at) else {
                continue;
            };
            if let Some(conversation) = inner.conversations.get_mut(conversation_id) {
                if conversation.last_activity_at < latest {
                    conversation.last_activity_at = latest;
                    repaired += 1;
                }
            }
        }
        Ok(repaired)
    }
}

#[async_trait]
impl UserDirectory for MemoryStore {
    async fn profiles(&self, ids: &[Uuid]) -> Result<HashMap<Uuid, SenderProfile>, StoreError> {
        let inner = self.inner.read().await;
        Ok(ids
            .iter()
            .filter_map(|id| inner.users.get(id).map(|profile| (*id, profile.clone())))
            .collect())
    }
}
