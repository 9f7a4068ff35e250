use std::collections::HashMap;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use shared::models::{Conversation, MessageKind, SenderProfile, Timestamp, pair_key};
use sqlx::PgPool;
use tracing::instrument;
use uuid::Uuid;

use super::{
    ConversationRegistry, InsertOutcome, MessageStore, NewMessage, PageCursor, StoreError,
    StoredMessage, UserDirectory,
};

const CONVERSATION_COLUMNS: &str = r"
    SELECT c.id,
           c.is_group,
           c.name,
           c.created_at,
           c.last_activity_at,
           COALESCE(
               array_agg(p.user_id ORDER BY p.position) FILTER (WHERE p.user_id IS NOT NULL),
               '{}'
           ) AS participants
      FROM huddle.conversations c
      LEFT JOIN huddle.conversation_participants p ON p.conversation_id = c.id
";

#[derive(sqlx::FromRow)]
struct MessageRow {
    id: Uuid,
    conversation_id: Uuid,
    sender_id: Uuid,
    kind: String,
    content: String,
    created_at: DateTime<Utc>,
}

impl TryFrom<MessageRow> for StoredMessage {
    type Error = StoreError;

    fn try_from(row: MessageRow) -> Result<Self, Self::Error> {
        let kind = MessageKind::try_from(row.kind.as_str())
            .map_err(|err| StoreError::Decode(format!("message {}: {err}", row.id)))?;
        Ok(Self {
            id: row.id,
            conversation_id: row.conversation_id,
            sender_id: row.sender_id,
            kind,
            content: row.content,
            created_at: Timestamp(row.created_at),
        })
    }
}

#[derive(sqlx::FromRow)]
struct ConversationRow {
    id: Uuid,
    is_group: bool,
    name: Option<String>,
    created_at: DateTime<Utc>,
    last_activity_at: DateTime<Utc>,
    participants: Vec<Uuid>,
}

impl From<ConversationRow> for Conversation {
    fn from(row: ConversationRow) -> Self {
        Self {
            id: row.id,
            participants: row.participants,
            is_group: row.is_group,
            name: row.name,
            created_at: Timestamp(row.created_at),
            last_activity_at: Timestamp(row.last_activity_at),
        }
    }
}

/// PostgreSQL-backed store for messages, conversations and the user directory read model.
#[derive(Clone, Debug)]
pub struct PgStore {
    pool: PgPool,
}

impl PgStore {
    #[must_use]
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    async fn load_conversation(
        &self,
        conversation_id: Uuid,
    ) -> Result<Option<Conversation>, StoreError> {
        let sql = format!("{CONVERSATION_COLUMNS} WHERE c.id = $1 GROUP BY c.id");
        let row = sqlx::query_as::<_, ConversationRow>(&sql)
            .bind(conversation_id)
            .fetch_optional(&self.pool)
            .await?;
        Ok(row.map(Conversation::from))
    }

    async fn insert_participants(
        transaction: &mut sqlx::Transaction<'_, sqlx::Postgres>,
        conversation_id: Uuid,
        participants: &[Uuid],
    ) -> Result<(), StoreError> {
        for (position, user_id) in participants.iter().enumerate() {
            let position = i32::try_from(position)
                .map_err(|_| StoreError::Conflict("too many participants".into()))?;
            sqlx::query(
                "INSERT INTO huddle.conversation_participants (conversation_id, user_id, position) \
                 VALUES ($1, $2, $3)",
            )
            .bind(conversation_id)
            .bind(user_id)
            .bind(position)
            .execute(&mut **transaction)
            .await?;
        }
        Ok(())
    }
}

#[async_trait]
impl MessageStore for PgStore {
    #[instrument(name = "store.insert_message", skip(self, message), fields(message_id = %message.id), err)]
    async fn insert(&self, message: NewMessage) -> Result<InsertOutcome, StoreError> {
        let created = sqlx::query_as::<_, MessageRow>(
            r"
            INSERT INTO huddle.messages (id, conversation_id, sender_id, kind, content)
            VALUES ($1, $2, $3, $4, $5)
            ON CONFLICT (id) DO NOTHING
            RETURNING id, conversation_id, sender_id, kind, content, created_at
            ",
        )
        .bind(message.id)
        .bind(message.conversation_id)
        .bind(message.sender_id)
        .bind(message.kind.as_str())
        .bind(&message.content)
        .fetch_optional(&self.pool)
        .await?;

        if let Some(row) = created {
            return Ok(InsertOutcome::Created(row.try_into()?));
        }

        let existing = sqlx::query_as::<_, MessageRow>(
            "SELECT id, conversation_id, sender_id, kind, content, created_at \
             FROM huddle.messages WHERE id = $1",
        )
        .bind(message.id)
        .fetch_one(&self.pool)
        .await?;
        let existing = StoredMessage::try_from(existing)?;

        if existing.sender_id == message.sender_id
            && existing.conversation_id == message.conversation_id
        {
            Ok(InsertOutcome::Existing(existing))
        } else {
            Err(StoreError::Conflict(format!(
                "message id {} already used",
                message.id
            )))
        }
    }

    #[instrument(name = "store.page_desc", skip(self), err)]
    async fn page_desc(
        &self,
        conversation_id: Uuid,
        cursor: Option<PageCursor>,
        limit: u32,
    ) -> Result<Vec<StoredMessage>, StoreError> {
        let before = cursor.map(|cursor| cursor.before.0);
        let before_id = cursor.and_then(|cursor| cursor.before_id);

        let rows = sqlx::query_as::<_, MessageRow>(
            r"
            SELECT id, conversation_id, sender_id, kind, content, created_at
              FROM huddle.messages
             WHERE conversation_id = $1
               AND (
                    $2::timestamptz IS NULL
                    OR created_at < $2
                    OR ($3::uuid IS NOT NULL AND created_at = $2 AND id < $3)
               )
             ORDER BY created_at DESC, id DESC
             LIMIT $4
            ",
        )
        .bind(conversation_id)
        .bind(before)
        .bind(before_id)
        .bind(i64::from(limit))
        .fetch_all(&self.pool)
        .await?;

        rows.into_iter().map(StoredMessage::try_from).collect()
    }
}

#[async_trait]
impl ConversationRegistry for PgStore {
    async fn find(&self, conversation_id: Uuid) -> Result<Option<Conversation>, StoreError> {
        self.load_conversation(conversation_id).await
    }

    #[instrument(name = "store.find_or_create_personal", skip(self), err)]
    async fn find_or_create_personal(&self, a: Uuid, b: Uuid) -> Result<Conversation, StoreError> {
        let key = pair_key(a, b);
        let mut transaction = self.pool.begin().await?;

        let inserted: Option<Uuid> = sqlx::query_scalar(
            r"
            INSERT INTO huddle.conversations (id, is_group, pair_key)
            VALUES ($1, FALSE, $2)
            ON CONFLICT (pair_key) DO NOTHING
            RETURNING id
            ",
        )
        .bind(Uuid::new_v4())
        .bind(&key)
        .fetch_optional(&mut *transaction)
        .await?;

        let conversation_id = match inserted {
            Some(id) => {
                Self::insert_participants(&mut transaction, id, &[a, b]).await?;
                id
            }
            None => {
                sqlx::query_scalar("SELECT id FROM huddle.conversations WHERE pair_key = $1")
                    .bind(&key)
                    .fetch_one(&mut *transaction)
                    .await?
            }
        };
        transaction.commit().await?;

        self.load_conversation(conversation_id)
            .await?
            .ok_or_else(|| StoreError::Decode(format!("conversation {conversation_id} vanished")))
    }

    #[instrument(name = "store.create_group", skip(self, participants), err)]
    async fn create_group(
        &self,
        participants: Vec<Uuid>,
        name: Option<String>,
    ) -> Result<Conversation, StoreError> {
        let mut transaction = self.pool.begin().await?;
        let conversation_id: Uuid = sqlx::query_scalar(
            "INSERT INTO huddle.conversations (id, is_group, name) VALUES ($1, TRUE, $2) RETURNING id",
        )
        .bind(Uuid::new_v4())
        .bind(&name)
        .fetch_one(&mut *transaction)
        .await?;
        Self::insert_participants(&mut transaction, conversation_id, &participants).await?;
        transaction.commit().await?;

        self.load_conversation(conversation_id)
            .await?
            .ok_or_else(|| StoreError::Decode(format!("conversation {conversation_id} vanished")))
    }

    async fn list_for_user(&self, user_id: Uuid) -> Result<Vec<Conversation>, StoreError> {
        let sql = format!(
            "{CONVERSATION_COLUMNS} \
             WHERE c.id IN (SELECT conversation_id FROM huddle.conversation_participants WHERE user_id = $1) \
             GROUP BY c.id \
             ORDER BY c.last_activity_at DESC, c.id"
        );
        let rows = sqlx::query_as::<_, ConversationRow>(&sql)
            .bind(user_id)
            .fetch_all(&self.pool)
            .await?;
        Ok(rows.into_iter().map(Conversation::from).collect())
    }

    async fn touch(&self, conversation_id: Uuid, at: Timestamp) -> Result<(), StoreError> {
        sqlx::query(
            "UPDATE huddle.conversations \
             SET last_activity_at = GREATEST(last_activity_at, $2) \
             WHERE id = $1",
        )
        .bind(conversation_id)
        .bind(at.0)
        .execute(&self.pool)
        .await?;
        Ok(())
    }

    #[instrument(name = "store.reconcile_activity", skip(self), err)]
    async fn reconcile_activity(&self) -> Result<u64, StoreError> {
        let result = sqlx::query(
            r"
            UPDATE huddle.conversations c
               SET last_activity_at = latest.created_at
              FROM (
                    SELECT conversation_id, MAX(created_at) AS created_at
                      FROM huddle.messages
                     GROUP BY conversation_id
                   ) latest
             WHERE latest.conversation_id = c.id
               AND c.last_activity_at < latest.created_at
            ",
        )
        .execute(&self.pool)
        .await?;
        Ok(result.rows_affected())
    }
}

#[async_trait]
impl UserDirectory for PgStore {
    async fn profiles(&self, ids: &[Uuid]) -> Result<HashMap<Uuid, SenderProfile>, StoreError> {
        if ids.is_empty() {
            return Ok(HashMap::new());
        }

        #[derive(sqlx::FromRow)]
        struct Row {
            id: Uuid,
            display_name: String,
            avatar_url: Option<String>,
        }

        let rows = sqlx::query_as::<_, Row>(
            "SELECT id, display_name, avatar_url FROM huddle.users WHERE id = ANY($1)",
        )
        .bind(ids)
        .fetch_all(&self.pool)
        .await?;

        Ok(rows
            .into_iter()
            .map(|row| {
                (
                    row.id,
                    SenderProfile {
                        id: row.id,
                        display_name: row.display_name,
                        avatar_url: row.avatar_url,
                    },
                )
            })
            .collect())
    }
}
