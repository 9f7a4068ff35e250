use std::{collections::HashSet, fmt, sync::Arc};

use shared::models::{Conversation, CreateConversationRequest};
use tracing::instrument;
use uuid::Uuid;

use super::error::{ChatServiceError, ChatServiceResult};
use crate::store::ConversationRegistry;

/// Opening, listing and reading conversations on behalf of a caller.
#[derive(Clone)]
pub struct ConversationService {
    registry: Arc<dyn ConversationRegistry>,
}

impl fmt::Debug for ConversationService {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ConversationService").finish_non_exhaustive()
    }
}

impl ConversationService {
    pub fn new(registry: Arc<dyn ConversationRegistry>) -> Self {
        Self { registry }
    }

    /// Opens a conversation. A personal conversation with the same peer is reused.
    ///
    /// # Errors
    /// [`ChatServiceError::Validation`] when the participant list does not describe a valid
    /// personal or group conversation.
    #[instrument(name = "chat.open_conversation", skip(self, request), err)]
    pub async fn open(
        &self,
        caller: Uuid,
        request: CreateConversationRequest,
    ) -> ChatServiceResult<Conversation> {
        let mut seen = HashSet::from([caller]);
        let others: Vec<Uuid> = request
            .participant_ids
            .into_iter()
            .filter(|id| seen.insert(*id))
            .collect();

        if request.is_group {
            if others.is_empty() {
                return Err(ChatServiceError::Validation(
                    "a group needs at least one other participant".into(),
                ));
            }
            let name = request
                .name
                .map(|name| name.trim().to_string())
                .filter(|name| !name.is_empty());
            let mut participants = Vec::with_capacity(others.len() + 1);
            participants.push(caller);
            participants.extend(others);
            return Ok(self.registry.create_group(participants, name).await?);
        }

        if request.name.is_some() {
            return Err(ChatServiceError::Validation(
                "personal conversations cannot be named".into(),
            ));
        }
        match others.as_slice() {
            [peer] => Ok(self.registry.find_or_create_personal(caller, *peer).await?),
            _ => Err(ChatServiceError::Validation(
                "a personal conversation needs exactly one other participant".into(),
            )),
        }
    }

    /// # Errors
    /// [`ChatServiceError::NotFound`] for an unknown id, [`ChatServiceError::Forbidden`] when the
    /// caller is not a participant.
    pub async fn get(&self, caller: Uuid, conversation_id: Uuid) -> ChatServiceResult<Conversation> {
        let conversation = self
            .registry
            .find(conversation_id)
            .await?
            .ok_or_else(|| ChatServiceError::NotFound(format!("conversation {conversation_id}")))?;
        if !conversation.has_participant(caller) {
            return Err(ChatServiceError::Forbidden(
                "not a participant of this conversation".into(),
            ));
        }
        Ok(conversation)
    }

    /// Conversations of the caller, most recently active first.
    pub async fn list(&self, caller: Uuid) -> ChatServiceResult<Vec<Conversation>> {
        Ok(self.registry.list_for_user(caller).await?)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::store::MemoryStore;
    use shared::models::Timestamp;

    fn service() -> (Arc<MemoryStore>, ConversationService) {
        let store = Arc::new(MemoryStore::new());
        (store.clone(), ConversationService::new(store))
    }

    #[tokio::test]
    async fn personal_open_is_idempotent_from_either_side() {
        let (_, service) = service();
        let alice = Uuid::new_v4();
        let bob = Uuid::new_v4();

        let first = service
            .open(alice, CreateConversationRequest::personal(bob))
            .await
            .unwrap();
        let again = service
            .open(alice, CreateConversationRequest::personal(bob))
            .await
            .unwrap();
        let reverse = service
            .open(bob, CreateConversationRequest::personal(alice))
            .await
            .unwrap();

        assert_eq!(first.id, again.id);
        assert_eq!(first.id, reverse.id);
        assert!(!first.is_group);
        assert_eq!(first.peer_of(alice), Some(bob));
    }

    #[tokio::test]
    async fn personal_open_rejects_self_and_crowds() {
        let (_, service) = service();
        let alice = Uuid::new_v4();

        let with_self = service
            .open(alice, CreateConversationRequest::personal(alice))
            .await;
        assert!(matches!(with_self, Err(ChatServiceError::Validation(_))));

        let crowd = CreateConversationRequest {
            participant_ids: vec![Uuid::new_v4(), Uuid::new_v4()],
            is_group: false,
            name: None,
        };
        assert!(matches!(
            service.open(alice, crowd).await,
            Err(ChatServiceError::Validation(_))
        ));

        let named = CreateConversationRequest {
            name: Some("us".into()),
            ..CreateConversationRequest::personal(Uuid::new_v4())
        };
        assert!(matches!(
            service.open(alice, named).await,
            Err(ChatServiceError::Validation(_))
        ));
    }

    #[tokio::test]
    async fn groups_include_caller_first_and_dedupe() {
        let (_, service) = service();
        let alice = Uuid::new_v4();
        let bob = Uuid::new_v4();
        let request = CreateConversationRequest {
            participant_ids: vec![bob, alice, bob],
            is_group: true,
            name: Some("  Team  ".into()),
        };

        let group = service.open(alice, request).await.unwrap();
        assert!(group.is_group);
        assert_eq!(group.participants, vec![alice, bob]);
        assert_eq!(group.name.as_deref(), Some("Team"));

        let lonely = CreateConversationRequest {
            participant_ids: vec![alice],
            is_group: true,
            name: None,
        };
        assert!(matches!(
            service.open(alice, lonely).await,
            Err(ChatServiceError::Validation(_))
        ));
    }

    #[tokio::test]
    async fn get_checks_participation() {
        let (_, service) = service();
        let alice = Uuid::new_v4();
        let conversation = service
            .open(alice, CreateConversationRequest::personal(Uuid::new_v4()))
            .await
            .unwrap();

        assert_eq!(service.get(alice, conversation.id).await.unwrap().id, conversation.id);
        assert!(matches!(
            service.get(Uuid::new_v4(), conversation.id).await,
            Err(ChatServiceError::Forbidden(_))
        ));
        assert!(matches!(
            service.get(alice, Uuid::new_v4()).await,
            Err(ChatServiceError::NotFound(_))
        ));
    }

    #[tokio::test]
    async fn list_orders_by_last_activity() {
        let (store, service) = service();
        let alice = Uuid::new_v4();
        let older = service
            .open(alice, CreateConversationRequest::personal(Uuid::new_v4()))
            .await
            .unwrap();
        let newer = service
            .open(alice, CreateConversationRequest::personal(Uuid::new_v4()))
            .await
            .unwrap();

        store
            .set_last_activity(older.id, Timestamp(older.created_at.0 + chrono::Duration::hours(1)))
            .await;

        let listed = service.list(alice).await.unwrap();
        assert_eq!(
            listed.iter().map(|c| c.id).collect::<Vec<_>>(),
            vec![older.id, newer.id]
        );
    }
}
