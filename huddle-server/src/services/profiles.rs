use std::collections::HashMap;

use shared::models::{MessageView, SenderProfile};
use tracing::warn;
use uuid::Uuid;

use crate::store::{StoredMessage, UserDirectory};

/// Sender profiles for a batch of messages, looked up once.
///
/// Directory failures degrade to placeholder profiles so history and sends keep working.
pub(crate) async fn resolve_senders(
    directory: &dyn UserDirectory,
    messages: &[StoredMessage],
) -> HashMap<Uuid, SenderProfile> {
    let mut ids: Vec<Uuid> = messages.iter().map(|message| message.sender_id).collect();
    ids.sort_unstable();
    ids.dedup();

    match directory.profiles(&ids).await {
        Ok(profiles) => profiles,
        Err(err) => {
            warn!(error = %err, senders = ids.len(), "user directory lookup failed");
            HashMap::new()
        }
    }
}

pub(crate) async fn resolve_one(directory: &dyn UserDirectory, user_id: Uuid) -> SenderProfile {
    match directory.profiles(&[user_id]).await {
        Ok(mut profiles) => profiles
            .remove(&user_id)
            .unwrap_or_else(|| SenderProfile::unknown(user_id)),
        Err(err) => {
            warn!(error = %err, %user_id, "user directory lookup failed");
            SenderProfile::unknown(user_id)
        }
    }
}

pub(crate) fn to_view(message: StoredMessage, profiles: &HashMap<Uuid, SenderProfile>) -> MessageView {
    let sender = profiles
        .get(&message.sender_id)
        .cloned()
        .unwrap_or_else(|| SenderProfile::unknown(message.sender_id));
    MessageView {
        id: message.id,
        conversation_id: message.conversation_id,
        sender,
        kind: message.kind,
        content: message.content,
        created_at: message.created_at,
    }
}
