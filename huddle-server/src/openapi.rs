#![allow(clippy::needless_for_each)] // Derive macro emits a for_each internally

use shared::models::{
    ChatStreamEvent, ConnectionReadyEvent, Conversation, ConversationListResponse,
    ConversationResponse, CreateConversationRequest, HistoryResponse, MeResponse,
    MembershipResponse, MessageKind, MessageNewEvent, MessageView, ProblemBody,
    SendMessageRequest, SendMessageResponse, SenderProfile, StreamErrorEvent, Timestamp,
};
use utoipa::OpenApi;

#[derive(OpenApi)]
#[openapi(
    info(
        title = "Huddle API",
        version = "1.0.0",
        description = "Conversation history, message sending and realtime fan-out for Huddle"
    ),
    paths(
        crate::handlers::conversations::me,
        crate::handlers::conversations::list_conversations,
        crate::handlers::conversations::open_conversation,
        crate::handlers::conversations::get_conversation,
        crate::handlers::messages::history,
        crate::handlers::messages::send_message,
        crate::handlers::streaming::sse_handler,
        crate::handlers::streaming::join_conversation,
        crate::handlers::streaming::leave_conversation,
    ),
    components(
        schemas(
            Conversation,
            ConversationListResponse,
            ConversationResponse,
            CreateConversationRequest,
            HistoryResponse,
            MeResponse,
            MembershipResponse,
            MessageKind,
            MessageView,
            SendMessageRequest,
            SendMessageResponse,
            SenderProfile,
            Timestamp,
            ChatStreamEvent,
            ConnectionReadyEvent,
            MessageNewEvent,
            StreamErrorEvent,
            ProblemBody,
        )
    ),
    tags(
        (name = "Conversations", description = "Opening and listing conversations"),
        (name = "Messages", description = "Paginated history and the send path"),
        (name = "Realtime", description = "Event stream and conversation group membership")
    )
)]
pub struct ApiDoc;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn document_lists_chat_paths() {
        let doc = ApiDoc::openapi();
        for path in [
            "/api/me",
            "/api/conversations",
            "/api/conversations/{conversation_id}",
            "/api/conversations/{conversation_id}/messages",
            "/api/stream",
            "/api/stream/{connection_id}/conversations/{conversation_id}",
        ] {
            assert!(doc.paths.paths.contains_key(path), "missing {path}");
        }
    }

    #[test]
    fn document_renders_as_yaml_and_json() {
        let doc = ApiDoc::openapi();
        assert!(doc.to_yaml().unwrap().contains("Huddle API"));
        assert!(doc.to_json().unwrap().contains("MessageView"));
    }
}
