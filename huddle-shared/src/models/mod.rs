pub mod conversation;
pub mod errors;
pub mod message;
pub mod streaming;
pub mod timestamp;
pub mod user;

pub use conversation::{
    Conversation, ConversationListResponse, ConversationResponse, CreateConversationRequest,
    pair_key,
};
pub use errors::ProblemBody;
pub use message::{
    ContentError, DEFAULT_MAX_TEXT_LENGTH, DEFAULT_PAGE_SIZE, HistoryQuery, HistoryResponse,
    MessageKind, MessageView, SendMessageRequest, SendMessageResponse, validate_content,
};
pub use streaming::{
    ChatStreamEvent, ConnectionReadyEvent, MembershipResponse, MessageNewEvent, StreamErrorEvent,
};
pub use timestamp::Timestamp;
pub use user::{MeResponse, SenderProfile, UNKNOWN_USER_NAME};
