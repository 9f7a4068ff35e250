//! Chat core services layered over the store traits.
pub mod activity_reconciler;
pub mod conversation_service;
pub mod error;
pub mod fanout_hub;
pub mod message_service;
pub mod pagination_service;
pub(crate) mod profiles;

pub use conversation_service::ConversationService;
pub use error::{ChatServiceError, ChatServiceResult};
pub use fanout_hub::{ConnectionGuard, FanoutHub, HubError, SharedHub};
pub use message_service::MessageService;
pub use pagination_service::PaginationService;
