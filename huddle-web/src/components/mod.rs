pub(crate) mod composer;
pub(crate) mod conversation_list;
pub(crate) mod loading;
pub(crate) mod message_list;

// Re-export components for convenience
pub use composer::Composer;
pub use conversation_list::ConversationList;
pub use message_list::MessageList;
