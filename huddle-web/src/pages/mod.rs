mod chat;
mod conversations;
mod error;
mod identity;

pub use chat::ChatPage;
pub use conversations::ConversationsPage;
pub use error::ErrorPage;
pub use identity::IdentityPage;
