pub mod chat;
pub mod client;
pub mod completion;
pub mod config;
pub mod session;
pub mod stream;
