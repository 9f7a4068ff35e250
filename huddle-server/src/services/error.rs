use shared::models::ContentError;
use thiserror::Error;

use crate::store::StoreError;

#[derive(Debug, Error)]
pub enum ChatServiceError {
    #[error("validation error: {0}")]
    Validation(String),
    #[error("not found: {0}")]
    NotFound(String),
    #[error("forbidden: {0}")]
    Forbidden(String),
    /// The message could not be persisted; nothing was published.
    #[error("send failed: {0}")]
    SendFailed(String),
    #[error("store error: {0}")]
    Store(#[from] StoreError),
}

impl From<ContentError> for ChatServiceError {
    fn from(err: ContentError) -> Self {
        Self::Validation(err.to_string())
    }
}

pub type ChatServiceResult<T> = Result<T, ChatServiceError>;
