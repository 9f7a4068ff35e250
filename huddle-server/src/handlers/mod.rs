use uuid::Uuid;

use crate::{
    http::error::{ApiError, AppResult},
    middleware::request_context::RequestContext,
};

pub mod conversations;
pub mod messages;
pub mod streaming;

fn require_user(context: &RequestContext) -> AppResult<Uuid> {
    context
        .user_id
        .ok_or_else(|| ApiError::unauthorized("caller identity required"))
}
