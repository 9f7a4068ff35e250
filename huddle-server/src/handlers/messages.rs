use std::sync::Arc;

use axum::{
    Json, Router,
    extract::{Extension, Path, Query},
    http::StatusCode,
    response::IntoResponse,
    routing::get,
};
use tracing::instrument;
use uuid::Uuid;

use crate::{
    app_state::AppState,
    handlers::require_user,
    http::error::AppResult,
    middleware::request_context::RequestContext,
};
use shared::models::{HistoryQuery, HistoryResponse, SendMessageRequest, SendMessageResponse};

pub fn routes() -> Router<Arc<AppState>> {
    Router::new().route(
        "/api/conversations/{conversation_id}/messages",
        get(history).post(send_message),
    )
}

/// One page of history, oldest first. A page shorter than `limit` is the last one.
#[utoipa::path(
    get,
    path = "/api/conversations/{conversation_id}/messages",
    params(
        ("conversation_id" = Uuid, Path, description = "Conversation id"),
        HistoryQuery
    ),
    responses(
        (status = 200, description = "History page", body = HistoryResponse),
        (status = 400, description = "Invalid limit or cursor"),
        (status = 404, description = "Unknown conversation"),
        (status = 503, description = "Message store unavailable")
    ),
    tag = "Messages"
)]
#[instrument(skip(app_state, context, query))]
pub async fn history(
    Extension(app_state): Extension<Arc<AppState>>,
    Extension(context): Extension<RequestContext>,
    Path(conversation_id): Path<Uuid>,
    Query(query): Query<HistoryQuery>,
) -> AppResult<Json<HistoryResponse>> {
    require_user(&context)?;
    let messages = app_state
        .pagination()
        .fetch_page(conversation_id, query)
        .await?;
    Ok(Json(HistoryResponse { messages }))
}

/// Persists a message and fans it out to every connection joined to the conversation.
#[utoipa::path(
    post,
    path = "/api/conversations/{conversation_id}/messages",
    params(("conversation_id" = Uuid, Path, description = "Conversation id")),
    request_body = SendMessageRequest,
    responses(
        (status = 201, description = "Message stored and published", body = SendMessageResponse),
        (status = 400, description = "Rejected content"),
        (status = 404, description = "Unknown conversation"),
        (status = 503, description = "Message could not be persisted")
    ),
    tag = "Messages"
)]
#[instrument(skip(app_state, context, payload))]
pub async fn send_message(
    Extension(app_state): Extension<Arc<AppState>>,
    Extension(context): Extension<RequestContext>,
    Path(conversation_id): Path<Uuid>,
    Json(payload): Json<SendMessageRequest>,
) -> AppResult<impl IntoResponse> {
    let user_id = require_user(&context)?;
    let message = app_state
        .message_service()
        .send(conversation_id, user_id, payload)
        .await?;
    Ok((StatusCode::CREATED, Json(SendMessageResponse { message })))
}
