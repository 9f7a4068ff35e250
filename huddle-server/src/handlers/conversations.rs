use std::sync::Arc;

use axum::{
    Json, Router,
    extract::{Extension, Path},
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
    services::profiles::resolve_one,
};
use shared::models::{
    ConversationListResponse, ConversationResponse, CreateConversationRequest, MeResponse,
};

pub fn routes() -> Router<Arc<AppState>> {
    Router::new()
        .route("/api/me", get(me))
        .route(
            "/api/conversations",
            get(list_conversations).post(open_conversation),
        )
        .route("/api/conversations/{conversation_id}", get(get_conversation))
}

/// Profile of the calling user as the directory knows it.
#[utoipa::path(
    get,
    path = "/api/me",
    responses(
        (status = 200, description = "Caller profile", body = MeResponse),
        (status = 401, description = "Caller identity missing")
    ),
    tag = "Conversations"
)]
#[instrument(skip(app_state, context))]
pub async fn me(
    Extension(app_state): Extension<Arc<AppState>>,
    Extension(context): Extension<RequestContext>,
) -> AppResult<Json<MeResponse>> {
    let user_id = require_user(&context)?;
    let profile = resolve_one(app_state.directory.as_ref(), user_id).await;
    Ok(Json(MeResponse { profile }))
}

#[utoipa::path(
    get,
    path = "/api/conversations",
    responses(
        (status = 200, description = "Caller's conversations, most recently active first", body = ConversationListResponse),
        (status = 401, description = "Caller identity missing")
    ),
    tag = "Conversations"
)]
#[instrument(skip(app_state, context))]
pub async fn list_conversations(
    Extension(app_state): Extension<Arc<AppState>>,
    Extension(context): Extension<RequestContext>,
) -> AppResult<Json<ConversationListResponse>> {
    let user_id = require_user(&context)?;
    let conversations = app_state.conversation_service().list(user_id).await?;
    Ok(Json(ConversationListResponse { conversations }))
}

/// Opens a personal conversation (reused if it already exists) or creates a group.
#[utoipa::path(
    post,
    path = "/api/conversations",
    request_body = CreateConversationRequest,
    responses(
        (status = 200, description = "Conversation opened", body = ConversationResponse),
        (status = 400, description = "Invalid participant list"),
        (status = 401, description = "Caller identity missing")
    ),
    tag = "Conversations"
)]
#[instrument(skip(app_state, context, payload))]
pub async fn open_conversation(
    Extension(app_state): Extension<Arc<AppState>>,
    Extension(context): Extension<RequestContext>,
    Json(payload): Json<CreateConversationRequest>,
) -> AppResult<impl IntoResponse> {
    let user_id = require_user(&context)?;
    let conversation = app_state
        .conversation_service()
        .open(user_id, payload)
        .await?;
    Ok((StatusCode::OK, Json(ConversationResponse { conversation })))
}

#[utoipa::path(
    get,
    path = "/api/conversations/{conversation_id}",
    params(("conversation_id" = Uuid, Path, description = "Conversation id")),
    responses(
        (status = 200, description = "Conversation", body = ConversationResponse),
        (status = 403, description = "Caller is not a participant"),
        (status = 404, description = "Unknown conversation")
    ),
    tag = "Conversations"
)]
#[instrument(skip(app_state, context))]
pub async fn get_conversation(
    Extension(app_state): Extension<Arc<AppState>>,
    Extension(context): Extension<RequestContext>,
    Path(conversation_id): Path<Uuid>,
) -> AppResult<Json<ConversationResponse>> {
    let user_id = require_user(&context)?;
    let conversation = app_state
        .conversation_service()
        .get(user_id, conversation_id)
        .await?;
    Ok(Json(ConversationResponse { conversation }))
}
