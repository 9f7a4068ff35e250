use axum::{
    Json, Router,
    extract::{Extension, Path},
    response::sse::{Event, KeepAlive, Sse},
    routing::{get, put},
};
use futures_util::Stream;
use shared::models::{ChatStreamEvent, MembershipResponse};
use std::{convert::Infallible, sync::Arc, time::Duration};
use tokio_stream::{StreamExt, wrappers::ReceiverStream};
use tracing::{info, instrument, warn};
use uuid::Uuid;

use crate::{
    app_state::AppState,
    handlers::require_user,
    http::error::{ApiError, AppResult},
    middleware::request_context::RequestContext,
    services::{ChatServiceError, ConnectionGuard},
};

/// Heartbeats are never sent more often than this.
const MIN_HEARTBEAT_SECONDS: u64 = 5;

pub fn routes() -> Router<Arc<AppState>> {
    Router::new().route("/api/stream", get(sse_handler)).route(
        "/api/stream/{connection_id}/conversations/{conversation_id}",
        put(join_conversation).delete(leave_conversation),
    )
}

fn to_sse_event(event: &ChatStreamEvent) -> Event {
    Event::default()
        .event(event.event_name())
        .json_data(event)
        .unwrap_or_else(|err| {
            warn!(error = %err, "failed to encode stream event");
            Event::default()
                .event("error")
                .data(r#"{"type":"error","payload":{"code":"encode_failed","message":"event could not be encoded"}}"#)
        })
}

/// Opens the caller's event stream. The first event is `connection.ready` carrying the
/// connection id that join and leave calls refer to.
#[utoipa::path(
    get,
    path = "/api/stream",
    responses(
        (status = 200, description = "Server-sent event stream", content_type = "text/event-stream"),
        (status = 401, description = "Caller identity missing")
    ),
    tag = "Realtime"
)]
#[instrument(skip(app_state, context))]
pub async fn sse_handler(
    Extension(app_state): Extension<Arc<AppState>>,
    Extension(context): Extension<RequestContext>,
) -> AppResult<Sse<impl Stream<Item = Result<Event, Infallible>>>> {
    let user_id = require_user(&context)?;
    let (connection_id, receiver) = app_state.hub.register(user_id).await;
    info!(%connection_id, %user_id, "establishing event stream");

    // Dropping the stream (client gone) drops the guard, which removes every membership.
    let guard = ConnectionGuard::new(app_state.hub.clone(), connection_id);
    let stream = ReceiverStream::new(receiver).map(move |event| {
        let _held = &guard;
        Ok::<_, Infallible>(to_sse_event(&event))
    });

    let keepalive = KeepAlive::new()
        .interval(Duration::from_secs(
            app_state.heartbeat_seconds.max(MIN_HEARTBEAT_SECONDS),
        ))
        .text("keep-alive");

    Ok(Sse::new(stream).keep_alive(keepalive))
}

/// Joins a conversation's broadcast group. Joining twice is a no-op.
#[utoipa::path(
    put,
    path = "/api/stream/{connection_id}/conversations/{conversation_id}",
    params(
        ("connection_id" = Uuid, Path, description = "Id from the connection.ready event"),
        ("conversation_id" = Uuid, Path, description = "Conversation id")
    ),
    responses(
        (status = 200, description = "Joined", body = MembershipResponse),
        (status = 404, description = "Unknown connection or conversation")
    ),
    tag = "Realtime"
)]
#[instrument(skip(app_state, context))]
pub async fn join_conversation(
    Extension(app_state): Extension<Arc<AppState>>,
    Extension(context): Extension<RequestContext>,
    Path((connection_id, conversation_id)): Path<(Uuid, Uuid)>,
) -> AppResult<Json<MembershipResponse>> {
    let user_id = require_user(&context)?;
    if app_state
        .conversations
        .find(conversation_id)
        .await
        .map_err(ChatServiceError::from)?
        .is_none()
    {
        return Err(ApiError::not_found(format!(
            "conversation {conversation_id}"
        )));
    }

    let changed = app_state
        .hub
        .join(connection_id, user_id, conversation_id)
        .await?;
    Ok(Json(MembershipResponse {
        connection_id,
        conversation_id,
        joined: true,
        changed,
    }))
}

/// Leaves a conversation's broadcast group. Leaving when not joined is a no-op.
#[utoipa::path(
    delete,
    path = "/api/stream/{connection_id}/conversations/{conversation_id}",
    params(
        ("connection_id" = Uuid, Path, description = "Id from the connection.ready event"),
        ("conversation_id" = Uuid, Path, description = "Conversation id")
    ),
    responses(
        (status = 200, description = "Left", body = MembershipResponse),
        (status = 404, description = "Unknown connection")
    ),
    tag = "Realtime"
)]
#[instrument(skip(app_state, context))]
pub async fn leave_conversation(
    Extension(app_state): Extension<Arc<AppState>>,
    Extension(context): Extension<RequestContext>,
    Path((connection_id, conversation_id)): Path<(Uuid, Uuid)>,
) -> AppResult<Json<MembershipResponse>> {
    let user_id = require_user(&context)?;
    let changed = app_state
        .hub
        .leave(connection_id, user_id, conversation_id)
        .await?;
    Ok(Json(MembershipResponse {
        connection_id,
        conversation_id,
        joined: false,
        changed,
    }))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::store::MemoryStore;
    use shared::config::server::{Config, Profile};

    fn state() -> Arc<AppState> {
        let config = Config::default_for_profile(Profile::Test);
        Arc::new(AppState::in_memory(Arc::new(MemoryStore::new()), &config))
    }

    #[tokio::test]
    async fn sse_handler_requires_user() {
        let context = RequestContext {
            request_id: "req-1".into(),
            user_id: None,
        };

        let result = sse_handler(Extension(state()), Extension(context)).await;
        let err = result.err().expect("anonymous stream must be rejected");
        assert_eq!(err.status(), axum::http::StatusCode::UNAUTHORIZED);
    }

    #[tokio::test]
    async fn join_rejects_unknown_conversation_and_foreign_connections() {
        let state = state();
        let owner = Uuid::new_v4();
        let (connection_id, _rx) = state.hub.register(owner).await;

        let missing = join_conversation(
            Extension(state.clone()),
            Extension(RequestContext {
                request_id: String::new(),
                user_id: Some(owner),
            }),
            Path((connection_id, Uuid::new_v4())),
        )
        .await;
        assert_eq!(
            missing.err().map(|err| err.status()),
            Some(axum::http::StatusCode::NOT_FOUND)
        );

        let left = leave_conversation(
            Extension(state.clone()),
            Extension(RequestContext {
                request_id: String::new(),
                user_id: Some(Uuid::new_v4()),
            }),
            Path((connection_id, Uuid::new_v4())),
        )
        .await;
        assert_eq!(
            left.err().map(|err| err.status()),
            Some(axum::http::StatusCode::NOT_FOUND)
        );
    }
}
