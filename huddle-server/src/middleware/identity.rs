//! Caller identity for API routes.
//!
//! Authentication happens upstream; this layer trusts the configured header (or, when enabled,
//! a query parameter) and records the caller on the [`RequestContext`].

use std::str::FromStr;

use axum::{
    body::Body,
    extract::State,
    http::{HeaderName, Request},
    middleware::Next,
    response::{IntoResponse, Response},
};
use shared::config::server::Config;
use tracing::debug;
use uuid::Uuid;

use crate::{http::error::ApiError, middleware::request_context::RequestContext};

#[derive(Clone)]
pub struct IdentityState {
    header: HeaderName,
    query_param: Option<String>,
}

impl IdentityState {
    pub fn from_config(config: &Config) -> Self {
        let header = HeaderName::from_str(&config.identity.user_header)
            .unwrap_or_else(|_| HeaderName::from_static("x-user-id"));
        Self {
            header,
            query_param: config.identity.query_param.clone(),
        }
    }

    fn caller(&self, request: &Request<Body>) -> Option<Uuid> {
        if let Some(value) = request.headers().get(&self.header) {
            return value
                .to_str()
                .ok()
                .and_then(|value| Uuid::parse_str(value.trim()).ok());
        }

        let name = self.query_param.as_deref()?;
        request.uri().query()?.split('&').find_map(|pair| {
            let (key, value) = pair.split_once('=')?;
            (key == name).then(|| Uuid::parse_str(value).ok()).flatten()
        })
    }
}

pub async fn require_identity(
    State(state): State<IdentityState>,
    mut request: Request<Body>,
    next: Next,
) -> Response {
    let Some(user_id) = state.caller(&request) else {
        debug!(header = %state.header, "rejecting request without caller identity");
        return ApiError::unauthorized(format!("missing or invalid {} header", state.header))
            .into_response();
    };

    tracing::Span::current().record("user_id", tracing::field::display(user_id));
    if let Some(context) = request.extensions_mut().get_mut::<RequestContext>() {
        context.user_id = Some(user_id);
    } else {
        request.extensions_mut().insert(RequestContext {
            request_id: String::new(),
            user_id: Some(user_id),
        });
    }

    next.run(request).await
}
