use std::str::FromStr;

use axum::{
    body::Body,
    extract::State,
    http::{HeaderMap, HeaderName, HeaderValue, Request},
    middleware::Next,
    response::Response,
};
use uuid::Uuid;

use shared::config::server::Config;

/// Longest caller-supplied request id that is propagated as-is.
const MAX_REQUEST_ID_LEN: usize = 128;

/// Per-request data shared by the middleware stack and the handlers.
#[derive(Clone, Debug, Default)]
pub struct RequestContext {
    pub request_id: String,
    /// Set by the identity middleware once the caller is known.
    pub user_id: Option<Uuid>,
}

#[derive(Clone, Debug)]
pub struct RequestIdState {
    header: HeaderName,
}

impl RequestIdState {
    pub fn from_config(config: &Config) -> Self {
        let header = HeaderName::from_str(&config.server.request_id_header)
            .unwrap_or_else(|_| HeaderName::from_static("x-request-id"));
        Self { header }
    }
}

/// Tags every request with an id, reusing the caller's when it is usable, and echoes it back.
pub async fn assign_request_id(
    State(state): State<RequestIdState>,
    mut request: Request<Body>,
    next: Next,
) -> Response {
    let (request_id, value) = accepted_request_id(request.headers(), &state.header)
        .unwrap_or_else(|| {
            let generated = Uuid::new_v4().to_string();
            let value = HeaderValue::from_str(&generated)
                .unwrap_or_else(|_| HeaderValue::from_static("invalid"));
            (generated, value)
        });

    request.extensions_mut().insert(RequestContext {
        request_id,
        user_id: None,
    });
    request.headers_mut().insert(state.header.clone(), value.clone());

    let mut response = next.run(request).await;
    response.headers_mut().insert(state.header, value);
    response
}

fn accepted_request_id(headers: &HeaderMap, header: &HeaderName) -> Option<(String, HeaderValue)> {
    let raw = headers.get(header)?.to_str().ok()?.trim();
    let usable = !raw.is_empty()
        && raw.len() <= MAX_REQUEST_ID_LEN
        && raw.bytes().all(|byte| byte.is_ascii_graphic());
    if !usable {
        return None;
    }
    let value = HeaderValue::from_str(raw).ok()?;
    Some((raw.to_string(), value))
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::{Extension, Router, routing::get};
    use shared::config::server::Profile;
    use tower::ServiceExt;

    fn app() -> Router {
        let state = RequestIdState::from_config(&Config::default_for_profile(Profile::Test));
        Router::new()
            .route(
                "/",
                get(|Extension(context): Extension<RequestContext>| async move {
                    context.request_id
                }),
            )
            .layer(axum::middleware::from_fn_with_state(state, assign_request_id))
    }

    async fn call(request_id: Option<&str>) -> (String, String) {
        let mut builder = Request::builder().uri("/");
        if let Some(id) = request_id {
            builder = builder.header("x-request-id", id);
        }
        let response = app()
            .oneshot(builder.body(Body::empty()).unwrap())
            .await
            .unwrap();
        let echoed = response
            .headers()
            .get("x-request-id")
            .unwrap()
            .to_str()
            .unwrap()
            .to_string();
        let body = axum::body::to_bytes(response.into_body(), 256).await.unwrap();
        (echoed, String::from_utf8(body.to_vec()).unwrap())
    }

    #[tokio::test]
    async fn echoes_incoming_request_id() {
        let (echoed, seen) = call(Some("req-42")).await;
        assert_eq!(echoed, "req-42");
        assert_eq!(seen, "req-42");
    }

    #[tokio::test]
    async fn generates_request_id_when_missing() {
        let (echoed, seen) = call(None).await;
        assert!(Uuid::parse_str(&echoed).is_ok());
        assert_eq!(echoed, seen);
    }

    #[tokio::test]
    async fn replaces_unusable_request_ids() {
        let oversized = "x".repeat(MAX_REQUEST_ID_LEN + 1);
        let (echoed, _) = call(Some(&oversized)).await;
        assert!(Uuid::parse_str(&echoed).is_ok());

        let (echoed, _) = call(Some("has space")).await;
        assert!(Uuid::parse_str(&echoed).is_ok());
    }
}
